//! Presentations shipped with the plugin.

use super::Layout;
use crate::config::ThemeFlavor;
use crate::model::layout::SuggestedUse;
use std::sync::Arc;

/// Static description of one shipped presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinLayout {
    id: &'static str,
    name: &'static str,
    suggested_use: SuggestedUse,
    requires_title: bool,
    /// Template differs between bootstrap 3 and 4 markup.
    flavored: bool,
}

const BUILTIN_LAYOUTS: &[BuiltinLayout] = &[
    BuiltinLayout {
        id: "accordion",
        name: "Accordion",
        suggested_use: SuggestedUse::Sidebar,
        requires_title: true,
        flavored: false,
    },
    BuiltinLayout {
        id: "carousel",
        name: "Carousel",
        suggested_use: SuggestedUse::Main,
        requires_title: false,
        flavored: false,
    },
    BuiltinLayout {
        id: "columns-2-33-66",
        name: "Columns: 2 (33% / 66%)",
        suggested_use: SuggestedUse::Main,
        requires_title: false,
        flavored: false,
    },
    BuiltinLayout {
        id: "columns-2equal",
        name: "Columns: 2 equal",
        suggested_use: SuggestedUse::Main,
        requires_title: false,
        flavored: false,
    },
    BuiltinLayout {
        id: "columns-2-66-33",
        name: "Columns: 2 (66% / 33%)",
        suggested_use: SuggestedUse::Main,
        requires_title: false,
        flavored: false,
    },
    BuiltinLayout {
        id: "columns-3equal",
        name: "Columns: 3 equal",
        suggested_use: SuggestedUse::Main,
        requires_title: false,
        flavored: false,
    },
    BuiltinLayout {
        id: "dropdown",
        name: "Dropdown",
        suggested_use: SuggestedUse::Sidebar,
        requires_title: true,
        flavored: false,
    },
    BuiltinLayout {
        id: "tabbed-list",
        name: "Tabs",
        suggested_use: SuggestedUse::Sidebar,
        requires_title: true,
        flavored: false,
    },
    BuiltinLayout {
        id: "tabbed-list-columns-2-66-33",
        name: "Tabs: Columns: 2 (66% / 33%)",
        suggested_use: SuggestedUse::Main,
        requires_title: true,
        flavored: true,
    },
    BuiltinLayout {
        id: "vertical-tabbed-list",
        name: "Vertical Tabs (Left)",
        suggested_use: SuggestedUse::Main,
        requires_title: true,
        flavored: false,
    },
    BuiltinLayout {
        id: "vertical-tabbed-list-right",
        name: "Vertical Tabs (Right)",
        suggested_use: SuggestedUse::Main,
        requires_title: true,
        flavored: true,
    },
];

/// Returns every shipped presentation.
pub fn builtin_layouts() -> Vec<Arc<dyn Layout>> {
    BUILTIN_LAYOUTS
        .iter()
        .map(|layout| Arc::new(*layout) as Arc<dyn Layout>)
        .collect()
}

impl Layout for BuiltinLayout {
    fn layout_id(&self) -> &str {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn suggested_use(&self) -> SuggestedUse {
        self.suggested_use
    }

    fn requires_title(&self) -> bool {
        self.requires_title
    }

    fn template(&self, flavor: ThemeFlavor) -> String {
        if self.flavored {
            format!("multiblock/{}-{}", self.id, flavor.template_suffix())
        } else {
            format!("multiblock/{}", self.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::builtin_layouts;
    use crate::config::ThemeFlavor;
    use std::collections::HashSet;

    #[test]
    fn builtin_ids_are_unique() {
        let layouts = builtin_layouts();
        let ids: HashSet<_> = layouts.iter().map(|layout| layout.layout_id()).collect();
        assert_eq!(ids.len(), layouts.len());
    }

    #[test]
    fn flavored_layouts_pick_template_by_theme() {
        let layouts = builtin_layouts();
        let tabbed_right = layouts
            .iter()
            .find(|layout| layout.layout_id() == "vertical-tabbed-list-right")
            .expect("shipped layout");
        assert_eq!(
            tabbed_right.template(ThemeFlavor::Bootstrap4),
            "multiblock/vertical-tabbed-list-right-bootstrap4"
        );
        assert_eq!(
            tabbed_right.template(ThemeFlavor::Bootstrap3),
            "multiblock/vertical-tabbed-list-right-bootstrap3"
        );

        let columns = layouts
            .iter()
            .find(|layout| layout.layout_id() == "columns-3equal")
            .expect("shipped layout");
        assert_eq!(
            columns.template(ThemeFlavor::Bootstrap3),
            "multiblock/columns-3equal"
        );
        assert!(!columns.requires_title());
    }
}
