//! Layout registry built once at startup and passed to callers.

use super::{builtin_layouts, Layout};
use crate::config::{MultiblockSettings, ThemeFlavor};
use crate::model::layout::{LayoutDescriptor, SuggestedUse};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

static LAYOUT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid layout id regex"));

/// Layout registration and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutRegistryError {
    InvalidLayoutId(String),
    DuplicateLayoutId(String),
    LayoutNotFound(String),
}

impl Display for LayoutRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLayoutId(value) => write!(f, "layout id is invalid: {value}"),
            Self::DuplicateLayoutId(value) => write!(f, "layout id already registered: {value}"),
            Self::LayoutNotFound(value) => write!(f, "layout not found: {value}"),
        }
    }
}

impl Error for LayoutRegistryError {}

/// Registered layouts, indexed by id in sorted order.
pub struct LayoutRegistry {
    flavor: ThemeFlavor,
    layouts: BTreeMap<String, Arc<dyn Layout>>,
    descriptors: BTreeMap<String, LayoutDescriptor>,
    configured_default: Option<String>,
}

impl LayoutRegistry {
    pub fn new(flavor: ThemeFlavor) -> Self {
        Self {
            flavor,
            layouts: BTreeMap::new(),
            descriptors: BTreeMap::new(),
            configured_default: None,
        }
    }

    /// Builds the registry with every shipped layout and the configured default.
    pub fn with_builtin(settings: &MultiblockSettings) -> Result<Self, LayoutRegistryError> {
        let mut registry = Self::new(settings.theme_flavor);
        for layout in builtin_layouts() {
            registry.register(layout)?;
        }
        registry.set_configured_default(settings.default_layout.as_deref());
        Ok(registry)
    }

    /// Registers one layout and caches its descriptor.
    pub fn register(&mut self, layout: Arc<dyn Layout>) -> Result<(), LayoutRegistryError> {
        let id = layout.layout_id().trim().to_string();
        if !LAYOUT_ID_RE.is_match(&id) {
            return Err(LayoutRegistryError::InvalidLayoutId(id));
        }
        if self.layouts.contains_key(id.as_str()) {
            return Err(LayoutRegistryError::DuplicateLayoutId(id));
        }

        self.descriptors
            .insert(id.clone(), layout.descriptor(self.flavor));
        self.layouts.insert(id, layout);
        Ok(())
    }

    /// Remembers the administrator's preferred default. Unregistered ids are
    /// kept but ignored by `default_layout_id`.
    pub fn set_configured_default(&mut self, layout_id: Option<&str>) {
        let normalized = layout_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        if let Some(id) = normalized.as_deref() {
            if !self.layouts.contains_key(id) {
                warn!(
                    "event=layout_default module=layout status=fallback reason=unregistered layout_id={id}"
                );
            }
        }
        self.configured_default = normalized;
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Every descriptor keyed by layout id, in sorted order.
    pub fn list_layouts(&self) -> &BTreeMap<String, LayoutDescriptor> {
        &self.descriptors
    }

    /// Descriptors suggested for one page area.
    pub fn layouts_for_use(&self, suggested_use: SuggestedUse) -> Vec<&LayoutDescriptor> {
        self.descriptors
            .values()
            .filter(|descriptor| descriptor.suggested_use == suggested_use)
            .collect()
    }

    /// Configured default when registered, otherwise the first id in sorted
    /// order. `None` only for an empty registry.
    pub fn default_layout_id(&self) -> Option<&str> {
        if let Some(configured) = self.configured_default.as_deref() {
            if let Some((id, _)) = self.layouts.get_key_value(configured) {
                return Some(id.as_str());
            }
        }
        self.layouts.keys().next().map(String::as_str)
    }

    pub fn descriptor_for(
        &self,
        layout_id: &str,
    ) -> Result<&LayoutDescriptor, LayoutRegistryError> {
        self.descriptors
            .get(layout_id.trim())
            .ok_or_else(|| LayoutRegistryError::LayoutNotFound(layout_id.trim().to_string()))
    }

    /// Looks up `layout_id`, falling back to the default layout when it is
    /// missing or unregistered.
    pub fn resolve(&self, layout_id: Option<&str>) -> Option<&LayoutDescriptor> {
        layout_id
            .and_then(|id| self.descriptor_for(id).ok())
            .or_else(|| {
                self.default_layout_id()
                    .and_then(|id| self.descriptors.get(id))
            })
    }

    /// Returns the layout implementation behind one id.
    pub fn get(&self, layout_id: &str) -> Option<Arc<dyn Layout>> {
        self.layouts.get(layout_id.trim()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::{LayoutRegistry, LayoutRegistryError};
    use crate::config::{MultiblockSettings, ThemeFlavor};
    use crate::layout::Layout;
    use crate::model::layout::SuggestedUse;
    use std::sync::Arc;

    struct StaticLayout(&'static str);

    impl Layout for StaticLayout {
        fn layout_id(&self) -> &str {
            self.0
        }

        fn name(&self) -> &str {
            "Static"
        }

        fn suggested_use(&self) -> SuggestedUse {
            SuggestedUse::Main
        }
    }

    #[test]
    fn builtin_registry_uses_configured_default() {
        let registry = LayoutRegistry::with_builtin(&MultiblockSettings::default()).unwrap();
        assert_eq!(registry.len(), 11);
        assert_eq!(registry.default_layout_id(), Some("tabbed-list"));
    }

    #[test]
    fn unregistered_default_falls_back_to_first_sorted_id() {
        let settings = MultiblockSettings {
            default_layout: Some("masonry".to_string()),
            ..MultiblockSettings::default()
        };
        let registry = LayoutRegistry::with_builtin(&settings).unwrap();
        assert_eq!(registry.default_layout_id(), Some("accordion"));
    }

    #[test]
    fn default_descriptor_is_always_resolvable() {
        for configured in [None, Some("carousel"), Some("missing"), Some("  ")] {
            let settings = MultiblockSettings {
                default_layout: configured.map(str::to_string),
                ..MultiblockSettings::default()
            };
            let registry = LayoutRegistry::with_builtin(&settings).unwrap();
            let default_id = registry.default_layout_id().expect("non-empty registry");
            assert!(registry.descriptor_for(default_id).is_ok());
        }
    }

    #[test]
    fn rejects_invalid_and_duplicate_ids() {
        let mut registry = LayoutRegistry::new(ThemeFlavor::Bootstrap4);
        assert!(matches!(
            registry.register(Arc::new(StaticLayout("Two Columns"))),
            Err(LayoutRegistryError::InvalidLayoutId(_))
        ));
        registry
            .register(Arc::new(StaticLayout("two-columns")))
            .unwrap();
        assert!(matches!(
            registry.register(Arc::new(StaticLayout("two-columns"))),
            Err(LayoutRegistryError::DuplicateLayoutId(_))
        ));
    }

    #[test]
    fn unknown_descriptor_is_not_found_and_resolve_falls_back() {
        let registry = LayoutRegistry::with_builtin(&MultiblockSettings::default()).unwrap();
        assert_eq!(
            registry.descriptor_for("masonry"),
            Err(LayoutRegistryError::LayoutNotFound("masonry".to_string()))
        );
        let resolved = registry.resolve(Some("masonry")).expect("fallback");
        assert_eq!(resolved.id, "tabbed-list");
        assert_eq!(resolved.template, "multiblock/tabbed-list");
    }

    #[test]
    fn empty_registry_has_no_default() {
        let registry = LayoutRegistry::new(ThemeFlavor::Bootstrap4);
        assert!(registry.is_empty());
        assert_eq!(registry.default_layout_id(), None);
        assert!(registry.resolve(None).is_none());
    }

    #[test]
    fn groups_layouts_by_suggested_use() {
        let registry = LayoutRegistry::with_builtin(&MultiblockSettings::default()).unwrap();
        let sidebar: Vec<_> = registry
            .layouts_for_use(SuggestedUse::Sidebar)
            .into_iter()
            .map(|descriptor| descriptor.id.as_str())
            .collect();
        assert_eq!(sidebar, vec!["accordion", "dropdown", "tabbed-list"]);
    }
}
