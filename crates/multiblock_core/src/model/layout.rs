//! Layout descriptor model.

use serde::{Deserialize, Serialize};

/// Page area a layout is designed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedUse {
    /// Primary content area.
    Main,
    /// Narrow side column.
    Sidebar,
}

/// Rendering metadata for one layout option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutDescriptor {
    pub id: String,
    pub name: String,
    pub suggested_use: SuggestedUse,
    /// Children must carry a title for this layout to render correctly.
    pub requires_title: bool,
    pub template: String,
}
