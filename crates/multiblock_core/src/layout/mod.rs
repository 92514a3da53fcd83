//! Layout catalogue for rendering a container's children.
//!
//! # Responsibility
//! - Define the `Layout` capability every presentation implements.
//! - Ship the built-in presentations and the registry that indexes them.
//!
//! # Invariants
//! - Layout ids are lowercase kebab-case and unique within one registry.
//! - A registry is immutable once handed to callers.

mod builtin;
pub mod registry;

pub use builtin::{builtin_layouts, BuiltinLayout};
pub use registry::{LayoutRegistry, LayoutRegistryError};

use crate::config::ThemeFlavor;
use crate::model::layout::{LayoutDescriptor, SuggestedUse};

/// One presentation strategy for a container's children.
pub trait Layout: Send + Sync {
    fn layout_id(&self) -> &str;

    fn name(&self) -> &str;

    fn suggested_use(&self) -> SuggestedUse;

    fn requires_title(&self) -> bool {
        true
    }

    fn template(&self, _flavor: ThemeFlavor) -> String {
        format!("multiblock/{}", self.layout_id())
    }

    fn descriptor(&self, flavor: ThemeFlavor) -> LayoutDescriptor {
        LayoutDescriptor {
            id: self.layout_id().to_string(),
            name: self.name().to_string(),
            suggested_use: self.suggested_use(),
            requires_title: self.requires_title(),
            template: self.template(flavor),
        }
    }
}
