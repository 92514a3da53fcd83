//! Block instance, scope and position records.
//!
//! # Invariants
//! - `parent_scope_uuid` of a child equals its container's block scope.
//! - Listing order within one owning scope is `default_weight, block_uuid`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Block type name that marks a block instance as a container.
pub const CONTAINER_BLOCK_TYPE: &str = "multiblock";

/// Title shown for a container whose config carries none.
pub const CONTAINER_DISPLAY_NAME: &str = "Multiblock";

static BLOCK_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid block type regex"));

/// Stable block instance identifier.
pub type BlockId = Uuid;

/// Stable scope identifier.
pub type ScopeId = Uuid;

/// Returns whether `value` is an acceptable block type name.
pub fn is_valid_block_type(value: &str) -> bool {
    BLOCK_TYPE_RE.is_match(value)
}

/// Level of one scope in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    System,
    User,
    CourseCategory,
    Course,
    Module,
    /// Scope owned by one block instance.
    Block,
}

impl ScopeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::CourseCategory => "course_category",
            Self::Course => "course",
            Self::Module => "module",
            Self::Block => "block",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "course_category" => Some(Self::CourseCategory),
            "course" => Some(Self::Course),
            "module" => Some(Self::Module),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

/// One node of the scope hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub scope_uuid: ScopeId,
    /// `None` only for the root scope.
    pub parent_uuid: Option<ScopeId>,
    pub level: ScopeLevel,
    /// Host identifier of the thing this scope belongs to. Block scopes carry
    /// the owning block uuid.
    pub instance_key: Option<String>,
}

/// Placement attributes a child inherits from its container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub show_in_subscopes: bool,
    pub required_by_theme: bool,
    pub page_type_pattern: String,
    pub sub_page_pattern: Option<String>,
    pub default_region: String,
    pub default_weight: i64,
}

impl Placement {
    pub fn new(page_type_pattern: impl Into<String>, default_region: impl Into<String>) -> Self {
        Self {
            show_in_subscopes: false,
            required_by_theme: false,
            page_type_pattern: page_type_pattern.into(),
            sub_page_pattern: None,
            default_region: default_region.into(),
            default_weight: 0,
        }
    }
}

/// Persisted block instance (container or child).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInstance {
    pub block_uuid: BlockId,
    pub block_type: String,
    /// Owning scope. For a child this is the container's block scope.
    pub parent_scope_uuid: ScopeId,
    pub placement: Placement,
    pub config: Value,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub updated_at: i64,
}

impl BlockInstance {
    pub fn is_container(&self) -> bool {
        self.block_type == CONTAINER_BLOCK_TYPE
    }

    /// Reads `config.title`, ignoring blank values.
    pub fn title(&self) -> Option<&str> {
        self.config
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }

    /// Reads `config.presentation`, the layout id chosen for a container.
    pub fn presentation(&self) -> Option<&str> {
        self.config
            .get("presentation")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Input for instantiating a block.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlockInstance {
    pub block_type: String,
    pub parent_scope_uuid: ScopeId,
    pub placement: Placement,
    pub config: Value,
    /// Ignore `placement.default_weight` and place the block after the last
    /// block of its owning scope.
    pub append_weight: bool,
}

/// Explicit position override of one block on one page type in one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPosition {
    pub position_uuid: Uuid,
    pub block_uuid: BlockId,
    pub scope_uuid: ScopeId,
    pub page_type: String,
    pub sub_page: String,
    pub visible: bool,
    pub region: String,
    pub weight: i64,
}

impl BlockPosition {
    /// Copies this record for another block, keeping scope and slot.
    pub fn cloned_for(&self, block_uuid: BlockId) -> Self {
        Self {
            position_uuid: Uuid::new_v4(),
            block_uuid,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_block_type, BlockInstance, Placement, ScopeLevel};
    use serde_json::json;
    use uuid::Uuid;

    fn block(config: serde_json::Value) -> BlockInstance {
        BlockInstance {
            block_uuid: Uuid::new_v4(),
            block_type: "multiblock".to_string(),
            parent_scope_uuid: Uuid::new_v4(),
            placement: Placement::new("course-view-*", "side-pre"),
            config,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn scope_level_round_trips_through_storage_names() {
        for level in [
            ScopeLevel::System,
            ScopeLevel::User,
            ScopeLevel::CourseCategory,
            ScopeLevel::Course,
            ScopeLevel::Module,
            ScopeLevel::Block,
        ] {
            assert_eq!(ScopeLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(ScopeLevel::parse("page"), None);
    }

    #[test]
    fn title_and_presentation_ignore_blank_values() {
        let container = block(json!({ "title": "  ", "presentation": "accordion" }));
        assert!(container.is_container());
        assert_eq!(container.title(), None);
        assert_eq!(container.presentation(), Some("accordion"));
    }

    #[test]
    fn block_type_pattern_rejects_paths_and_uppercase() {
        assert!(is_valid_block_type("html"));
        assert!(is_valid_block_type("calendar_month"));
        assert!(!is_valid_block_type("Html"));
        assert!(!is_valid_block_type("../html"));
        assert!(!is_valid_block_type(""));
    }
}
