//! Core domain logic for multiblock containers.
//! This crate is the single source of truth for container/child invariants.

pub mod backup;
pub mod config;
pub mod db;
pub mod form;
pub mod layout;
pub mod logging;
pub mod model;
pub mod render;
pub mod repo;
pub mod service;

pub use backup::{BackupArchive, BackupPlan, RestorePlan};
pub use config::{load_settings, MultiblockSettings, ThemeFlavor};
pub use db::{open_db, open_db_in_memory, DbError};
pub use layout::{LayoutRegistry, LayoutRegistryError};
pub use logging::{
    default_log_level, init_logging, init_logging_with_settings, logging_status,
};
pub use model::block::{
    BlockId, BlockInstance, BlockPosition, Placement, Scope, ScopeId, ScopeLevel,
};
pub use model::layout::{LayoutDescriptor, SuggestedUse};
pub use repo::block_repo::{BlockRepository, SqliteBlockRepository, StoreError, StoreResult};
pub use repo::scope_repo::{ScopeRepository, SqliteScopeRepository};
pub use service::relationship_service::{
    ContainerDeleteMode, RelationshipError, RelationshipErrorKind, RelationshipService,
    ReorderDirection,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
