use multiblock_core::backup::BackupError;
use multiblock_core::config::ConfigError;
use multiblock_core::logging::LoggingError;
use multiblock_core::{
    DbError, LayoutRegistryError, RelationshipError, RelationshipErrorKind, StoreError,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_NOT_FOUND: i32 = 2;
pub const EXIT_INVALID_STATE: i32 = 3;
pub const EXIT_INVARIANT_VIOLATION: i32 = 4;
pub const EXIT_STORAGE: i32 = 5;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("settings error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutRegistryError),

    #[error("backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("{0}")]
    Relationship(#[from] RelationshipError),
}

impl CliError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Relationship(err) => match err.kind() {
                RelationshipErrorKind::NotFound => EXIT_NOT_FOUND,
                RelationshipErrorKind::InvalidState => EXIT_INVALID_STATE,
                RelationshipErrorKind::OrderingInvariantViolation => EXIT_INVARIANT_VIOLATION,
                RelationshipErrorKind::Storage => EXIT_STORAGE,
            },
            Self::Db(_) | Self::Store(_) => EXIT_STORAGE,
            Self::Layout(LayoutRegistryError::LayoutNotFound(_)) => EXIT_NOT_FOUND,
            _ => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, EXIT_FAILURE, EXIT_INVALID_STATE, EXIT_NOT_FOUND};
    use multiblock_core::{LayoutRegistryError, RelationshipError};
    use uuid::Uuid;

    #[test]
    fn relationship_kinds_map_to_distinct_exit_codes() {
        let missing = CliError::from(RelationshipError::BlockNotFound(Uuid::new_v4()));
        let self_ref = CliError::from(RelationshipError::SelfReference(Uuid::new_v4()));
        assert_eq!(missing.exit_code(), EXIT_NOT_FOUND);
        assert_eq!(self_ref.exit_code(), EXIT_INVALID_STATE);
    }

    #[test]
    fn other_errors_use_generic_failure() {
        let invalid = CliError::from(LayoutRegistryError::InvalidLayoutId("Bad".to_string()));
        assert_eq!(invalid.exit_code(), EXIT_FAILURE);
        let io = CliError::from(std::io::Error::other("boom"));
        assert_eq!(io.exit_code(), EXIT_FAILURE);
    }
}
