//! Repository layer over the block store.
//!
//! # Responsibility
//! - Define data access contracts for scopes, block instances and position
//!   records.
//! - Keep SQL and transaction boundaries out of the services.
//!
//! # Invariants
//! - Every multi-row mutation runs in one `IMMEDIATE` transaction.
//! - Repositories refuse connections that are not migrated to the latest
//!   schema version.
//! - Block listings are ordered `default_weight ASC, block_uuid ASC`.

pub mod block_repo;
pub mod scope_repo;

use crate::db::migrations::latest_version;
use crate::db::{missing_store_table, schema_version};
use block_repo::{StoreError, StoreResult};
use rusqlite::Connection;

pub(crate) fn ensure_store_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    match missing_store_table(conn)? {
        Some(table) => Err(StoreError::MissingRequiredTable(table)),
        None => Ok(()),
    }
}
