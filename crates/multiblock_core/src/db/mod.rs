//! Block store bootstrap.
//!
//! # Responsibility
//! - Open connections to the block store and bring their schema up to date.
//! - Report which store tables a connection is missing.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - Every returned connection enforces foreign keys, so deleting a block
//!   scope takes its position records with it.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

/// Tables every migrated block store carries.
pub const STORE_TABLES: [&str; 3] = ["scopes", "block_instances", "block_positions"];

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// One migration script failed; nothing from the batch was committed.
    MigrationFailed {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "block store schema {db_version} is newer than this build supports ({latest_supported})"
            ),
            Self::MigrationFailed {
                version,
                name,
                source,
            } => write!(f, "migration {version:04}_{name} failed: {source}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::MigrationFailed { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Reads the schema version recorded on a connection.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Returns the first store table absent from the connection, if any.
pub fn missing_store_table(conn: &Connection) -> DbResult<Option<&'static str>> {
    let mut stmt = conn.prepare(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
    )?;
    for table in STORE_TABLES {
        let exists: bool = stmt.query_row([table], |row| row.get(0))?;
        if !exists {
            return Ok(Some(table));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::{missing_store_table, open_db_in_memory, schema_version};
    use rusqlite::Connection;

    #[test]
    fn fresh_connection_misses_scopes_first() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
        assert_eq!(missing_store_table(&conn).unwrap(), Some("scopes"));
    }

    #[test]
    fn migrated_connection_has_every_table() {
        let conn = open_db_in_memory().unwrap();
        assert_eq!(missing_store_table(&conn).unwrap(), None);
    }
}
