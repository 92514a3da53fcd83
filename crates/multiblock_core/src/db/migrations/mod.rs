//! Ordered schema scripts for the block store.
//!
//! # Invariants
//! - Versions start at 1 and increase by one per script.
//! - All pending scripts run in a single transaction; `user_version` is
//!   bumped after each one inside it.

use crate::db::{schema_version, DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "block_store",
        sql: include_str!("0001_block_store.sql"),
    },
    Migration {
        version: 2,
        name: "block_positions",
        sql: include_str!("0002_block_positions.sql"),
    },
];

/// Returns the schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the store up to `latest_version()` and returns the versions applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<u32>> {
    let current = schema_version(conn)?;
    let latest = latest_version();
    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current)
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| DbError::MigrationFailed {
                version: migration.version,
                name: migration.name,
                source,
            })?;
    }
    tx.commit()?;

    for migration in &pending {
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    Ok(pending.iter().map(|migration| migration.version).collect())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, MIGRATIONS};
    use rusqlite::Connection;

    #[test]
    fn versions_are_contiguous_from_one() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1);
        }
    }

    #[test]
    fn second_run_applies_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&mut conn).unwrap();
        assert_eq!(applied, (1..=latest_version()).collect::<Vec<_>>());
        assert!(apply_migrations(&mut conn).unwrap().is_empty());
    }
}
