//! Connection bootstrap for the block store.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections are at `migrations::latest_version()`.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Concurrent CLI invocations wait this long on a locked store.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if needed) a block store file.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_with(&path.display().to_string(), || Connection::open(path))
}

/// Opens a throwaway block store, mostly for tests.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(":memory:", Connection::open_in_memory)
}

fn open_with(
    target: &str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let opened: DbResult<(Connection, usize)> = connect()
        .map_err(Into::into)
        .and_then(|mut conn| prepare_store(&mut conn).map(|applied| (conn, applied)));

    match &opened {
        Ok((_, applied)) => {
            info!(
                "event=db_open module=db status=ok target={} migrations_applied={} duration_ms={}",
                target,
                applied,
                started_at.elapsed().as_millis()
            );
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error target={} duration_ms={} error={}",
                target,
                started_at.elapsed().as_millis(),
                err
            );
        }
    }
    opened.map(|(conn, _)| conn)
}

fn prepare_store(conn: &mut Connection) -> DbResult<usize> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(apply_migrations(conn)?.len())
}
