//! Scope hierarchy repository.
//!
//! # Responsibility
//! - Create and resolve scopes.
//! - Compute ancestor paths from the parent chain.
//!
//! # Invariants
//! - Ancestor paths are returned root first and end with the requested scope.
//! - Path walks stop after `MAX_SCOPE_DEPTH` hops so a corrupt cycle cannot
//!   loop forever.

use super::block_repo::{parse_uuid, StoreError, StoreResult};
use super::ensure_store_ready;
use crate::model::block::{BlockId, Scope, ScopeId, ScopeLevel};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const MAX_SCOPE_DEPTH: i64 = 64;

/// Repository interface for the scope hierarchy.
pub trait ScopeRepository {
    /// Creates one scope under an optional parent.
    fn create_scope(
        &self,
        parent_uuid: Option<ScopeId>,
        level: ScopeLevel,
        instance_key: Option<&str>,
    ) -> StoreResult<Scope>;
    fn get_scope(&self, scope_uuid: ScopeId) -> StoreResult<Option<Scope>>;
    /// Finds the scope registered for one host instance.
    fn find_scope(&self, level: ScopeLevel, instance_key: &str) -> StoreResult<Option<Scope>>;
    /// Returns the scope owned by one block.
    fn block_scope(&self, block_uuid: BlockId) -> StoreResult<Option<Scope>>;
    /// Returns the path from the root down to `scope_uuid`, inclusive.
    fn ancestor_path(&self, scope_uuid: ScopeId) -> StoreResult<Vec<Scope>>;
    /// Moves a scope (and implicitly everything beneath it) under a new parent.
    fn reparent_scope(&self, scope_uuid: ScopeId, new_parent_uuid: ScopeId) -> StoreResult<()>;
}

/// SQLite-backed scope repository.
pub struct SqliteScopeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteScopeRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ScopeRepository for SqliteScopeRepository<'_> {
    fn create_scope(
        &self,
        parent_uuid: Option<ScopeId>,
        level: ScopeLevel,
        instance_key: Option<&str>,
    ) -> StoreResult<Scope> {
        if let Some(parent_uuid) = parent_uuid {
            if self.get_scope(parent_uuid)?.is_none() {
                return Err(StoreError::ScopeNotFound(parent_uuid));
            }
        }

        let scope = Scope {
            scope_uuid: Uuid::new_v4(),
            parent_uuid,
            level,
            instance_key: instance_key.map(str::to_string),
        };
        insert_scope(self.conn, &scope)?;
        Ok(scope)
    }

    fn get_scope(&self, scope_uuid: ScopeId) -> StoreResult<Option<Scope>> {
        load_scope(self.conn, scope_uuid)
    }

    fn find_scope(&self, level: ScopeLevel, instance_key: &str) -> StoreResult<Option<Scope>> {
        let mut stmt = self.conn.prepare(
            "SELECT scope_uuid, parent_uuid, level, instance_key
             FROM scopes
             WHERE level = ?1
               AND instance_key = ?2
             ORDER BY created_at ASC, scope_uuid ASC
             LIMIT 1;",
        )?;
        let mut rows = stmt.query(params![level.as_str(), instance_key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_scope_row(row)?));
        }
        Ok(None)
    }

    fn block_scope(&self, block_uuid: BlockId) -> StoreResult<Option<Scope>> {
        load_block_scope(self.conn, block_uuid)
    }

    fn ancestor_path(&self, scope_uuid: ScopeId) -> StoreResult<Vec<Scope>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE chain(scope_uuid, parent_uuid, level, instance_key, depth) AS (
                SELECT scope_uuid, parent_uuid, level, instance_key, 0
                FROM scopes
                WHERE scope_uuid = ?1
                UNION ALL
                SELECT s.scope_uuid, s.parent_uuid, s.level, s.instance_key, chain.depth + 1
                FROM scopes s
                INNER JOIN chain ON s.scope_uuid = chain.parent_uuid
                WHERE chain.depth < ?2
            )
            SELECT scope_uuid, parent_uuid, level, instance_key
            FROM chain
            ORDER BY depth DESC;",
        )?;
        let mut rows = stmt.query(params![scope_uuid.to_string(), MAX_SCOPE_DEPTH])?;
        let mut path = Vec::new();
        while let Some(row) = rows.next()? {
            path.push(parse_scope_row(row)?);
        }
        if path.is_empty() {
            return Err(StoreError::ScopeNotFound(scope_uuid));
        }
        Ok(path)
    }

    fn reparent_scope(&self, scope_uuid: ScopeId, new_parent_uuid: ScopeId) -> StoreResult<()> {
        reparent_scope_row(self.conn, scope_uuid, new_parent_uuid)
    }
}

/// Points one scope at a new parent on `conn`, which may be an open
/// transaction.
pub(crate) fn reparent_scope_row(
    conn: &Connection,
    scope_uuid: ScopeId,
    new_parent_uuid: ScopeId,
) -> StoreResult<()> {
    if load_scope(conn, new_parent_uuid)?.is_none() {
        return Err(StoreError::ScopeNotFound(new_parent_uuid));
    }
    let changed = conn.execute(
        "UPDATE scopes SET parent_uuid = ?2 WHERE scope_uuid = ?1;",
        params![scope_uuid.to_string(), new_parent_uuid.to_string()],
    )?;
    if changed == 0 {
        return Err(StoreError::ScopeNotFound(scope_uuid));
    }
    Ok(())
}

pub(crate) fn insert_scope(conn: &Connection, scope: &Scope) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO scopes (scope_uuid, parent_uuid, level, instance_key)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            scope.scope_uuid.to_string(),
            scope.parent_uuid.map(|value| value.to_string()),
            scope.level.as_str(),
            scope.instance_key.as_deref(),
        ],
    )?;
    Ok(())
}

pub(crate) fn load_scope(conn: &Connection, scope_uuid: ScopeId) -> StoreResult<Option<Scope>> {
    let mut stmt = conn.prepare(
        "SELECT scope_uuid, parent_uuid, level, instance_key
         FROM scopes
         WHERE scope_uuid = ?1;",
    )?;
    let mut rows = stmt.query([scope_uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_scope_row(row)?));
    }
    Ok(None)
}

pub(crate) fn load_block_scope(
    conn: &Connection,
    block_uuid: BlockId,
) -> StoreResult<Option<Scope>> {
    let scope_uuid: Option<String> = conn
        .query_row(
            "SELECT scope_uuid
             FROM scopes
             WHERE level = 'block'
               AND instance_key = ?1;",
            [block_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match scope_uuid {
        Some(value) => load_scope(conn, parse_uuid(&value, "scopes.scope_uuid")?),
        None => Ok(None),
    }
}

fn parse_scope_row(row: &Row<'_>) -> StoreResult<Scope> {
    let scope_uuid_text: String = row.get("scope_uuid")?;
    let parent_uuid = row
        .get::<_, Option<String>>("parent_uuid")?
        .map(|value| parse_uuid(&value, "scopes.parent_uuid"))
        .transpose()?;
    let level_text: String = row.get("level")?;
    let level = ScopeLevel::parse(&level_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid scope level `{level_text}` in scopes.level"))
    })?;

    Ok(Scope {
        scope_uuid: parse_uuid(&scope_uuid_text, "scopes.scope_uuid")?,
        parent_uuid,
        level,
        instance_key: row.get("instance_key")?,
    })
}
