//! Block instance repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist block instances together with the scope each block owns.
//! - Apply relationship changes (owning scope, placement, weight, position
//!   records) atomically.
//!
//! # Invariants
//! - A block row and its `block` scope are created and deleted together.
//! - Child listing is deterministic: `default_weight ASC, block_uuid ASC`.
//! - Appended weights are computed inside the writing transaction.

use super::ensure_store_ready;
use super::scope_repo::{insert_scope, load_block_scope, reparent_scope_row};
use crate::db::DbError;
use crate::model::block::{
    BlockId, BlockInstance, BlockPosition, NewBlockInstance, Placement, Scope, ScopeId,
    ScopeLevel,
};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const BLOCK_SELECT_SQL: &str = "SELECT
    block_uuid,
    block_type,
    parent_scope_uuid,
    show_in_subscopes,
    required_by_theme,
    page_type_pattern,
    sub_page_pattern,
    default_region,
    default_weight,
    config_json,
    created_at,
    updated_at
FROM block_instances";

const POSITION_SELECT_SQL: &str = "SELECT
    position_uuid,
    block_uuid,
    scope_uuid,
    page_type,
    sub_page,
    visible,
    region,
    weight
FROM block_positions";

/// Result type used by block store repositories.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from block store repositories.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    BlockNotFound(BlockId),
    ScopeNotFound(ScopeId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::BlockNotFound(id) => write!(f, "block instance not found: {id}"),
            Self::ScopeNotFound(id) => write!(f, "scope not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "block store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "block store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid block store data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Which of the child's position records a relocation discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionCleanup {
    Keep,
    All,
    /// Everything except records in this scope.
    OutsideScope(ScopeId),
}

/// One child re-targeted to a new owning scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildRelocation {
    pub child_uuid: BlockId,
    pub target_scope_uuid: ScopeId,
    /// Placement written to the child. `default_weight` is ignored when
    /// `append` is set.
    pub placement: Placement,
    /// Assign `max(weight) + 1` among the target scope's blocks.
    pub append: bool,
    pub cleanup: PositionCleanup,
    /// Position records to add; slots the child already occupies are skipped.
    pub add_positions: Vec<BlockPosition>,
}

/// Repository interface for block instances and their position records.
pub trait BlockRepository {
    /// Instantiates a block and the scope it owns.
    fn create_block(&self, block: &NewBlockInstance) -> StoreResult<BlockInstance>;
    fn get_block(&self, block_uuid: BlockId) -> StoreResult<Option<BlockInstance>>;
    /// Lists blocks owned by one scope in display order.
    fn list_blocks_in_scope(&self, scope_uuid: ScopeId) -> StoreResult<Vec<BlockInstance>>;
    fn list_blocks_of_type(&self, block_type: &str) -> StoreResult<Vec<BlockInstance>>;
    /// Returns `max(default_weight) + 1` for one owning scope, `1` when empty.
    fn next_weight(&self, scope_uuid: ScopeId) -> StoreResult<i64>;
    /// Rewrites weights for the given blocks in one transaction.
    fn update_weights(&self, weights: &[(BlockId, i64)]) -> StoreResult<()>;
    fn update_config(&self, block_uuid: BlockId, config: &Value) -> StoreResult<()>;
    fn list_positions(&self, block_uuid: BlockId) -> StoreResult<Vec<BlockPosition>>;
    fn list_positions_in_scope(
        &self,
        block_uuid: BlockId,
        scope_uuid: ScopeId,
    ) -> StoreResult<Vec<BlockPosition>>;
    fn insert_position(&self, position: &BlockPosition) -> StoreResult<()>;
    /// Applies one relocation atomically and returns the updated child.
    fn relocate_child(&self, relocation: &ChildRelocation) -> StoreResult<BlockInstance>;
    /// Applies every relocation in one transaction; any failure keeps all
    /// blocks where they were.
    fn relocate_children(&self, relocations: &[ChildRelocation]) -> StoreResult<()>;
    /// Relocates every child, then deletes the emptied container.
    fn dissolve_container(
        &self,
        container_uuid: BlockId,
        relocations: &[ChildRelocation],
    ) -> StoreResult<()>;
    /// Deletes a block, every block nested under its scope, their scopes and
    /// position records. Returns the number of block rows removed.
    fn delete_block_tree(&self, block_uuid: BlockId) -> StoreResult<usize>;
}

/// SQLite-backed block repository.
pub struct SqliteBlockRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBlockRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_ready(conn)?;
        Ok(Self { conn })
    }
}

impl BlockRepository for SqliteBlockRepository<'_> {
    fn create_block(&self, block: &NewBlockInstance) -> StoreResult<BlockInstance> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if super::scope_repo::load_scope(&tx, block.parent_scope_uuid)?.is_none() {
            return Err(StoreError::ScopeNotFound(block.parent_scope_uuid));
        }

        let block_uuid = Uuid::new_v4();
        let placement = &block.placement;
        let weight = if block.append_weight {
            next_weight(&tx, block.parent_scope_uuid)?
        } else {
            placement.default_weight
        };
        tx.execute(
            "INSERT INTO block_instances (
                block_uuid,
                block_type,
                parent_scope_uuid,
                show_in_subscopes,
                required_by_theme,
                page_type_pattern,
                sub_page_pattern,
                default_region,
                default_weight,
                config_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                block_uuid.to_string(),
                block.block_type,
                block.parent_scope_uuid.to_string(),
                placement.show_in_subscopes,
                placement.required_by_theme,
                placement.page_type_pattern,
                placement.sub_page_pattern,
                placement.default_region,
                weight,
                block.config.to_string(),
            ],
        )?;
        insert_scope(
            &tx,
            &Scope {
                scope_uuid: Uuid::new_v4(),
                parent_uuid: Some(block.parent_scope_uuid),
                level: ScopeLevel::Block,
                instance_key: Some(block_uuid.to_string()),
            },
        )?;

        let created = load_required_block(&tx, block_uuid)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_block(&self, block_uuid: BlockId) -> StoreResult<Option<BlockInstance>> {
        load_block(self.conn, block_uuid)
    }

    fn list_blocks_in_scope(&self, scope_uuid: ScopeId) -> StoreResult<Vec<BlockInstance>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BLOCK_SELECT_SQL}
             WHERE parent_scope_uuid = ?1
             ORDER BY default_weight ASC, block_uuid ASC;"
        ))?;
        let mut rows = stmt.query([scope_uuid.to_string()])?;
        let mut blocks = Vec::new();
        while let Some(row) = rows.next()? {
            blocks.push(parse_block_row(row)?);
        }
        Ok(blocks)
    }

    fn list_blocks_of_type(&self, block_type: &str) -> StoreResult<Vec<BlockInstance>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BLOCK_SELECT_SQL}
             WHERE block_type = ?1
             ORDER BY created_at ASC, block_uuid ASC;"
        ))?;
        let mut rows = stmt.query([block_type])?;
        let mut blocks = Vec::new();
        while let Some(row) = rows.next()? {
            blocks.push(parse_block_row(row)?);
        }
        Ok(blocks)
    }

    fn next_weight(&self, scope_uuid: ScopeId) -> StoreResult<i64> {
        next_weight(self.conn, scope_uuid)
    }

    fn update_weights(&self, weights: &[(BlockId, i64)]) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for (block_uuid, weight) in weights {
            let changed = tx.execute(
                "UPDATE block_instances
                 SET default_weight = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE block_uuid = ?1;",
                params![block_uuid.to_string(), weight],
            )?;
            if changed == 0 {
                return Err(StoreError::BlockNotFound(*block_uuid));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn update_config(&self, block_uuid: BlockId, config: &Value) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE block_instances
             SET config_json = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE block_uuid = ?1;",
            params![block_uuid.to_string(), config.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::BlockNotFound(block_uuid));
        }
        Ok(())
    }

    fn list_positions(&self, block_uuid: BlockId) -> StoreResult<Vec<BlockPosition>> {
        let mut stmt = self.conn.prepare(&format!(
            "{POSITION_SELECT_SQL}
             WHERE block_uuid = ?1
             ORDER BY scope_uuid ASC, page_type ASC, sub_page ASC;"
        ))?;
        let mut rows = stmt.query([block_uuid.to_string()])?;
        let mut positions = Vec::new();
        while let Some(row) = rows.next()? {
            positions.push(parse_position_row(row)?);
        }
        Ok(positions)
    }

    fn list_positions_in_scope(
        &self,
        block_uuid: BlockId,
        scope_uuid: ScopeId,
    ) -> StoreResult<Vec<BlockPosition>> {
        list_positions_in_scope(self.conn, block_uuid, scope_uuid)
    }

    fn insert_position(&self, position: &BlockPosition) -> StoreResult<()> {
        insert_position_if_absent(self.conn, position)?;
        Ok(())
    }

    fn relocate_child(&self, relocation: &ChildRelocation) -> StoreResult<BlockInstance> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        apply_relocation(&tx, relocation)?;
        let updated = load_required_block(&tx, relocation.child_uuid)?;
        tx.commit()?;
        Ok(updated)
    }

    fn relocate_children(&self, relocations: &[ChildRelocation]) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for relocation in relocations {
            apply_relocation(&tx, relocation)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn dissolve_container(
        &self,
        container_uuid: BlockId,
        relocations: &[ChildRelocation],
    ) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        load_required_block(&tx, container_uuid)?;
        for relocation in relocations {
            apply_relocation(&tx, relocation)?;
        }
        delete_subtree(&tx, container_uuid)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_block_tree(&self, block_uuid: BlockId) -> StoreResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        load_required_block(&tx, block_uuid)?;
        let removed = delete_subtree(&tx, block_uuid)?;
        tx.commit()?;
        Ok(removed)
    }
}

fn apply_relocation(conn: &Connection, relocation: &ChildRelocation) -> StoreResult<()> {
    let child_uuid = relocation.child_uuid;
    load_required_block(conn, child_uuid)?;
    let child_scope =
        load_block_scope(conn, child_uuid)?.ok_or_else(|| missing_block_scope(child_uuid))?;

    let weight = if relocation.append {
        next_weight(conn, relocation.target_scope_uuid)?
    } else {
        relocation.placement.default_weight
    };

    let placement = &relocation.placement;
    conn.execute(
        "UPDATE block_instances
         SET parent_scope_uuid = ?2,
             show_in_subscopes = ?3,
             required_by_theme = ?4,
             page_type_pattern = ?5,
             sub_page_pattern = ?6,
             default_region = ?7,
             default_weight = ?8,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE block_uuid = ?1;",
        params![
            child_uuid.to_string(),
            relocation.target_scope_uuid.to_string(),
            placement.show_in_subscopes,
            placement.required_by_theme,
            placement.page_type_pattern,
            placement.sub_page_pattern,
            placement.default_region,
            weight,
        ],
    )?;

    match relocation.cleanup {
        PositionCleanup::Keep => {}
        PositionCleanup::All => {
            conn.execute(
                "DELETE FROM block_positions WHERE block_uuid = ?1;",
                [child_uuid.to_string()],
            )?;
        }
        PositionCleanup::OutsideScope(scope_uuid) => {
            conn.execute(
                "DELETE FROM block_positions WHERE block_uuid = ?1 AND scope_uuid <> ?2;",
                params![child_uuid.to_string(), scope_uuid.to_string()],
            )?;
        }
    }
    for position in &relocation.add_positions {
        insert_position_if_absent(conn, &position.cloned_for(child_uuid))?;
    }

    reparent_scope_row(conn, child_scope.scope_uuid, relocation.target_scope_uuid)
}

/// Inserts `position` unless the block already occupies that slot. Returns
/// whether a row was written.
fn insert_position_if_absent(conn: &Connection, position: &BlockPosition) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM block_positions
            WHERE block_uuid = ?1
              AND scope_uuid = ?2
              AND page_type = ?3
              AND sub_page = ?4
        );",
        params![
            position.block_uuid.to_string(),
            position.scope_uuid.to_string(),
            position.page_type,
            position.sub_page,
        ],
        |row| row.get(0),
    )?;
    if exists == 1 {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO block_positions (
            position_uuid,
            block_uuid,
            scope_uuid,
            page_type,
            sub_page,
            visible,
            region,
            weight
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
        params![
            position.position_uuid.to_string(),
            position.block_uuid.to_string(),
            position.scope_uuid.to_string(),
            position.page_type,
            position.sub_page,
            position.visible,
            position.region,
            position.weight,
        ],
    )?;
    Ok(true)
}

fn delete_subtree(conn: &Connection, block_uuid: BlockId) -> StoreResult<usize> {
    let root_scope =
        load_block_scope(conn, block_uuid)?.ok_or_else(|| missing_block_scope(block_uuid))?;
    let root_scope_uuid = root_scope.scope_uuid.to_string();

    let removed = conn.execute(
        "WITH RECURSIVE subtree(scope_uuid) AS (
            SELECT scope_uuid FROM scopes WHERE scope_uuid = ?2
            UNION
            SELECT child.scope_uuid
            FROM scopes child
            INNER JOIN subtree parent ON child.parent_uuid = parent.scope_uuid
        )
        DELETE FROM block_instances
        WHERE block_uuid = ?1
           OR parent_scope_uuid IN (SELECT scope_uuid FROM subtree);",
        params![block_uuid.to_string(), root_scope_uuid],
    )?;
    conn.execute(
        "WITH RECURSIVE subtree(scope_uuid) AS (
            SELECT scope_uuid FROM scopes WHERE scope_uuid = ?1
            UNION
            SELECT child.scope_uuid
            FROM scopes child
            INNER JOIN subtree parent ON child.parent_uuid = parent.scope_uuid
        )
        DELETE FROM scopes
        WHERE scope_uuid IN (SELECT scope_uuid FROM subtree);",
        [root_scope_uuid],
    )?;
    Ok(removed)
}

fn next_weight(conn: &Connection, scope_uuid: ScopeId) -> StoreResult<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(default_weight), 0) + 1
         FROM block_instances
         WHERE parent_scope_uuid = ?1;",
        [scope_uuid.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn list_positions_in_scope(
    conn: &Connection,
    block_uuid: BlockId,
    scope_uuid: ScopeId,
) -> StoreResult<Vec<BlockPosition>> {
    let mut stmt = conn.prepare(&format!(
        "{POSITION_SELECT_SQL}
         WHERE block_uuid = ?1
           AND scope_uuid = ?2
         ORDER BY page_type ASC, sub_page ASC;"
    ))?;
    let mut rows = stmt.query(params![block_uuid.to_string(), scope_uuid.to_string()])?;
    let mut positions = Vec::new();
    while let Some(row) = rows.next()? {
        positions.push(parse_position_row(row)?);
    }
    Ok(positions)
}

fn load_block(conn: &Connection, block_uuid: BlockId) -> StoreResult<Option<BlockInstance>> {
    let mut stmt = conn.prepare(&format!("{BLOCK_SELECT_SQL} WHERE block_uuid = ?1;"))?;
    let mut rows = stmt.query([block_uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_block_row(row)?));
    }
    Ok(None)
}

fn load_required_block(conn: &Connection, block_uuid: BlockId) -> StoreResult<BlockInstance> {
    load_block(conn, block_uuid)?.ok_or(StoreError::BlockNotFound(block_uuid))
}

fn missing_block_scope(block_uuid: BlockId) -> StoreError {
    StoreError::InvalidData(format!("block {block_uuid} has no block scope"))
}

fn parse_block_row(row: &Row<'_>) -> StoreResult<BlockInstance> {
    let block_uuid_text: String = row.get("block_uuid")?;
    let parent_scope_text: String = row.get("parent_scope_uuid")?;
    let config_text: String = row.get("config_json")?;
    let config = serde_json::from_str(&config_text).map_err(|err| {
        StoreError::InvalidData(format!("invalid json in block_instances.config_json: {err}"))
    })?;

    Ok(BlockInstance {
        block_uuid: parse_uuid(&block_uuid_text, "block_instances.block_uuid")?,
        block_type: row.get("block_type")?,
        parent_scope_uuid: parse_uuid(&parent_scope_text, "block_instances.parent_scope_uuid")?,
        placement: Placement {
            show_in_subscopes: parse_flag(row, "show_in_subscopes")?,
            required_by_theme: parse_flag(row, "required_by_theme")?,
            page_type_pattern: row.get("page_type_pattern")?,
            sub_page_pattern: row.get("sub_page_pattern")?,
            default_region: row.get("default_region")?,
            default_weight: row.get("default_weight")?,
        },
        config,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_position_row(row: &Row<'_>) -> StoreResult<BlockPosition> {
    let position_uuid: String = row.get("position_uuid")?;
    let block_uuid: String = row.get("block_uuid")?;
    let scope_uuid: String = row.get("scope_uuid")?;

    Ok(BlockPosition {
        position_uuid: parse_uuid(&position_uuid, "block_positions.position_uuid")?,
        block_uuid: parse_uuid(&block_uuid, "block_positions.block_uuid")?,
        scope_uuid: parse_uuid(&scope_uuid, "block_positions.scope_uuid")?,
        page_type: row.get("page_type")?,
        sub_page: row.get("sub_page")?,
        visible: parse_flag(row, "visible")?,
        region: row.get("region")?,
        weight: row.get("weight")?,
    })
}

fn parse_flag(row: &Row<'_>, column: &'static str) -> StoreResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
