//! Container/child relationship use-case service.
//!
//! # Responsibility
//! - Move children into containers and split them back out.
//! - Resolve the nearest non-container ancestor of a child.
//! - Own ordering, add, delete and decompose use cases above the repositories.
//!
//! # Invariants
//! - A block is never moved into itself or into a container nested under it.
//! - A moved child is appended after every existing child of the container.
//! - A split child lands in the nearest scope whose level is not `block`.
//! - No container is deleted while a child still references its scope.

use crate::config::MultiblockSettings;
use crate::model::block::{
    is_valid_block_type, BlockId, BlockInstance, NewBlockInstance, Placement, Scope, ScopeId,
    ScopeLevel, CONTAINER_BLOCK_TYPE,
};
use crate::repo::block_repo::{BlockRepository, ChildRelocation, PositionCleanup, StoreError};
use crate::repo::scope_repo::ScopeRepository;
use log::{error, info, warn};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse classification of relationship failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipErrorKind {
    NotFound,
    InvalidState,
    /// The scope tree is corrupt in a way no caller input can cause.
    OrderingInvariantViolation,
    Storage,
}

/// Errors from relationship service operations.
#[derive(Debug)]
pub enum RelationshipError {
    BlockNotFound(BlockId),
    ScopeNotFound(ScopeId),
    /// Target block exists but is not a container.
    NotAContainer(BlockId),
    /// A block cannot contain itself.
    SelfReference(BlockId),
    /// The container lives inside the child being moved.
    CycleDetected {
        child_uuid: BlockId,
        container_uuid: BlockId,
    },
    ChildNotInContainer {
        child_uuid: BlockId,
        container_uuid: BlockId,
    },
    /// Container still has children and the caller asked for a plain delete.
    ContainerNotEmpty(BlockId),
    InvalidBlockType(String),
    /// No ancestor of the block's scope is a non-block scope.
    OrderingInvariantViolation(BlockId),
    /// Repository-level failure.
    Store(StoreError),
}

impl RelationshipError {
    pub fn kind(&self) -> RelationshipErrorKind {
        match self {
            Self::BlockNotFound(_) | Self::ScopeNotFound(_) | Self::ChildNotInContainer { .. } => {
                RelationshipErrorKind::NotFound
            }
            Self::NotAContainer(_)
            | Self::SelfReference(_)
            | Self::CycleDetected { .. }
            | Self::ContainerNotEmpty(_)
            | Self::InvalidBlockType(_) => RelationshipErrorKind::InvalidState,
            Self::OrderingInvariantViolation(_) => {
                RelationshipErrorKind::OrderingInvariantViolation
            }
            Self::Store(_) => RelationshipErrorKind::Storage,
        }
    }
}

impl Display for RelationshipError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlockNotFound(id) => write!(f, "block instance not found: {id}"),
            Self::ScopeNotFound(id) => write!(f, "scope not found: {id}"),
            Self::NotAContainer(id) => write!(f, "block is not a container: {id}"),
            Self::SelfReference(id) => write!(f, "block cannot contain itself: {id}"),
            Self::CycleDetected {
                child_uuid,
                container_uuid,
            } => write!(
                f,
                "move would create cycle: block {child_uuid} into container {container_uuid}"
            ),
            Self::ChildNotInContainer {
                child_uuid,
                container_uuid,
            } => write!(
                f,
                "block {child_uuid} is not a child of container {container_uuid}"
            ),
            Self::ContainerNotEmpty(id) => write!(f, "container still has children: {id}"),
            Self::InvalidBlockType(value) => write!(f, "invalid block type `{value}`"),
            Self::OrderingInvariantViolation(id) => write!(
                f,
                "no non-container ancestor scope found for block {id}"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RelationshipError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RelationshipError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::BlockNotFound(id) => Self::BlockNotFound(id),
            StoreError::ScopeNotFound(id) => Self::ScopeNotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Direction for one reorder step on the manage page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderDirection {
    Up,
    Down,
}

/// Container delete mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerDeleteMode {
    /// Delete the container together with every block nested under it.
    Cascade,
    /// Split every child out first, then delete the emptied container.
    SplitChildren,
}

/// Outcome of a container delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerDeleteSummary {
    /// Block rows removed, the container included.
    pub deleted: usize,
    /// Children re-targeted to the ancestor scope.
    pub split: usize,
}

/// Relationship service facade.
pub struct RelationshipService<B: BlockRepository, S: ScopeRepository> {
    blocks: B,
    scopes: S,
}

impl<B: BlockRepository, S: ScopeRepository> RelationshipService<B, S> {
    /// Creates service from repository implementations.
    pub fn new(blocks: B, scopes: S) -> Self {
        Self { blocks, scopes }
    }

    pub fn blocks(&self) -> &B {
        &self.blocks
    }

    pub fn scopes(&self) -> &S {
        &self.scopes
    }

    pub fn get_block(&self, block_uuid: BlockId) -> Result<BlockInstance, RelationshipError> {
        self.blocks
            .get_block(block_uuid)?
            .ok_or(RelationshipError::BlockNotFound(block_uuid))
    }

    pub fn get_scope(&self, scope_uuid: ScopeId) -> Result<Scope, RelationshipError> {
        self.scopes
            .get_scope(scope_uuid)?
            .ok_or(RelationshipError::ScopeNotFound(scope_uuid))
    }

    /// Loads a block and checks that it is a container.
    pub fn get_container(
        &self,
        container_uuid: BlockId,
    ) -> Result<BlockInstance, RelationshipError> {
        let container = self.get_block(container_uuid)?;
        if !container.is_container() {
            return Err(RelationshipError::NotAContainer(container_uuid));
        }
        Ok(container)
    }

    /// Returns the scope a block owns.
    pub fn block_scope(&self, block_uuid: BlockId) -> Result<Scope, RelationshipError> {
        match self.scopes.block_scope(block_uuid)? {
            Some(scope) => Ok(scope),
            None => {
                self.get_block(block_uuid)?;
                Err(StoreError::InvalidData(format!("block {block_uuid} has no block scope"))
                    .into())
            }
        }
    }

    /// Lists a container's children in display order.
    pub fn list_children(
        &self,
        container_uuid: BlockId,
    ) -> Result<Vec<BlockInstance>, RelationshipError> {
        self.get_container(container_uuid)?;
        let scope = self.block_scope(container_uuid)?;
        self.blocks
            .list_blocks_in_scope(scope.scope_uuid)
            .map_err(Into::into)
    }

    /// Returns the weight the next appended child of a container receives.
    pub fn next_weight(&self, container_uuid: BlockId) -> Result<i64, RelationshipError> {
        self.get_container(container_uuid)?;
        let scope = self.block_scope(container_uuid)?;
        self.blocks
            .next_weight(scope.scope_uuid)
            .map_err(Into::into)
    }

    /// Moves a block into a container as its last child.
    ///
    /// The child takes the container's visibility, theme, page pattern and
    /// region settings, and loses every explicit position record it had.
    pub fn move_child_into(
        &self,
        child_uuid: BlockId,
        container_uuid: BlockId,
    ) -> Result<BlockInstance, RelationshipError> {
        if child_uuid == container_uuid {
            return Err(RelationshipError::SelfReference(child_uuid));
        }
        let container = self.get_container(container_uuid)?;
        self.get_block(child_uuid)?;

        let container_scope = self.block_scope(container_uuid)?;
        let child_scope = self.block_scope(child_uuid)?;
        let container_path = self.scopes.ancestor_path(container_scope.scope_uuid)?;
        if container_path
            .iter()
            .any(|scope| scope.scope_uuid == child_scope.scope_uuid)
        {
            return Err(RelationshipError::CycleDetected {
                child_uuid,
                container_uuid,
            });
        }

        let source = &container.placement;
        let relocation = ChildRelocation {
            child_uuid,
            target_scope_uuid: container_scope.scope_uuid,
            placement: Placement {
                show_in_subscopes: source.show_in_subscopes,
                required_by_theme: source.required_by_theme,
                page_type_pattern: source.page_type_pattern.clone(),
                sub_page_pattern: source.sub_page_pattern.clone(),
                default_region: source.default_region.clone(),
                default_weight: 0,
            },
            append: true,
            cleanup: PositionCleanup::All,
            add_positions: Vec::new(),
        };
        let moved = self.blocks.relocate_child(&relocation)?;
        info!(
            "event=child_move_into module=relationship status=ok child={} container={} weight={}",
            child_uuid, container_uuid, moved.placement.default_weight
        );
        Ok(moved)
    }

    /// Splits a child out of its container into the nearest non-container
    /// ancestor scope.
    ///
    /// A block already owned by the ancestor scope is returned untouched, so
    /// repeating a split changes nothing.
    pub fn split_child_out(
        &self,
        container_uuid: BlockId,
        child_uuid: BlockId,
    ) -> Result<BlockInstance, RelationshipError> {
        let container = self.get_container(container_uuid)?;
        let child = self.get_block(child_uuid)?;
        let container_scope = self.block_scope(container_uuid)?;
        let ancestor = self.find_nearest_noncontainer_ancestor(container_uuid)?;

        if child.parent_scope_uuid == ancestor.scope_uuid {
            return Ok(child);
        }
        if child.parent_scope_uuid != container_scope.scope_uuid {
            return Err(RelationshipError::ChildNotInContainer {
                child_uuid,
                container_uuid,
            });
        }

        let relocation = self.split_relocation(&container, &child, &ancestor)?;
        let split = self.blocks.relocate_child(&relocation)?;
        info!(
            "event=child_split_out module=relationship status=ok child={} container={} scope={}",
            child_uuid, container_uuid, ancestor.scope_uuid
        );
        Ok(split)
    }

    /// Walks the block's scope path upwards, skipping its own scope, and
    /// returns the first scope that is not a block scope.
    pub fn find_nearest_noncontainer_ancestor(
        &self,
        block_uuid: BlockId,
    ) -> Result<Scope, RelationshipError> {
        let own_scope = self.block_scope(block_uuid)?;
        let path = self.scopes.ancestor_path(own_scope.scope_uuid)?;
        path.into_iter()
            .rev()
            .filter(|scope| scope.scope_uuid != own_scope.scope_uuid)
            .find(|scope| scope.level != ScopeLevel::Block)
            .ok_or_else(|| {
                error!(
                    "event=ancestor_resolve module=relationship status=error block={} reason=no_noncontainer_ancestor",
                    block_uuid
                );
                RelationshipError::OrderingInvariantViolation(block_uuid)
            })
    }

    /// Swaps one child with its neighbour and rewrites weights as `1..=n`.
    pub fn reorder_child(
        &self,
        container_uuid: BlockId,
        child_uuid: BlockId,
        direction: ReorderDirection,
    ) -> Result<Vec<BlockInstance>, RelationshipError> {
        let mut children = self.list_children(container_uuid)?;
        let index = children
            .iter()
            .position(|child| child.block_uuid == child_uuid)
            .ok_or(RelationshipError::ChildNotInContainer {
                child_uuid,
                container_uuid,
            })?;

        match direction {
            ReorderDirection::Up if index > 0 => children.swap(index, index - 1),
            ReorderDirection::Down if index + 1 < children.len() => {
                children.swap(index, index + 1)
            }
            _ => {}
        }

        let weights = children
            .iter()
            .zip(1_i64..)
            .map(|(child, weight)| (child.block_uuid, weight))
            .collect::<Vec<_>>();
        self.blocks.update_weights(&weights)?;
        self.list_children(container_uuid)
    }

    /// Instantiates a container in `parent_scope_uuid`, seeding its title and
    /// layout from the settings, then adds the default children.
    pub fn create_container(
        &self,
        parent_scope_uuid: ScopeId,
        placement: Placement,
        settings: &MultiblockSettings,
    ) -> Result<BlockInstance, RelationshipError> {
        let mut config = Map::new();
        let title = settings.default_title.trim();
        if !title.is_empty() {
            config.insert("title".to_string(), Value::from(title));
        }
        if let Some(layout_id) = settings
            .default_layout
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            config.insert("presentation".to_string(), Value::from(layout_id));
        }

        let container = self.blocks.create_block(&NewBlockInstance {
            block_type: CONTAINER_BLOCK_TYPE.to_string(),
            parent_scope_uuid,
            placement,
            config: Value::Object(config),
            append_weight: false,
        })?;
        info!(
            "event=container_create module=relationship status=ok container={} scope={}",
            container.block_uuid, parent_scope_uuid
        );
        let children = self.add_default_children(container.block_uuid, settings)?;
        if !children.is_empty() {
            info!(
                "event=container_create module=relationship status=defaults_added container={} children={}",
                container.block_uuid,
                children.len()
            );
        }
        Ok(container)
    }

    /// Instantiates a new block and places it last in the container.
    pub fn add_child(
        &self,
        container_uuid: BlockId,
        block_type: &str,
        config: Value,
    ) -> Result<BlockInstance, RelationshipError> {
        if !is_valid_block_type(block_type) {
            return Err(RelationshipError::InvalidBlockType(block_type.to_string()));
        }
        let container = self.get_container(container_uuid)?;
        let container_scope = self.block_scope(container_uuid)?;

        let created = self.blocks.create_block(&NewBlockInstance {
            block_type: block_type.to_string(),
            parent_scope_uuid: container_scope.scope_uuid,
            placement: container.placement.clone(),
            config,
            append_weight: true,
        })?;
        info!(
            "event=child_add module=relationship status=ok child={} container={} block_type={}",
            created.block_uuid, container_uuid, block_type
        );
        Ok(created)
    }

    /// Adds one child per configured default sub-block type.
    pub fn add_default_children(
        &self,
        container_uuid: BlockId,
        settings: &MultiblockSettings,
    ) -> Result<Vec<BlockInstance>, RelationshipError> {
        let mut created = Vec::new();
        for block_type in &settings.default_sub_blocks {
            let block_type = block_type.trim();
            if block_type == CONTAINER_BLOCK_TYPE || !is_valid_block_type(block_type) {
                warn!(
                    "event=child_add_default module=relationship status=skipped container={} block_type={}",
                    container_uuid, block_type
                );
                continue;
            }
            let config = Value::Object(Default::default());
            created.push(self.add_child(container_uuid, block_type, config)?);
        }
        Ok(created)
    }

    /// Deletes a block. Containers must be empty.
    pub fn delete_block(&self, block_uuid: BlockId) -> Result<(), RelationshipError> {
        let block = self.get_block(block_uuid)?;
        if block.is_container() && !self.list_children(block_uuid)?.is_empty() {
            return Err(RelationshipError::ContainerNotEmpty(block_uuid));
        }
        self.blocks.delete_block_tree(block_uuid)?;
        info!(
            "event=block_delete module=relationship status=ok block={}",
            block_uuid
        );
        Ok(())
    }

    /// Deletes a container by mode.
    pub fn delete_container(
        &self,
        container_uuid: BlockId,
        mode: ContainerDeleteMode,
    ) -> Result<ContainerDeleteSummary, RelationshipError> {
        let container = self.get_container(container_uuid)?;
        let summary = match mode {
            ContainerDeleteMode::Cascade => ContainerDeleteSummary {
                deleted: self.blocks.delete_block_tree(container_uuid)?,
                split: 0,
            },
            ContainerDeleteMode::SplitChildren => {
                let ancestor = self.find_nearest_noncontainer_ancestor(container_uuid)?;
                let relocations = self
                    .list_children(container_uuid)?
                    .iter()
                    .map(|child| self.split_relocation(&container, child, &ancestor))
                    .collect::<Result<Vec<_>, _>>()?;
                self.blocks
                    .dissolve_container(container_uuid, &relocations)?;
                ContainerDeleteSummary {
                    deleted: 1,
                    split: relocations.len(),
                }
            }
        };
        info!(
            "event=container_delete module=relationship status=ok container={} mode={:?} deleted={} split={}",
            container_uuid, mode, summary.deleted, summary.split
        );
        Ok(summary)
    }

    /// Splits every child out of every container in one transaction. Returns
    /// the number of children split.
    ///
    /// Relocations are planned before anything moves, so each child mirrors
    /// the positions its own container had when the call started.
    pub fn decompose_all_containers(&self) -> Result<usize, RelationshipError> {
        let containers = self.blocks.list_blocks_of_type(CONTAINER_BLOCK_TYPE)?;
        let mut relocations = Vec::new();
        for container in &containers {
            let children = self.list_children(container.block_uuid)?;
            if children.is_empty() {
                continue;
            }
            let ancestor = self.find_nearest_noncontainer_ancestor(container.block_uuid)?;
            for child in &children {
                relocations.push(self.split_relocation(container, child, &ancestor)?);
            }
        }
        self.blocks.relocate_children(&relocations)?;
        info!(
            "event=containers_decompose module=relationship status=ok containers={} split={}",
            containers.len(),
            relocations.len()
        );
        Ok(relocations.len())
    }

    fn split_relocation(
        &self,
        container: &BlockInstance,
        child: &BlockInstance,
        ancestor: &Scope,
    ) -> Result<ChildRelocation, RelationshipError> {
        let container_positions = self
            .blocks
            .list_positions_in_scope(container.block_uuid, ancestor.scope_uuid)?;
        let default_region = container_positions
            .first()
            .map(|position| position.region.clone())
            .unwrap_or_else(|| child.placement.default_region.clone());

        let source = &container.placement;
        Ok(ChildRelocation {
            child_uuid: child.block_uuid,
            target_scope_uuid: ancestor.scope_uuid,
            placement: Placement {
                show_in_subscopes: source.show_in_subscopes,
                required_by_theme: source.required_by_theme,
                page_type_pattern: source.page_type_pattern.clone(),
                sub_page_pattern: source.sub_page_pattern.clone(),
                default_region,
                default_weight: source.default_weight,
            },
            append: false,
            cleanup: PositionCleanup::OutsideScope(ancestor.scope_uuid),
            add_positions: container_positions,
        })
    }
}
