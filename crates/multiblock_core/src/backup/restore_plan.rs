//! Restore plan and container re-sequencing.
//!
//! # Invariants
//! - A container unit sits before the first plain block unit that was queued
//!   when it registered, or at the tail when there was none.
//! - Re-sequencing is stable for every other unit.

use super::{BackupArchive, TaskUnit};
use crate::model::block::{BlockId, BlockInstance, NewBlockInstance, ScopeId};
use crate::repo::block_repo::{BlockRepository, StoreError};
use crate::repo::scope_repo::ScopeRepository;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreTaskKind {
    /// Root, course, section or activity unit.
    Structural,
    Block,
    Container,
}

/// One restore unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreTask {
    pub task_id: Uuid,
    pub kind: RestoreTaskKind,
    pub label: String,
    pub block_uuid: Option<BlockId>,
}

impl RestoreTask {
    pub fn structural(label: impl Into<String>) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            kind: RestoreTaskKind::Structural,
            label: label.into(),
            block_uuid: None,
        }
    }

    pub fn block(label: impl Into<String>, block_uuid: BlockId) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            kind: RestoreTaskKind::Block,
            label: label.into(),
            block_uuid: Some(block_uuid),
        }
    }

    pub fn container(label: impl Into<String>, block_uuid: BlockId) -> Self {
        Self {
            kind: RestoreTaskKind::Container,
            ..Self::block(label, block_uuid)
        }
    }

    pub fn for_block(block: &BlockInstance) -> Self {
        if block.is_container() {
            Self::container(block.block_type.as_str(), block.block_uuid)
        } else {
            Self::block(block.block_type.as_str(), block.block_uuid)
        }
    }
}

impl TaskUnit for RestoreTask {
    fn block_uuid(&self) -> Option<BlockId> {
        self.block_uuid
    }
}

/// Where a registering container unit ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResequenceOutcome {
    /// Moved to this index, ahead of the first plain block unit.
    Spliced(usize),
    /// No plain block unit queued; left last.
    Tail,
    /// The tail was not the registering unit; plan untouched.
    Degraded,
}

#[derive(Debug)]
pub enum RestoreError {
    /// A plan unit has no record in the archive.
    MissingRecord(BlockId),
    /// A block's original owning scope has no target in the destination.
    UnmappedParentScope {
        block_uuid: BlockId,
        scope_uuid: ScopeId,
    },
    /// A child was reached before its container was restored.
    ContainerNotRestored {
        child_uuid: BlockId,
        container_uuid: BlockId,
    },
    Store(StoreError),
}

impl Display for RestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRecord(id) => write!(f, "archive has no record for block {id}"),
            Self::UnmappedParentScope {
                block_uuid,
                scope_uuid,
            } => write!(
                f,
                "no destination scope for scope {scope_uuid} of block {block_uuid}"
            ),
            Self::ContainerNotRestored {
                child_uuid,
                container_uuid,
            } => write!(
                f,
                "child {child_uuid} reached before container {container_uuid} was restored"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RestoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RestoreError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Result of materializing an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Archived block id to restored block id.
    pub restored: BTreeMap<BlockId, BlockId>,
    pub positions: usize,
}

/// Ordered restore units owned by one restore job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestorePlan {
    tasks: Vec<RestoreTask>,
}

impl RestorePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[RestoreTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Appends a unit. Container units re-sequence themselves on arrival.
    pub fn add_task(&mut self, task: RestoreTask) -> Option<ResequenceOutcome> {
        let is_container = task.kind == RestoreTaskKind::Container;
        let task_id = task.task_id;
        self.tasks.push(task);
        is_container.then(|| self.register_container(task_id))
    }

    pub fn take_last(&mut self) -> Option<RestoreTask> {
        self.tasks.pop()
    }

    /// Inserts at `index`, clamped to the plan length.
    pub fn insert_before(&mut self, index: usize, task: RestoreTask) {
        let index = index.min(self.tasks.len());
        self.tasks.insert(index, task);
    }

    /// Moves the just-registered container unit ahead of the first plain
    /// block unit.
    pub fn register_container(&mut self, task_id: Uuid) -> ResequenceOutcome {
        if self.tasks.last().map(|task| task.task_id) != Some(task_id) {
            warn!(
                "event=restore_resequence module=backup status=degraded task={} reason=not_tail",
                task_id
            );
            return ResequenceOutcome::Degraded;
        }
        let Some(task) = self.take_last() else {
            return ResequenceOutcome::Degraded;
        };

        match self
            .tasks
            .iter()
            .position(|queued| queued.kind == RestoreTaskKind::Block)
        {
            Some(index) => {
                self.insert_before(index, task);
                debug!(
                    "event=restore_resequence module=backup status=ok task={} index={}",
                    task_id, index
                );
                ResequenceOutcome::Spliced(index)
            }
            None => {
                self.tasks.push(task);
                ResequenceOutcome::Tail
            }
        }
    }

    /// Recreates every archived block in plan order.
    ///
    /// `scope_map` maps archived owning scopes of top-level blocks and
    /// position scopes to destination scopes. Children land in the block
    /// scope of their restored container.
    pub fn execute<B: BlockRepository, S: ScopeRepository>(
        &self,
        archive: &BackupArchive,
        blocks: &B,
        scopes: &S,
        scope_map: &BTreeMap<ScopeId, ScopeId>,
    ) -> Result<RestoreSummary, RestoreError> {
        let mut summary = RestoreSummary::default();
        for task in &self.tasks {
            let Some(block_uuid) = task.block_uuid else {
                continue;
            };
            let record = archive
                .record(block_uuid)
                .ok_or(RestoreError::MissingRecord(block_uuid))?;

            let parent_scope_uuid = match record.container_uuid {
                Some(container_uuid) => {
                    let restored_container = summary.restored.get(&container_uuid).copied().ok_or(
                        RestoreError::ContainerNotRestored {
                            child_uuid: block_uuid,
                            container_uuid,
                        },
                    )?;
                    scopes
                        .block_scope(restored_container)?
                        .ok_or(StoreError::BlockNotFound(restored_container))?
                        .scope_uuid
                }
                None => {
                    let archived_scope = record.block.parent_scope_uuid;
                    *scope_map
                        .get(&archived_scope)
                        .ok_or(RestoreError::UnmappedParentScope {
                            block_uuid,
                            scope_uuid: archived_scope,
                        })?
                }
            };

            let created = blocks.create_block(&NewBlockInstance {
                block_type: record.block.block_type.clone(),
                parent_scope_uuid,
                placement: record.block.placement.clone(),
                config: record.block.config.clone(),
                append_weight: false,
            })?;

            for position in &record.positions {
                let Some(scope_uuid) = scope_map.get(&position.scope_uuid) else {
                    debug!(
                        "event=restore_position module=backup status=skipped block={} scope={}",
                        block_uuid, position.scope_uuid
                    );
                    continue;
                };
                let mut restored = position.cloned_for(created.block_uuid);
                restored.scope_uuid = *scope_uuid;
                blocks.insert_position(&restored)?;
                summary.positions += 1;
            }
            summary.restored.insert(block_uuid, created.block_uuid);
        }

        info!(
            "event=restore_execute module=backup status=ok blocks={} positions={}",
            summary.restored.len(),
            summary.positions
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::{ResequenceOutcome, RestorePlan, RestoreTask, RestoreTaskKind};
    use uuid::Uuid;

    fn kinds(plan: &RestorePlan) -> Vec<RestoreTaskKind> {
        plan.tasks().iter().map(|task| task.kind).collect()
    }

    #[test]
    fn container_without_block_units_stays_last() {
        let mut plan = RestorePlan::new();
        assert_eq!(plan.add_task(RestoreTask::structural("root")), None);
        let outcome = plan.add_task(RestoreTask::container("multiblock", Uuid::new_v4()));

        assert_eq!(outcome, Some(ResequenceOutcome::Tail));
        assert_eq!(
            kinds(&plan),
            vec![RestoreTaskKind::Structural, RestoreTaskKind::Container]
        );
    }

    #[test]
    fn register_leaves_plan_untouched_when_tail_differs() {
        let mut plan = RestorePlan::new();
        plan.add_task(RestoreTask::block("html", Uuid::new_v4()));
        let before = plan.clone();

        assert_eq!(
            plan.register_container(Uuid::new_v4()),
            ResequenceOutcome::Degraded
        );
        assert_eq!(plan, before);
    }

    #[test]
    fn insert_before_clamps_to_length() {
        let mut plan = RestorePlan::new();
        plan.insert_before(5, RestoreTask::structural("root"));
        assert_eq!(plan.len(), 1);
        assert!(plan.take_last().is_some());
        assert!(plan.is_empty());
    }
}
