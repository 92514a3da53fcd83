//! Backup plan with inline container expansion.
//!
//! # Invariants
//! - The open progress stage has room for every top-level unit plus every
//!   child unit appended while containers execute.
//! - Child units run immediately after their container, depth first.

use super::progress::{ProgressError, ProgressTracker};
use super::{BackupArchive, BackupRecord, TaskUnit};
use crate::model::block::{BlockId, BlockInstance};
use crate::repo::block_repo::BlockRepository;
use crate::repo::scope_repo::ScopeRepository;
use crate::service::relationship_service::{RelationshipError, RelationshipService};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupTaskKind {
    Block,
    Container,
}

/// One backup unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTask {
    pub block_uuid: BlockId,
    pub kind: BackupTaskKind,
    /// Container that appended this unit, if any.
    pub container_uuid: Option<BlockId>,
    pub executed: bool,
}

impl BackupTask {
    pub fn for_block(block: &BlockInstance, container_uuid: Option<BlockId>) -> Self {
        let kind = if block.is_container() {
            BackupTaskKind::Container
        } else {
            BackupTaskKind::Block
        };
        Self {
            block_uuid: block.block_uuid,
            kind,
            container_uuid,
            executed: false,
        }
    }
}

impl TaskUnit for BackupTask {
    fn block_uuid(&self) -> Option<BlockId> {
        Some(self.block_uuid)
    }
}

#[derive(Debug)]
pub enum BackupError {
    Relationship(RelationshipError),
    Progress(ProgressError),
    /// A unit appended by a container failed; the whole backup is void.
    ChildFailed {
        container_uuid: BlockId,
        child_uuid: BlockId,
        source: Box<BackupError>,
    },
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relationship(err) => write!(f, "{err}"),
            Self::Progress(err) => write!(f, "{err}"),
            Self::ChildFailed {
                container_uuid,
                child_uuid,
                source,
            } => write!(
                f,
                "backup of child {child_uuid} in container {container_uuid} failed: {source}"
            ),
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Relationship(err) => Some(err),
            Self::Progress(err) => Some(err),
            Self::ChildFailed { source, .. } => Some(source.as_ref()),
        }
    }
}

impl From<RelationshipError> for BackupError {
    fn from(value: RelationshipError) -> Self {
        Self::Relationship(value)
    }
}

impl From<ProgressError> for BackupError {
    fn from(value: ProgressError) -> Self {
        Self::Progress(value)
    }
}

/// Ordered backup units and the progress accumulator they report to.
#[derive(Debug, Default)]
pub struct BackupPlan {
    tasks: Vec<BackupTask>,
    progress: ProgressTracker,
    records: Vec<BackupRecord>,
}

impl BackupPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one top-level block.
    pub fn add_block(&mut self, block: &BlockInstance) {
        self.tasks.push(BackupTask::for_block(block, None));
    }

    pub fn tasks(&self) -> &[BackupTask] {
        &self.tasks
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Runs every queued unit inside one progress stage sized for them.
    /// Containers grow the stage and run their children inline.
    pub fn execute<B: BlockRepository, S: ScopeRepository>(
        &mut self,
        relationships: &RelationshipService<B, S>,
    ) -> Result<(), BackupError> {
        let queued = self.tasks.len();
        self.progress.start_stage(queued as u64);
        info!(
            "event=backup_execute module=backup status=start tasks={}",
            queued
        );

        for index in 0..queued {
            if let Err(err) = self.execute_task(relationships, index) {
                error!(
                    "event=backup_execute module=backup status=error task={} error={}",
                    index, err
                );
                return Err(err);
            }
        }

        info!(
            "event=backup_execute module=backup status=ok tasks={} records={}",
            self.tasks.len(),
            self.records.len()
        );
        Ok(())
    }

    /// Consumes the plan and returns the captured records.
    pub fn into_archive(self) -> BackupArchive {
        BackupArchive {
            records: self.records,
        }
    }

    fn execute_task<B: BlockRepository, S: ScopeRepository>(
        &mut self,
        relationships: &RelationshipService<B, S>,
        index: usize,
    ) -> Result<(), BackupError> {
        let task = self.tasks[index].clone();
        let block = relationships.get_block(task.block_uuid)?;
        let positions = relationships
            .blocks()
            .list_positions(block.block_uuid)
            .map_err(RelationshipError::from)?;
        self.records.push(BackupRecord {
            block,
            container_uuid: task.container_uuid,
            positions,
        });
        self.tasks[index].executed = true;
        self.progress.advance(1)?;

        if task.kind != BackupTaskKind::Container {
            return Ok(());
        }

        let children = relationships.list_children(task.block_uuid)?;
        self.progress.expand_last_stage(children.len() as u64)?;
        for child in &children {
            self.tasks
                .push(BackupTask::for_block(child, Some(task.block_uuid)));
            let child_index = self.tasks.len() - 1;
            self.execute_task(relationships, child_index)
                .map_err(|source| BackupError::ChildFailed {
                    container_uuid: task.block_uuid,
                    child_uuid: child.block_uuid,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }
}
