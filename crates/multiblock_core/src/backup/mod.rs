//! Backup and restore task plans.
//!
//! # Responsibility
//! - Expand container units into one unit per child while a backup runs.
//! - Order restore units so every container is restored before the plain
//!   blocks that may live inside it.
//!
//! # Invariants
//! - A backup either captures every nested child or fails as a whole.
//! - Restore re-sequencing never fails; an unexpected plan shape is logged
//!   and left untouched.

pub mod backup_plan;
pub mod progress;
pub mod restore_plan;

pub use backup_plan::{BackupError, BackupPlan, BackupTask, BackupTaskKind};
pub use progress::{ProgressError, ProgressTracker};
pub use restore_plan::{
    ResequenceOutcome, RestoreError, RestorePlan, RestoreSummary, RestoreTask, RestoreTaskKind,
};

use crate::model::block::{BlockId, BlockInstance, BlockPosition};
use serde::{Deserialize, Serialize};

/// Contract every backup or restore unit exposes to the host job.
///
/// Containers keep nothing beyond their own block row, so every hook
/// defaults to empty.
pub trait TaskUnit {
    /// Block the unit handles. `None` for structural units.
    fn block_uuid(&self) -> Option<BlockId>;

    fn settings(&self) -> Vec<String> {
        Vec::new()
    }

    fn file_areas(&self) -> Vec<String> {
        Vec::new()
    }

    /// Config attributes that need base64 handling in the archive.
    fn configdata_encoded_attributes(&self) -> Vec<String> {
        Vec::new()
    }

    fn decode_contents(&self) -> Vec<String> {
        Vec::new()
    }

    fn decode_rules(&self) -> Vec<String> {
        Vec::new()
    }
}

/// One captured block with the container it was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub block: BlockInstance,
    /// Container whose scope owns the block, when it was captured as a child.
    pub container_uuid: Option<BlockId>,
    pub positions: Vec<BlockPosition>,
}

/// Serialized result of one backup job, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupArchive {
    pub records: Vec<BackupRecord>,
}

impl BackupArchive {
    pub fn record(&self, block_uuid: BlockId) -> Option<&BackupRecord> {
        self.records
            .iter()
            .find(|record| record.block.block_uuid == block_uuid)
    }

    /// Builds the restore plan for this archive: one structural root unit
    /// followed by one unit per record, re-sequenced as they register.
    pub fn restore_plan(&self) -> RestorePlan {
        let mut plan = RestorePlan::new();
        plan.add_task(RestoreTask::structural("root"));
        for record in &self.records {
            plan.add_task(RestoreTask::for_block(&record.block));
        }
        plan
    }
}
