//! Nested progress accumulator for backup jobs.
//!
//! # Invariants
//! - Each stage's current value never exceeds its capacity.
//! - Only the innermost stage can be advanced or expanded.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    /// No stage is open.
    NoStage,
    Overflow {
        stage: usize,
        max: u64,
        requested: u64,
    },
}

impl Display for ProgressError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoStage => write!(f, "no progress stage is open"),
            Self::Overflow {
                stage,
                max,
                requested,
            } => write!(
                f,
                "progress stage {stage} overflow: {requested} exceeds capacity {max}"
            ),
        }
    }
}

impl Error for ProgressError {}

/// Stack of progress stages, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressTracker {
    maxes: Vec<u64>,
    current: Vec<u64>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a nested stage with room for `max` steps.
    pub fn start_stage(&mut self, max: u64) {
        self.maxes.push(max);
        self.current.push(0);
    }

    /// Closes the innermost stage and returns `(current, max)`.
    pub fn end_stage(&mut self) -> Result<(u64, u64), ProgressError> {
        match (self.current.pop(), self.maxes.pop()) {
            (Some(current), Some(max)) => Ok((current, max)),
            _ => Err(ProgressError::NoStage),
        }
    }

    /// Advances the innermost stage by `steps`.
    pub fn advance(&mut self, steps: u64) -> Result<(), ProgressError> {
        let stage = self.depth().checked_sub(1).ok_or(ProgressError::NoStage)?;
        let requested = self.current[stage] + steps;
        if requested > self.maxes[stage] {
            return Err(ProgressError::Overflow {
                stage,
                max: self.maxes[stage],
                requested,
            });
        }
        self.current[stage] = requested;
        Ok(())
    }

    /// Raises the innermost stage's capacity by `extra` steps.
    pub fn expand_last_stage(&mut self, extra: u64) -> Result<(), ProgressError> {
        let max = self.maxes.last_mut().ok_or(ProgressError::NoStage)?;
        *max += extra;
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.maxes.len()
    }

    pub fn last_stage_max(&self) -> Option<u64> {
        self.maxes.last().copied()
    }

    pub fn last_stage_current(&self) -> Option<u64> {
        self.current.last().copied()
    }
}
