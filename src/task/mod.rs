//! Maintenance tasks bound to one branch.
//!
//! Each task pairs a scan producer with a consumer loop that applies one
//! commit per streamed item. Tasks share the branch state through
//! [`BranchContext`](crate::branch::BranchContext) and differ only in what
//! they scan for and which commit they issue.

mod compact;
mod index;

use std::{
    fmt::{self, Display},
    time::SystemTime,
};

use log::Level;
use tokio_util::sync::CancellationToken;

pub(crate) use compact::CompactTask;
pub(crate) use index::IndexTask;

use crate::{error::MaintenanceError, id::CommitId, logging::LogContext};

/// Kind of maintenance a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Merge overlapping or undersized objects.
    Compact,
    /// Build missing secondary indexes.
    Index,
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Compact => f.write_str("compact"),
            TaskKind::Index => f.write_str("index"),
        }
    }
}

/// Counters of one compaction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionSummary {
    /// Runs committed.
    pub runs_found: usize,
    /// Input objects replaced across all runs.
    pub objects_compacted: usize,
}

impl CompactionSummary {
    /// Level of the completion record: informational only when something
    /// was compacted.
    pub fn completion_level(&self) -> Level {
        if self.objects_compacted > 0 {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

/// Counters of one index run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Objects that received new indexes.
    pub objects_indexed: usize,
    /// Indexes built across all objects.
    pub indexes_created: usize,
}

impl IndexSummary {
    /// Level of the completion record: informational only when something
    /// was indexed.
    pub fn completion_level(&self) -> Level {
        if self.objects_indexed > 0 {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

/// Counters reported by a task, by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSummary {
    /// Compaction counters.
    Compact(CompactionSummary),
    /// Index counters.
    Index(IndexSummary),
}

impl TaskSummary {
    /// Kind of task that produced the summary.
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskSummary::Compact(_) => TaskKind::Compact,
            TaskSummary::Index(_) => TaskKind::Index,
        }
    }

    /// Number of commits the task issued.
    pub fn commits(&self) -> usize {
        match self {
            TaskSummary::Compact(s) => s.runs_found,
            TaskSummary::Index(s) => s.objects_indexed,
        }
    }

    /// Level the task's completion record was logged at.
    pub fn completion_level(&self) -> Level {
        match self {
            TaskSummary::Compact(s) => s.completion_level(),
            TaskSummary::Index(s) => s.completion_level(),
        }
    }
}

/// Result of a task that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOutcome {
    /// Earliest moment an object skipped as too young turns cold.
    pub next_cold: Option<SystemTime>,
    /// What the task did.
    pub summary: TaskSummary,
}

/// A maintenance task of either kind.
#[derive(Debug)]
pub(crate) enum BranchTask {
    Compact(CompactTask),
    Index(IndexTask),
}

impl BranchTask {
    pub(crate) fn kind(&self) -> TaskKind {
        match self {
            BranchTask::Compact(_) => TaskKind::Compact,
            BranchTask::Index(_) => TaskKind::Index,
        }
    }

    pub(crate) fn log(&self) -> &LogContext {
        match self {
            BranchTask::Compact(task) => &task.log,
            BranchTask::Index(task) => &task.log,
        }
    }

    /// Run the task against the snapshot at `head`.
    pub(crate) async fn run(
        &self,
        cancel: &CancellationToken,
        head: CommitId,
    ) -> Result<TaskOutcome, MaintenanceError> {
        match self {
            BranchTask::Compact(task) => task.run(cancel, head).await,
            BranchTask::Index(task) => task.run(cancel, head).await,
        }
    }
}
