use std::error::Error as StdError;

use crate::{config::ConfigError, scan::SinkClosed, task::TaskKind};

/// Errors reported by a [`Lake`](crate::lake::Lake) implementation.
#[derive(Debug, thiserror::Error)]
pub enum LakeError {
    /// The named branch does not exist in the pool.
    #[error("branch {branch} not found in pool {pool}")]
    BranchNotFound {
        /// Pool name.
        pool: String,
        /// Branch name.
        branch: String,
    },
    /// The commit was evaluated against a stale or conflicting head.
    #[error("commit conflict: {0}")]
    Conflict(String),
    /// The request was abandoned before it completed.
    #[error("operation cancelled")]
    Cancelled,
    /// Transport or storage failure.
    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync>),
}

impl LakeError {
    /// Wrap an arbitrary failure.
    pub fn other(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        LakeError::Other(err.into())
    }
}

impl From<SinkClosed> for LakeError {
    fn from(_: SinkClosed) -> Self {
        LakeError::Cancelled
    }
}

/// Coarse classification of a [`MaintenanceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Configuration does not map onto the pool.
    ConfigResolution,
    /// The branch head could not be resolved.
    BranchLookup,
    /// A scan producer failed mid-stream.
    Scan,
    /// The lake rejected or failed to apply a commit.
    Commit,
    /// The cycle was cancelled.
    Cancellation,
}

/// Error returned by branch maintenance.
#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    /// Configuration could not be resolved for the pool.
    #[error("config resolution error: {0}")]
    Config(#[from] ConfigError),
    /// Branch lookup failed.
    #[error("branch lookup for {pool}@{branch} failed: {source}")]
    BranchLookup {
        /// Pool name.
        pool: String,
        /// Branch name.
        branch: String,
        /// Underlying lake failure.
        #[source]
        source: LakeError,
    },
    /// The scan producer failed.
    #[error("{task} scan failed: {source}")]
    Scan {
        /// Task whose scan failed.
        task: TaskKind,
        /// Underlying lake failure.
        #[source]
        source: LakeError,
    },
    /// A commit for one work item failed.
    #[error("{task} commit failed: {source}")]
    Commit {
        /// Task whose commit failed.
        task: TaskKind,
        /// Underlying lake failure.
        #[source]
        source: LakeError,
    },
    /// Cancelled before the task finished.
    #[error("{task} cancelled")]
    Cancelled {
        /// Task that observed the cancellation.
        task: TaskKind,
    },
}

impl MaintenanceError {
    /// Classification used for matching and logging.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MaintenanceError::Config(_) => ErrorKind::ConfigResolution,
            MaintenanceError::BranchLookup { .. } => ErrorKind::BranchLookup,
            MaintenanceError::Scan { .. } => ErrorKind::Scan,
            MaintenanceError::Commit { .. } => ErrorKind::Commit,
            MaintenanceError::Cancelled { .. } => ErrorKind::Cancellation,
        }
    }

    /// Whether the error stems from cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancellation
    }

    pub(crate) fn scan(task: TaskKind, source: LakeError) -> Self {
        match source {
            LakeError::Cancelled => MaintenanceError::Cancelled { task },
            source => MaintenanceError::Scan { task, source },
        }
    }

    pub(crate) fn commit(task: TaskKind, source: LakeError) -> Self {
        match source {
            LakeError::Cancelled => MaintenanceError::Cancelled { task },
            source => MaintenanceError::Commit { task, source },
        }
    }
}
