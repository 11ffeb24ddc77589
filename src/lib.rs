#![deny(missing_docs)]
//! Background maintenance for data lake branches.
//!
//! A [`BranchController`] is bound to one branch of one pool. Every cycle it
//! resolves the branch head, then compacts overlapping cold objects and
//! builds missing secondary indexes, one atomic commit per work item. The
//! cycle reports when the next object turns cold so a scheduler can come back
//! exactly then.
//!
//! Storage, commits and scans are provided by a [`Lake`] implementation.

mod logging;

/// Per-branch controller running the maintenance tasks.
pub mod branch;

/// Cold-threshold policy and next-cold tracking.
pub mod cold;

/// Configuration and its per-pool resolution.
pub mod config;

/// Error types.
pub mod error;

/// Identifier aliases and generation.
pub mod id;

/// Lake contract consumed by the controller.
pub mod lake;

/// Data objects, runs and index rules.
pub mod object;

/// Pool descriptors and layouts.
pub mod pool;

/// Producer/consumer plumbing for streamed scans.
pub mod scan;

/// Maintenance task kinds and their reports.
pub mod task;

pub use crate::{
    branch::{BranchController, CycleReport},
    cold::ColdThreshold,
    config::{BranchConfig, CompactConfig, Config, ConfigError, IndexConfig, PoolOverride},
    error::{ErrorKind, LakeError, MaintenanceError},
    lake::{Lake, LakeFuture},
    logging::LogContext,
    object::{DataObject, IndexRule, KeyRange, ObjectIndexes, Run},
    pool::{Layout, Order, PoolConfig},
    scan::{ScanSink, SinkClosed},
    task::{TaskKind, TaskOutcome, TaskSummary},
};

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod tests_internal;
