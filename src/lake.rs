//! Contract of the lake a branch controller maintains.
//!
//! The lake owns branches, commits and objects. Maintenance only reads the
//! branch head, streams candidates from the lake's scans and asks the lake to
//! apply one atomic commit per candidate.

use std::time::SystemTime;

use futures_util::future::BoxFuture;

use crate::{
    cold::ColdThreshold,
    error::LakeError,
    id::{CommitId, ObjectId, PoolId},
    object::{IndexRule, ObjectIndexes, Run},
    pool::{Commitish, Layout},
    scan::ScanSink,
};

/// Future returned by [`Lake`] operations.
pub type LakeFuture<'a, T> = BoxFuture<'a, Result<T, LakeError>>;

/// Metadata attached to a maintenance commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitMessage {
    /// Who made the commit.
    pub author: String,
    /// Free-form description.
    pub body: String,
}

/// Inputs for a compaction candidate scan.
#[derive(Debug, Clone)]
pub struct CompactionScanRequest {
    /// Pool and commit to scan.
    pub at: Commitish,
    /// Pool identifier.
    pub pool_id: PoolId,
    /// Target object size of the pool.
    pub pool_threshold: u64,
    /// Layout governing scan order and overlap.
    pub layout: Layout,
    /// Objects younger than this are skipped.
    pub cold: ColdThreshold,
}

/// Inputs for an index-need scan.
#[derive(Debug, Clone)]
pub struct IndexScanRequest {
    /// Pool and commit to scan.
    pub at: Commitish,
    /// Objects younger than this are skipped.
    pub cold: ColdThreshold,
    /// Rules every object should carry.
    pub rules: Vec<IndexRule>,
}

/// Commit and query surface of a data lake.
///
/// Scans push candidates into the provided [`ScanSink`] as they are found and
/// return, once exhausted, the earliest moment a skipped object turns cold.
/// A scan must stop promptly once [`ScanSink::send`] fails.
///
/// Commit operations are atomic: they either advance the branch head and
/// return the new commit, or fail without changing the branch.
pub trait Lake: Send + Sync {
    /// Head commit of `branch` in `pool`.
    fn lookup_branch<'a>(&'a self, pool: &'a str, branch: &'a str) -> LakeFuture<'a, CommitId>;

    /// Stream runs of objects worth compacting together.
    fn compaction_scan(
        &self,
        request: CompactionScanRequest,
        sink: ScanSink<Run>,
    ) -> LakeFuture<'_, Option<SystemTime>>;

    /// Stream objects lacking some of the requested index rules.
    fn index_scan(
        &self,
        request: IndexScanRequest,
        sink: ScanSink<ObjectIndexes>,
    ) -> LakeFuture<'_, Option<SystemTime>>;

    /// Replace `objects` on `branch` with their compacted form.
    fn compact<'a>(
        &'a self,
        pool: PoolId,
        branch: &'a str,
        objects: &'a [ObjectId],
        message: CommitMessage,
    ) -> LakeFuture<'a, CommitId>;

    /// Build the indexes described by `rules` for `objects` on `branch`.
    fn apply_index_rules<'a>(
        &'a self,
        rules: &'a [IndexRule],
        pool: PoolId,
        branch: &'a str,
        objects: &'a [ObjectId],
    ) -> LakeFuture<'a, CommitId>;
}
