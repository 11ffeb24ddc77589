use std::sync::Arc;

use log::Level;
use tokio_util::sync::CancellationToken;

use super::{CompactionSummary, TaskKind, TaskOutcome, TaskSummary};
use crate::{
    branch::BranchContext,
    error::MaintenanceError,
    id::CommitId,
    lake::{CommitMessage, CompactionScanRequest},
    logging::{lake_log, LogContext},
    object::Run,
    pool::Commitish,
    scan::{cancellable, Scan},
};

/// Streams compaction runs from the lake and commits each one.
#[derive(Debug)]
pub(crate) struct CompactTask {
    branch: Arc<BranchContext>,
    pub(super) log: LogContext,
}

impl CompactTask {
    pub(crate) fn new(branch: Arc<BranchContext>, log: LogContext) -> Self {
        Self { branch, log }
    }

    fn cancelled() -> MaintenanceError {
        MaintenanceError::Cancelled {
            task: TaskKind::Compact,
        }
    }

    pub(crate) async fn run(
        &self,
        cancel: &CancellationToken,
        head: CommitId,
    ) -> Result<TaskOutcome, MaintenanceError> {
        lake_log!(Level::Debug, ctx: self.log, "compaction_started", "head={}", head);
        let branch = &self.branch;
        let request = CompactionScanRequest {
            at: Commitish {
                pool: branch.pool.name.clone(),
                commit: head,
            },
            pool_id: branch.pool.id,
            pool_threshold: branch.pool.threshold,
            layout: branch.pool.layout.clone(),
            cold: branch.config.compact.cold_threshold(),
        };
        let lake = Arc::clone(&branch.lake);
        let mut scan: Scan<Run> = Scan::spawn(cancel, move |sink| async move {
            lake.compaction_scan(request, sink).await
        });

        let mut summary = CompactionSummary::default();
        loop {
            let Some(next) = cancellable(cancel, scan.next()).await else {
                return Err(Self::cancelled());
            };
            let Some(run) = next else {
                break;
            };
            let objects = run.object_ids();
            let commit = cancellable(
                cancel,
                branch.lake.compact(
                    branch.pool.id,
                    &branch.config.branch,
                    &objects,
                    CommitMessage::default(),
                ),
            )
            .await
            .ok_or_else(Self::cancelled)?
            .map_err(|err| MaintenanceError::commit(TaskKind::Compact, err))?;
            summary.runs_found += 1;
            summary.objects_compacted += run.len();
            lake_log!(
                Level::Debug,
                ctx: self.log,
                "compacted",
                "commit={} objects_compacted={}",
                commit,
                run.len(),
            );
        }

        lake_log!(
            summary.completion_level(),
            ctx: self.log,
            "compaction_completed",
            "runs_found={} objects_compacted={}",
            summary.runs_found,
            summary.objects_compacted,
        );
        let next_cold = cancellable(cancel, scan.finish())
            .await
            .ok_or_else(Self::cancelled)?
            .map_err(|err| MaintenanceError::scan(TaskKind::Compact, err))?;
        Ok(TaskOutcome {
            next_cold,
            summary: TaskSummary::Compact(summary),
        })
    }
}
