use std::sync::Arc;

use log::Level;
use tokio_util::sync::CancellationToken;

use super::{IndexSummary, TaskKind, TaskOutcome, TaskSummary};
use crate::{
    branch::BranchContext,
    error::MaintenanceError,
    id::CommitId,
    lake::IndexScanRequest,
    logging::{lake_log, LogContext},
    object::ObjectIndexes,
    pool::Commitish,
    scan::{cancellable, Scan},
};

/// Streams objects lacking configured indexes and applies the missing rules
/// one object at a time.
#[derive(Debug)]
pub(crate) struct IndexTask {
    branch: Arc<BranchContext>,
    pub(super) log: LogContext,
}

impl IndexTask {
    pub(crate) fn new(branch: Arc<BranchContext>, log: LogContext) -> Self {
        Self { branch, log }
    }

    fn cancelled() -> MaintenanceError {
        MaintenanceError::Cancelled {
            task: TaskKind::Index,
        }
    }

    pub(crate) async fn run(
        &self,
        cancel: &CancellationToken,
        head: CommitId,
    ) -> Result<TaskOutcome, MaintenanceError> {
        lake_log!(Level::Debug, ctx: self.log, "index_started", "head={}", head);
        let branch = &self.branch;
        let request = IndexScanRequest {
            at: Commitish {
                pool: branch.pool.name.clone(),
                commit: head,
            },
            cold: branch.config.index.cold_threshold,
            rules: branch.config.index.rules.clone(),
        };
        let lake = Arc::clone(&branch.lake);
        let mut scan: Scan<ObjectIndexes> = Scan::spawn(cancel, move |sink| async move {
            lake.index_scan(request, sink).await
        });

        let mut summary = IndexSummary::default();
        loop {
            let Some(next) = cancellable(cancel, scan.next()).await else {
                return Err(Self::cancelled());
            };
            let Some(needs) = next else {
                break;
            };
            let object = needs.object.id;
            let commit = cancellable(
                cancel,
                branch.lake.apply_index_rules(
                    &needs.needs_index,
                    branch.pool.id,
                    &branch.config.branch,
                    &[object],
                ),
            )
            .await
            .ok_or_else(Self::cancelled)?
            .map_err(|err| MaintenanceError::commit(TaskKind::Index, err))?;
            summary.objects_indexed += 1;
            summary.indexes_created += needs.needs_index.len();
            lake_log!(
                Level::Debug,
                ctx: self.log,
                "indexed",
                "commit={} object={} indexes_created={}",
                commit,
                object,
                needs.needs_index.len(),
            );
        }

        lake_log!(
            summary.completion_level(),
            ctx: self.log,
            "index_completed",
            "objects_indexed={} indexes_created={}",
            summary.objects_indexed,
            summary.indexes_created,
        );
        let next_cold = cancellable(cancel, scan.finish())
            .await
            .ok_or_else(Self::cancelled)?
            .map_err(|err| MaintenanceError::scan(TaskKind::Index, err))?;
        Ok(TaskOutcome {
            next_cold,
            summary: TaskSummary::Index(summary),
        })
    }
}
