//! Per-branch maintenance controller.
//!
//! A [`BranchController`] is what an external scheduler holds for every
//! maintained branch. Each call to [`BranchController::run_cycle`] re-reads
//! the branch head and runs the enabled tasks in order, compaction first.

use std::{fmt, sync::Arc, time::SystemTime};

use log::Level;
use tokio_util::sync::CancellationToken;

use crate::{
    cold::earliest,
    config::{BranchConfig, Config},
    error::MaintenanceError,
    id::CommitId,
    lake::Lake,
    logging::{lake_log, LogContext},
    object::IndexRule,
    pool::PoolConfig,
    scan::cancellable,
    task::{BranchTask, CompactTask, IndexTask, TaskKind, TaskOutcome},
};

/// Branch state shared by every task of a controller.
pub(crate) struct BranchContext {
    pub(crate) pool: Arc<PoolConfig>,
    pub(crate) config: BranchConfig,
    pub(crate) lake: Arc<dyn Lake>,
}

impl fmt::Debug for BranchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchContext")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What one maintenance cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Earliest next cold time reported by any task.
    pub next_cold: Option<SystemTime>,
    /// Outcome of every task, in the order they ran.
    pub outcomes: Vec<TaskOutcome>,
}

/// Runs compaction and indexing for one branch of one pool.
#[derive(Debug)]
pub struct BranchController {
    branch: Arc<BranchContext>,
    tasks: Vec<BranchTask>,
    log: LogContext,
}

impl BranchController {
    /// Bind a controller to the branch `config` selects for `pool`.
    ///
    /// Fails with a configuration error when `config` does not resolve for
    /// the pool, e.g. an index rule name matches none of `rules`.
    pub fn new(
        config: &Config,
        pool: Arc<PoolConfig>,
        rules: &[IndexRule],
        lake: Arc<dyn Lake>,
        log: &LogContext,
    ) -> Result<Self, MaintenanceError> {
        let resolved = config.resolve(&pool, rules)?;
        let log = log
            .named("pool")
            .with("name", &pool.name)
            .with("id", pool.id)
            .with("branch", &resolved.branch);
        let branch = Arc::new(BranchContext {
            pool,
            config: resolved,
            lake,
        });

        let mut tasks = Vec::with_capacity(2);
        if branch.config.compact.enabled() {
            tasks.push(BranchTask::Compact(CompactTask::new(
                Arc::clone(&branch),
                log.named("compact"),
            )));
        }
        if branch.config.index.enabled() {
            tasks.push(BranchTask::Index(IndexTask::new(
                Arc::clone(&branch),
                log.named("index"),
            )));
        }
        lake_log!(
            Level::Debug,
            ctx: log,
            "branch_configured",
            "compact_enabled={} compact_cold={:?} index_rules={} index_cold={:?}",
            branch.config.compact.enabled(),
            branch.config.compact.cold_threshold().duration(),
            branch.config.index.rules.len(),
            branch.config.index.cold_threshold.duration(),
        );
        Ok(Self { branch, tasks, log })
    }

    /// Name of the maintained branch.
    pub fn branch(&self) -> &str {
        &self.branch.config.branch
    }

    /// Pool the branch belongs to.
    pub fn pool(&self) -> &PoolConfig {
        &self.branch.pool
    }

    /// Resolved settings.
    pub fn config(&self) -> &BranchConfig {
        &self.branch.config
    }

    /// Kinds of the configured tasks, in run order.
    pub fn tasks(&self) -> Vec<TaskKind> {
        self.tasks.iter().map(BranchTask::kind).collect()
    }

    /// Current head commit of the branch.
    pub async fn resolve_head(&self) -> Result<CommitId, MaintenanceError> {
        let pool = &self.branch.pool.name;
        let branch = &self.branch.config.branch;
        self.branch
            .lake
            .lookup_branch(pool, branch)
            .await
            .map_err(|source| MaintenanceError::BranchLookup {
                pool: pool.clone(),
                branch: branch.clone(),
                source,
            })
    }

    /// Run every task once and return the earliest moment a skipped object
    /// turns cold.
    pub async fn run_cycle(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<SystemTime>, MaintenanceError> {
        Ok(self.run_cycle_report(cancel).await?.next_cold)
    }

    /// Like [`BranchController::run_cycle`], also returning per-task
    /// outcomes.
    ///
    /// The first failing task aborts the cycle. Commits made before the
    /// failure are kept.
    pub async fn run_cycle_report(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, MaintenanceError> {
        let mut report = CycleReport::default();
        for task in &self.tasks {
            let outcome = match self.run_task(task, cancel).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let level = if err.is_cancelled() {
                        Level::Debug
                    } else {
                        Level::Warn
                    };
                    lake_log!(
                        level,
                        ctx: task.log(),
                        "task_failed",
                        "kind={:?} error={}",
                        err.kind(),
                        err,
                    );
                    return Err(err);
                }
            };
            report.next_cold = earliest(report.next_cold, outcome.next_cold);
            report.outcomes.push(outcome);
        }
        Ok(report)
    }

    async fn run_task(
        &self,
        task: &BranchTask,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome, MaintenanceError> {
        let head = cancellable(cancel, self.resolve_head())
            .await
            .ok_or(MaintenanceError::Cancelled { task: task.kind() })??;
        task.run(cancel, head).await
    }

    /// When the scheduler should start the next cycle: at `next_cold` if
    /// that comes before the configured interval elapses.
    pub fn next_wake(&self, next_cold: Option<SystemTime>, now: SystemTime) -> SystemTime {
        let interval = self.branch.config.interval;
        let deadline = now.checked_add(interval).unwrap_or(now);
        match next_cold {
            Some(cold) if cold < deadline => cold.max(now),
            _ => deadline,
        }
    }

    /// Logging context of the controller.
    pub fn log(&self) -> &LogContext {
        &self.log
    }
}
