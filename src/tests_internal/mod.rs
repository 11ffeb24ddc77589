#![cfg(test)]


use std::{sync::Arc, time::Duration};

use crate::{
    test_support::MemoryLake, BranchController, Config, IndexRule, Lake, LogContext,
    MaintenanceError,
};

pub(crate) const HOUR: Duration = Duration::from_secs(3600);

/// Controller for the lake's pool, built from `config`.
pub(crate) fn controller(
    lake: &Arc<MemoryLake>,
    config: &Config,
    rules: &[IndexRule],
) -> Result<BranchController, MaintenanceError> {
    let handle: Arc<dyn Lake> = lake.clone();
    BranchController::new(
        config,
        Arc::new(lake.pool().clone()),
        rules,
        handle,
        &LogContext::new("maintenance-test"),
    )
}

/// Add `n` cold pairs of overlapping objects with disjoint key spans; each
/// pair becomes one compaction run.
pub(crate) fn add_disjoint_pairs(lake: &MemoryLake, n: usize) {
    for i in 0..n {
        lake.add_object_aged(HOUR, &format!("k{i}a"), &format!("k{i}c"), 100);
        lake.add_object_aged(HOUR, &format!("k{i}b"), &format!("k{i}d"), 100);
    }
}
