//! Test-only utilities (compiled under `cfg(test)` only).
//!
//! [`MemoryLake`] keeps one pool in memory and implements [`Lake`] with naive
//! scans, plus knobs to inject commit failures and stalled or failing scans.
//! [`LogCapture`] records the crate's log events emitted on the test thread.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, Once,
    },
    time::{Duration, SystemTime},
};

use futures_util::FutureExt;
use log::{Level, LevelFilter, Log, Metadata, Record};
use tokio::sync::Notify;
use ulid::Ulid;

use crate::{
    cold::{ColdThreshold, NextCold},
    error::LakeError,
    id::{CommitId, IdGenerator, ObjectId, PoolId},
    lake::{CommitMessage, CompactionScanRequest, IndexScanRequest, Lake, LakeFuture},
    logging::LOG_TARGET,
    object::{DataObject, IndexRule, KeyRange, ObjectIndexes, Run},
    pool::{Layout, Order, PoolConfig},
    scan::ScanSink,
};

/// Injected misbehaviour of the next scans.
#[derive(Debug, Clone)]
enum ScanFault {
    /// Emit `after` items, then wait until the consumer goes away.
    Stall { after: usize },
    /// Emit `after` items, then fail.
    Fail { after: usize, message: String },
    /// Emit everything, drop the sink and never return.
    Detach,
}

#[derive(Debug, Default)]
struct State {
    branches: HashMap<String, CommitId>,
    objects: Vec<DataObject>,
    indexed: HashMap<ObjectId, HashSet<Ulid>>,
    compactions: Vec<Vec<ObjectId>>,
    index_calls: Vec<(ObjectId, Vec<Ulid>)>,
    commit_attempts: usize,
    fail_commit_at: Option<usize>,
    scan_fault: Option<ScanFault>,
}

#[derive(Debug, Default)]
struct Cursors {
    opened: AtomicUsize,
    released: AtomicUsize,
    notify: Notify,
}

/// Open-cursor marker held by a running scan.
struct Cursor<'a>(&'a Cursors);

impl<'a> Cursor<'a> {
    fn open(cursors: &'a Cursors) -> Self {
        cursors.opened.fetch_add(1, Ordering::SeqCst);
        Cursor(cursors)
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        self.0.released.fetch_add(1, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }
}

/// In-memory lake holding a single pool.
#[derive(Debug)]
pub(crate) struct MemoryLake {
    pool: PoolConfig,
    ids: IdGenerator,
    state: Mutex<State>,
    cursors: Cursors,
}

impl MemoryLake {
    /// Lake with `pool` and an initial `main` branch.
    pub(crate) fn new(pool: PoolConfig) -> Arc<Self> {
        let lake = Self {
            pool,
            ids: IdGenerator::new(),
            state: Mutex::new(State::default()),
            cursors: Cursors::default(),
        };
        lake.create_branch("main");
        Arc::new(lake)
    }

    /// Pool used by most scenarios: `logs`, ordered by `ts` ascending.
    pub(crate) fn pool_config(name: &str) -> PoolConfig {
        PoolConfig::new(name, Ulid::new(), Layout::new(Order::Asc, ["ts"]))
    }

    pub(crate) fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory lake state")
    }

    pub(crate) fn create_branch(&self, branch: &str) {
        let head = self.ids.generate();
        self.state().branches.insert(branch.to_string(), head);
    }

    pub(crate) fn head(&self, branch: &str) -> Option<CommitId> {
        self.state().branches.get(branch).copied()
    }

    /// Store an object created at `created` covering `first..=last`.
    pub(crate) fn add_object(
        &self,
        created: SystemTime,
        first: &str,
        last: &str,
        size: u64,
    ) -> DataObject {
        let object = DataObject {
            id: IdGenerator::generate_at(created),
            size,
            count: size / 10,
            range: KeyRange::new(first, last),
        };
        self.state().objects.push(object.clone());
        object
    }

    /// Store an object created `age` ago.
    pub(crate) fn add_object_aged(
        &self,
        age: Duration,
        first: &str,
        last: &str,
        size: u64,
    ) -> DataObject {
        self.add_object(SystemTime::now() - age, first, last, size)
    }

    pub(crate) fn objects(&self) -> Vec<DataObject> {
        self.state().objects.clone()
    }

    /// Mark `rules` as already built for `object`.
    pub(crate) fn mark_indexed(&self, object: ObjectId, rules: &[IndexRule]) {
        self.state()
            .indexed
            .entry(object)
            .or_default()
            .extend(rules.iter().map(|r| r.id));
    }

    pub(crate) fn indexed(&self, object: ObjectId) -> HashSet<Ulid> {
        self.state()
            .indexed
            .get(&object)
            .cloned()
            .unwrap_or_default()
    }

    /// Object sets of every successful compaction, in commit order.
    pub(crate) fn compactions(&self) -> Vec<Vec<ObjectId>> {
        self.state().compactions.clone()
    }

    /// Object and rule ids of every successful index commit.
    pub(crate) fn index_calls(&self) -> Vec<(ObjectId, Vec<Ulid>)> {
        self.state().index_calls.clone()
    }

    pub(crate) fn commit_attempts(&self) -> usize {
        self.state().commit_attempts
    }

    /// Fail the `k`-th commit attempt (1-based) with a conflict.
    pub(crate) fn fail_commit_at(&self, k: usize) {
        self.state().fail_commit_at = Some(k);
    }

    /// Scans emit `after` items and then block until abandoned.
    pub(crate) fn stall_scans_after(&self, after: usize) {
        self.state().scan_fault = Some(ScanFault::Stall { after });
    }

    /// Scans emit `after` items and then fail with `message`.
    pub(crate) fn fail_scans_after(&self, after: usize, message: &str) {
        self.state().scan_fault = Some(ScanFault::Fail {
            after,
            message: message.to_string(),
        });
    }

    pub(crate) fn scans_opened(&self) -> usize {
        self.cursors.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn open_scans(&self) -> usize {
        self.scans_opened() - self.cursors.released.load(Ordering::SeqCst)
    }

    /// Scans emit every item, then let go of the sink and keep running.
    pub(crate) fn detach_scans(&self) {
        self.state().scan_fault = Some(ScanFault::Detach);
    }

    /// Resolves once every scan cursor has been released.
    pub(crate) async fn wait_for_release(&self) {
        loop {
            let notified = self.cursors.notify.notified();
            if self.open_scans() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn scan_fault(&self) -> Option<ScanFault> {
        self.state().scan_fault.clone()
    }

    /// Emit `items` honouring any injected scan fault.
    async fn emit<T>(
        &self,
        sink: ScanSink<T>,
        items: Vec<T>,
        next_cold: Option<SystemTime>,
    ) -> Result<Option<SystemTime>, LakeError> {
        let fault = self.scan_fault();
        for (emitted, item) in items.into_iter().enumerate() {
            match &fault {
                Some(ScanFault::Stall { after }) if emitted == *after => {
                    sink.closed().await;
                    return Err(LakeError::Cancelled);
                }
                Some(ScanFault::Fail { after, message }) if emitted == *after => {
                    return Err(LakeError::other(message.clone()));
                }
                _ => {}
            }
            sink.send(item).await?;
        }
        match fault {
            Some(ScanFault::Stall { .. }) => {
                sink.closed().await;
                Err(LakeError::Cancelled)
            }
            Some(ScanFault::Fail { message, .. }) => Err(LakeError::other(message)),
            Some(ScanFault::Detach) => {
                drop(sink);
                std::future::pending().await
            }
            None => Ok(next_cold),
        }
    }

    fn cold_snapshot(&self, cold: ColdThreshold) -> (Vec<DataObject>, Option<SystemTime>) {
        let now = SystemTime::now();
        let mut next_cold = NextCold::default();
        let mut eligible = Vec::new();
        for object in self.objects() {
            if cold.is_cold(object.created(), now) {
                eligible.push(object);
            } else {
                next_cold.observe(cold, object.created());
            }
        }
        (eligible, next_cold.get())
    }

    /// Count an attempt and apply the injected failure, if due.
    fn begin_commit(&self, pool: PoolId, branch: &str) -> Result<(), LakeError> {
        let mut state = self.state();
        state.commit_attempts += 1;
        if state.fail_commit_at == Some(state.commit_attempts) {
            return Err(LakeError::Conflict(format!(
                "injected failure at attempt {}",
                state.commit_attempts
            )));
        }
        if pool != self.pool.id || !state.branches.contains_key(branch) {
            return Err(LakeError::BranchNotFound {
                pool: pool.to_string(),
                branch: branch.to_string(),
            });
        }
        Ok(())
    }

    fn advance(&self, state: &mut State, branch: &str) -> CommitId {
        let head = self.ids.generate();
        state.branches.insert(branch.to_string(), head);
        head
    }
}

/// Group overlapping objects in layout order; only groups of two or more
/// become runs.
fn overlapping_runs(mut objects: Vec<DataObject>, order: Order) -> Vec<Run> {
    match order {
        Order::Asc => objects.sort_by(|a, b| a.range.bounds().0.cmp(b.range.bounds().0)),
        Order::Desc => objects.sort_by(|a, b| b.range.bounds().1.cmp(a.range.bounds().1)),
    }
    let mut runs = Vec::new();
    let mut group: Vec<DataObject> = Vec::new();
    let mut span: Option<KeyRange> = None;
    for object in objects {
        match &span {
            Some(current) if current.overlaps(&object.range) => {
                span = Some(current.union(&object.range, order));
                group.push(object);
            }
            _ => {
                if group.len() > 1 {
                    runs.extend(Run::new(std::mem::take(&mut group)));
                }
                span = Some(object.range.clone());
                group = vec![object];
            }
        }
    }
    if group.len() > 1 {
        runs.extend(Run::new(group));
    }
    runs
}

impl Lake for MemoryLake {
    fn lookup_branch<'a>(&'a self, pool: &'a str, branch: &'a str) -> LakeFuture<'a, CommitId> {
        async move {
            if !self.pool.matches(pool) {
                return Err(LakeError::BranchNotFound {
                    pool: pool.to_string(),
                    branch: branch.to_string(),
                });
            }
            self.head(branch).ok_or_else(|| LakeError::BranchNotFound {
                pool: pool.to_string(),
                branch: branch.to_string(),
            })
        }
        .boxed()
    }

    fn compaction_scan(
        &self,
        request: CompactionScanRequest,
        sink: ScanSink<Run>,
    ) -> LakeFuture<'_, Option<SystemTime>> {
        async move {
            let _cursor = Cursor::open(&self.cursors);
            let (eligible, next_cold) = self.cold_snapshot(request.cold);
            let runs = overlapping_runs(eligible, request.layout.order);
            self.emit(sink, runs, next_cold).await
        }
        .boxed()
    }

    fn index_scan(
        &self,
        request: IndexScanRequest,
        sink: ScanSink<ObjectIndexes>,
    ) -> LakeFuture<'_, Option<SystemTime>> {
        async move {
            let _cursor = Cursor::open(&self.cursors);
            let (eligible, next_cold) = self.cold_snapshot(request.cold);
            let needs = eligible
                .into_iter()
                .filter_map(|object| {
                    let built = self.indexed(object.id);
                    let needs_index: Vec<IndexRule> = request
                        .rules
                        .iter()
                        .filter(|rule| !built.contains(&rule.id))
                        .cloned()
                        .collect();
                    (!needs_index.is_empty()).then_some(ObjectIndexes {
                        object,
                        needs_index,
                    })
                })
                .collect();
            self.emit(sink, needs, next_cold).await
        }
        .boxed()
    }

    fn compact<'a>(
        &'a self,
        pool: PoolId,
        branch: &'a str,
        objects: &'a [ObjectId],
        _message: CommitMessage,
    ) -> LakeFuture<'a, CommitId> {
        async move {
            self.begin_commit(pool, branch)?;
            if objects.is_empty() {
                return Err(LakeError::Conflict("empty compaction".into()));
            }
            let mut state = self.state();
            let (inputs, kept): (Vec<DataObject>, Vec<DataObject>) = state
                .objects
                .drain(..)
                .partition(|o| objects.contains(&o.id));
            if inputs.len() != objects.len() {
                state.objects = kept.into_iter().chain(inputs).collect();
                return Err(LakeError::Conflict("object no longer on branch".into()));
            }
            let order = self.pool.layout.order;
            let range = inputs
                .iter()
                .skip(1)
                .fold(inputs[0].range.union(&inputs[0].range, order), |span, o| {
                    span.union(&o.range, order)
                });
            let merged = DataObject {
                id: self.ids.generate(),
                size: inputs.iter().map(|o| o.size).sum(),
                count: inputs.iter().map(|o| o.count).sum(),
                range,
            };
            state.objects = kept;
            state.objects.push(merged);
            state.compactions.push(objects.to_vec());
            Ok(self.advance(&mut state, branch))
        }
        .boxed()
    }

    fn apply_index_rules<'a>(
        &'a self,
        rules: &'a [IndexRule],
        pool: PoolId,
        branch: &'a str,
        objects: &'a [ObjectId],
    ) -> LakeFuture<'a, CommitId> {
        async move {
            self.begin_commit(pool, branch)?;
            let mut state = self.state();
            if let Some(missing) = objects
                .iter()
                .find(|id| !state.objects.iter().any(|o| o.id == **id))
            {
                return Err(LakeError::Conflict(format!("object {missing} not found")));
            }
            let rule_ids: Vec<Ulid> = rules.iter().map(|r| r.id).collect();
            for object in objects {
                state
                    .indexed
                    .entry(*object)
                    .or_default()
                    .extend(rule_ids.iter().copied());
                state.index_calls.push((*object, rule_ids.clone()));
            }
            Ok(self.advance(&mut state, branch))
        }
        .boxed()
    }
}

/// A log record seen by [`LogCapture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CapturedLog {
    pub(crate) level: Level,
    pub(crate) message: String,
}

thread_local! {
    static CAPTURED: RefCell<Option<Vec<CapturedLog>>> = const { RefCell::new(None) };
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.target() == LOG_TARGET
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        CAPTURED.with(|captured| {
            if let Some(records) = captured.borrow_mut().as_mut() {
                records.push(CapturedLog {
                    level: record.level(),
                    message: record.args().to_string(),
                });
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Records crate log events emitted on the current thread until dropped.
///
/// Single-threaded tokio tests run the consumer loop on the test thread, so
/// each test only sees its own records.
pub(crate) struct LogCapture;

impl LogCapture {
    pub(crate) fn start() -> Self {
        static INSTALL: Once = Once::new();
        INSTALL.call_once(|| {
            if log::set_logger(&LOGGER).is_ok() {
                log::set_max_level(LevelFilter::Trace);
            }
        });
        CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
        LogCapture
    }

    /// Records of `event`, oldest first.
    pub(crate) fn event(&self, event: &str) -> Vec<CapturedLog> {
        let prefix = format!("event={event} ");
        CAPTURED.with(|captured| {
            captured
                .borrow()
                .iter()
                .flatten()
                .filter(|record| record.message.starts_with(&prefix))
                .cloned()
                .collect()
        })
    }

    /// Levels of every `event` record, oldest first.
    pub(crate) fn levels(&self, event: &str) -> Vec<Level> {
        self.event(event).into_iter().map(|r| r.level).collect()
    }
}

impl Drop for LogCapture {
    fn drop(&mut self) {
        CAPTURED.with(|captured| *captured.borrow_mut() = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_objects_form_runs_and_singletons_are_dropped() {
        let lake = MemoryLake::new(MemoryLake::pool_config("logs"));
        let hour = Duration::from_secs(3600);
        let a = lake.add_object_aged(hour, "a", "c", 10);
        let b = lake.add_object_aged(hour, "b", "d", 10);
        let _lonely = lake.add_object_aged(hour, "m", "n", 10);
        let c = lake.add_object_aged(hour, "x", "y", 10);
        let d = lake.add_object_aged(hour, "y", "z", 10);

        let runs = overlapping_runs(lake.objects(), Order::Asc);
        let ids: Vec<Vec<ObjectId>> = runs.iter().map(Run::object_ids).collect();
        assert_eq!(ids, vec![vec![a.id, b.id], vec![c.id, d.id]]);
    }

    #[test]
    fn descending_layout_groups_from_the_top() {
        let lake = MemoryLake::new(MemoryLake::pool_config("logs"));
        let hour = Duration::from_secs(3600);
        let a = lake.add_object_aged(hour, "d", "b", 10);
        let b = lake.add_object_aged(hour, "f", "c", 10);
        let runs = overlapping_runs(lake.objects(), Order::Desc);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].object_ids(), vec![b.id, a.id]);
        assert_eq!(runs[0].span(Order::Desc), KeyRange::new("f", "b"));
    }
}
