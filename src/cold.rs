//! Cold-threshold eligibility shared by scan producers and re-scheduling.
//!
//! An object becomes eligible for maintenance once it is older than the
//! configured threshold. Producers skip objects that are still warm and
//! remember the earliest moment one of them turns cold, so callers can sleep
//! until exactly then instead of polling.

use std::time::{Duration, SystemTime};

/// Minimum object age before compaction or indexing may touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColdThreshold(Duration);

impl ColdThreshold {
    /// Threshold applied when configuration does not name one.
    pub const DEFAULT: ColdThreshold = ColdThreshold(Duration::from_secs(5 * 60));

    /// Wrap a duration as a threshold.
    pub const fn new(threshold: Duration) -> Self {
        Self(threshold)
    }

    /// Configured age.
    pub const fn duration(&self) -> Duration {
        self.0
    }

    /// Creation times strictly before the cutoff are cold at `now`.
    pub fn cutoff(&self, now: SystemTime) -> SystemTime {
        now.checked_sub(self.0)
            .filter(|cutoff| *cutoff >= SystemTime::UNIX_EPOCH)
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    /// Whether an object created at `created` is eligible at `now`.
    pub fn is_cold(&self, created: SystemTime, now: SystemTime) -> bool {
        created < self.cutoff(now)
    }

    /// Moment an object created at `created` becomes eligible.
    pub fn cold_at(&self, created: SystemTime) -> SystemTime {
        created.checked_add(self.0).unwrap_or(created)
    }
}

impl Default for ColdThreshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<Duration> for ColdThreshold {
    fn from(threshold: Duration) -> Self {
        Self(threshold)
    }
}

/// Earliest cold time observed across objects that were still warm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NextCold(Option<SystemTime>);

impl NextCold {
    /// Record an object that was skipped because it is not yet cold.
    pub fn observe(&mut self, threshold: ColdThreshold, created: SystemTime) {
        self.0 = earliest(self.0, Some(threshold.cold_at(created)));
    }

    /// Earliest moment a skipped object turns cold, if any was skipped.
    pub fn get(&self) -> Option<SystemTime> {
        self.0
    }
}

/// Earlier of two optional instants, ignoring `None`.
pub fn earliest(a: Option<SystemTime>, b: Option<SystemTime>) -> Option<SystemTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
