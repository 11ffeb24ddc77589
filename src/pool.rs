//! Pool and branch identity.

use std::fmt::{self, Display};

use crate::id::{CommitId, PoolId};

/// Sort direction of a pool's layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Order {
    /// Smallest key first.
    #[default]
    Asc,
    /// Largest key first.
    Desc,
}

impl Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Asc => f.write_str("asc"),
            Order::Desc => f.write_str("desc"),
        }
    }
}

/// Ordering of records within a pool's objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Layout {
    /// Direction in which objects are sorted by key.
    pub order: Order,
    /// Fields forming the sort key.
    pub keys: Vec<String>,
}

impl Layout {
    /// Layout over `keys` in the given order.
    pub fn new(order: Order, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            order,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.keys.join(","), self.order)
    }
}

/// Descriptor of a pool, immutable for the span of a maintenance cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Human-readable pool name.
    pub name: String,
    /// Stable pool identifier.
    pub id: PoolId,
    /// Sort layout driving scan order.
    pub layout: Layout,
    /// Target size in bytes of a data object after compaction.
    pub threshold: u64,
}

impl PoolConfig {
    /// Default target object size (500 MiB).
    pub const DEFAULT_THRESHOLD: u64 = 500 * 1024 * 1024;

    /// Pool with the default object size target.
    pub fn new(name: impl Into<String>, id: PoolId, layout: Layout) -> Self {
        Self {
            name: name.into(),
            id,
            layout,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }

    /// Override the target object size.
    pub fn threshold(self, threshold: u64) -> Self {
        PoolConfig { threshold, ..self }
    }

    /// Whether `pool` names this pool, either by name or by id.
    pub fn matches(&self, pool: &str) -> bool {
        self.name == pool || self.id.to_string() == pool
    }
}

/// A pool pinned at a specific commit: the snapshot a scan reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitish {
    /// Pool name.
    pub pool: String,
    /// Commit the scan observes.
    pub commit: CommitId,
}

impl Display for Commitish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pool, self.commit)
    }
}
