use std::{fmt, sync::Mutex, time::SystemTime};

use ulid::{Generator, Ulid};

/// Identifier of a commit in a branch's history.
pub type CommitId = Ulid;

/// Identifier of an immutable data object. The embedded timestamp is the
/// object's creation time.
pub type ObjectId = Ulid;

/// Identifier of a pool.
pub type PoolId = Ulid;

/// Thread-safe ULID generator producing monotonic, time-ordered identifiers.
pub struct IdGenerator {
    inner: Mutex<Generator>,
}

impl IdGenerator {
    /// Create a new generator seeded with the current time.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    /// Produce the next identifier in sequence.
    ///
    /// Falls back to a fresh random ULID if the generator is poisoned or its
    /// random component overflows within the same millisecond.
    pub fn generate(&self) -> Ulid {
        match self.inner.lock() {
            Ok(mut guard) => guard.generate().unwrap_or_else(|_| Ulid::new()),
            Err(_) => Ulid::new(),
        }
    }

    /// Produce an identifier whose timestamp is `created`.
    ///
    /// Not monotonic with respect to [`IdGenerator::generate`]: the random
    /// component is drawn fresh so the timestamp is kept exactly.
    pub fn generate_at(created: SystemTime) -> Ulid {
        Ulid::from_datetime(created)
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
