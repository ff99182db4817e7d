//! Identifier generation

use parking_lot::Mutex;
use ulid::{Generator, Ulid};

/// Source of fresh identifiers
///
/// Generated values must be unique and increase within a process; blueprint
/// ordering relies on it.
pub trait IdGenerator: Send + Sync {
    /// Next identifier
    fn generate(&self) -> Ulid;
}

/// Monotonic ULID generator
///
/// ULIDs minted within the same millisecond increment the random part, so
/// consecutive calls always compare greater.
pub struct MonotonicUlidGenerator {
    inner: Mutex<Generator>,
}

impl MonotonicUlidGenerator {
    /// Create generator
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }
}

impl Default for MonotonicUlidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MonotonicUlidGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonotonicUlidGenerator").finish_non_exhaustive()
    }
}

impl IdGenerator for MonotonicUlidGenerator {
    fn generate(&self) -> Ulid {
        let mut generator = self.inner.lock();
        match generator.generate() {
            Ok(ulid) => ulid,
            Err(e) => {
                // Random part exhausted for this millisecond.
                tracing::warn!("Monotonic ULID generation failed: {}", e);
                Ulid::new()
            }
        }
    }
}
