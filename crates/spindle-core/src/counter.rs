use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counter that never loses an increment.
///
/// A single independent value, so an atomic is enough; anything that must
/// change together with other fields belongs in a guarded struct instead
/// (see `Ledger`).
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Returns the value after the increment.
    pub fn increment(&self) -> u64 {
        self.add(1)
    }

    pub fn add(&self, n: u64) -> u64 {
        self.value.fetch_add(n, Ordering::Relaxed) + n
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}
