use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Aggregate counters of a pool.
///
/// A value of this type is always a snapshot copied under the ledger guard,
/// so all four fields belong to the same generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Jobs that finished successfully.
    pub processed: u64,
    /// Jobs whose handler returned an error or panicked.
    pub failed: u64,
    /// Jobs accepted into the queue and not yet recorded.
    pub active: u64,
    /// Sum of handler execution times.
    pub total_time: Duration,
}

impl PoolStats {
    /// Every job that has been recorded, whatever the outcome.
    pub fn completed(&self) -> u64 {
        self.processed + self.failed
    }

    pub fn average_time(&self) -> Option<Duration> {
        let completed = self.completed();
        if completed == 0 {
            return None;
        }
        u32::try_from(completed)
            .ok()
            .map(|n| self.total_time / n)
    }
}
