//! Ledger: everything a job completion touches, behind one guard.
//!
//! `ResultStore`, `PoolStats` and the set of accepted job ids only change
//! together, so the pool keeps them in one `Ledger` under one mutex. A reader
//! holding that mutex can never see "processed incremented, active not yet
//! decremented".

mod results;
mod stats;

pub use results::ResultStore;
pub use stats::PoolStats;

use std::collections::HashSet;

use crate::domain::{JobId, JobResult};
use crate::error::PoolError;

#[derive(Debug, Default)]
pub struct Ledger {
    results: ResultStore,
    stats: PoolStats,
    /// Ids accepted into the queue (processed or not). Guards against running
    /// the same identity twice.
    accepted: HashSet<JobId>,
    /// Cursor for pool-assigned ids.
    next_id: JobId,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail if `id` was already accepted.
    pub fn check_new(&self, id: JobId) -> Result<(), PoolError> {
        if self.accepted.contains(&id) {
            return Err(PoolError::DuplicateJob(id));
        }
        Ok(())
    }

    /// Smallest id at or after the cursor that has not been accepted yet.
    pub fn assign_id(&mut self) -> JobId {
        let mut id = self.next_id;
        while self.accepted.contains(&id) {
            id = id.next();
        }
        self.next_id = id.next();
        id
    }

    /// Book a job that has just entered the queue.
    pub fn record_accepted(&mut self, id: JobId) {
        self.accepted.insert(id);
        self.stats.active += 1;
    }

    /// Book a finished job: result + counters in one step.
    pub fn record_completion(&mut self, result: JobResult) {
        let job_id = result.job_id;
        let succeeded = result.outcome.is_success();
        let elapsed = result.elapsed;

        if !self.results.insert(result) {
            // unreachable through the pool: ids are unique per ledger
            tracing::warn!(%job_id, "result already recorded, keeping the first one");
            return;
        }

        if succeeded {
            self.stats.processed += 1;
        } else {
            self.stats.failed += 1;
        }
        self.stats.total_time += elapsed;
        self.stats.active = self.stats.active.saturating_sub(1);
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.clone()
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }
}
