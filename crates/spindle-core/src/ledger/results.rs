//! ResultStore: job id -> result, insert-only.

use std::collections::HashMap;

use crate::domain::{JobId, JobResult};

#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    entries: HashMap<JobId, JobResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result. Returns `false` (and keeps the existing entry) if the
    /// id already has one.
    pub fn insert(&mut self, result: JobResult) -> bool {
        if self.entries.contains_key(&result.job_id) {
            return false;
        }
        self.entries.insert(result.job_id, result);
        true
    }

    pub fn get(&self, id: JobId) -> Option<&JobResult> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy of every entry.
    pub fn snapshot(&self) -> HashMap<JobId, JobResult> {
        self.entries.clone()
    }
}
