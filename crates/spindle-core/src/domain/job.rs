//! Job: the unit of work submitted to a `WorkerPool`.

use tokio::sync::oneshot;

use super::{JobId, JobResult};

/// Informational priority.
///
/// Stored and reported, but the queue is strictly FIFO: priority never
/// reorders jobs.
pub type Priority = i32;

/// A unit of work.
///
/// Everything except `completion` is immutable after construction. The
/// completion sender is taken exactly once by the worker that processes the
/// job, so the result can be written at most once.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    payload: serde_json::Value,
    priority: Priority,
    completion: Option<oneshot::Sender<JobResult>>,
}

impl Job {
    pub fn new(id: impl Into<JobId>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            payload,
            priority: 0,
            completion: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Attach a completion channel and return its receiving half.
    ///
    /// `oneshot` has a single slot, so the worker's write never waits for a
    /// reader. If the receiver is dropped first (e.g. a timed-out waiter), the
    /// write just fails and the result lives on in the `ResultStore`.
    pub fn attach_completion(&mut self) -> oneshot::Receiver<JobResult> {
        let (tx, rx) = oneshot::channel();
        self.completion = Some(tx);
        rx
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    pub(crate) fn take_completion(&mut self) -> Option<oneshot::Sender<JobResult>> {
        self.completion.take()
    }
}
