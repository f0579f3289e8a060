use std::time::Duration;

use thiserror::Error;

use crate::domain::{JobId, ResourceId};

/// Errors returned by `WorkerPool` operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Queue is saturated and the pool runs with `SubmitPolicy::FailFast`.
    #[error("job queue is full")]
    QueueFull,

    #[error("worker pool is stopped")]
    Stopped,

    #[error("worker pool has not been started")]
    NotStarted,

    #[error("worker pool is already started")]
    AlreadyStarted,

    #[error("worker count must be greater than zero")]
    NoWorkers,

    #[error("worker pool is already stopped")]
    AlreadyStopped,

    #[error("duplicate job id: {0}")]
    DuplicateJob(JobId),

    /// The wait expired; the job itself is still queued or running.
    #[error("timed out after {after:?} waiting for {job_id}")]
    Timeout { job_id: JobId, after: Duration },

    #[error("completion channel for {0} closed without a result")]
    CompletionDropped(JobId),
}

/// Errors returned by `EventBus` operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("event bus is closed")]
    Closed,
}

/// Errors returned by `TransactionManager::transfer`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    /// Retryable: no lock was left held.
    #[error("could not lock {resource} within {after:?}")]
    LockTimeout { resource: ResourceId, after: Duration },

    #[error("unknown resource: {0}")]
    UnknownResource(ResourceId),

    #[error("cannot transfer {0} onto itself")]
    SameResource(ResourceId),

    #[error("resource registered twice: {0}")]
    DuplicateResource(ResourceId),
}

/// Error returned by a `JobHandler`. Recorded as a failed outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct JobError(pub String);

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FanoutError {
    #[error("task for item {index} panicked")]
    TaskPanicked { index: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
