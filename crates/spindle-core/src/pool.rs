//! WorkerPool: owns the queue, the workers and the ledger.
//!
//! # フロー
//! 1. `submit()` reserves a queue slot (waits or fails per `SubmitPolicy`)
//! 2. under the ledger guard: duplicate check → push → `active += 1`
//! 3. a worker pops the job, runs the handler, records result + counters in
//!    one ledger critical section, then fires the completion channel
//! 4. `stop()` closes the queue; workers drain it and exit
//!
//! Lock order is ledger → queue. Workers never hold both.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::{PoolConfig, SubmitPolicy};
use crate::domain::{Job, JobId, JobResult};
use crate::error::PoolError;
use crate::ledger::{Ledger, PoolStats};
use crate::queue::{JobQueue, Slot};
use crate::runtime::{EchoHandler, JobHandler, Runtime};
use crate::worker::WorkerGroup;

enum Lifecycle {
    Idle,
    Running(WorkerGroup),
    Stopped,
}

pub struct WorkerPool {
    config: PoolConfig,
    queue: Arc<JobQueue>,
    ledger: Arc<Mutex<Ledger>>,
    runtime: Arc<Runtime>,
    lifecycle: Mutex<Lifecycle>,
}

impl WorkerPool {
    /// A `queue_capacity` of 0 is raised to 1, since a zero-slot queue could
    /// never accept a job. Call `PoolConfig::validate` first to reject it.
    pub fn new(config: PoolConfig, handler: Arc<dyn JobHandler>) -> Self {
        if config.queue_capacity == 0 {
            tracing::warn!("queue_capacity 0 raised to 1");
        }
        Self {
            queue: Arc::new(JobQueue::new(config.queue_capacity.max(1))),
            ledger: Arc::new(Mutex::new(Ledger::new())),
            runtime: Arc::new(Runtime::new(handler)),
            lifecycle: Mutex::new(Lifecycle::Idle),
            config,
        }
    }

    /// Default config with `EchoHandler`.
    pub fn with_defaults() -> Self {
        Self::new(PoolConfig::default(), Arc::new(EchoHandler))
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Spawn `config.workers` workers.
    pub async fn start(&self) -> Result<(), PoolError> {
        self.start_with(self.config.workers).await
    }

    /// Spawn `workers` workers, overriding the configured count.
    pub async fn start_with(&self, workers: usize) -> Result<(), PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running(_) => {
                tracing::error!("start() called on a running pool");
                return Err(PoolError::AlreadyStarted);
            }
            Lifecycle::Stopped => {
                tracing::error!("start() called on a stopped pool");
                return Err(PoolError::Stopped);
            }
        }

        let group = WorkerGroup::spawn(
            workers,
            Arc::clone(&self.queue),
            Arc::clone(&self.runtime),
            Arc::clone(&self.ledger),
        );
        *lifecycle = Lifecycle::Running(group);

        tracing::info!(
            workers,
            queue_capacity = self.queue.capacity(),
            submit_policy = ?self.config.submit_policy,
            "worker pool started"
        );
        Ok(())
    }

    /// Enqueue a job with a caller-assigned id.
    pub async fn submit(&self, job: Job) -> Result<JobId, PoolError> {
        self.ensure_running().await?;
        let slot = self.reserve_slot().await?;

        let mut ledger = self.ledger.lock().await;
        ledger.check_new(job.id())?;
        self.enqueue(&mut ledger, slot, job).await
    }

    /// Enqueue a payload; the pool picks the id.
    pub async fn submit_payload(&self, payload: serde_json::Value) -> Result<JobId, PoolError> {
        self.ensure_running().await?;
        let slot = self.reserve_slot().await?;

        let mut ledger = self.ledger.lock().await;
        let id = ledger.assign_id();
        self.enqueue(&mut ledger, slot, Job::new(id, payload)).await
    }

    /// Submit and wait up to `timeout` for the job's result.
    ///
    /// The deadline covers the wait for completion only; getting into the
    /// queue follows the pool's `SubmitPolicy`. On `PoolError::Timeout` the
    /// job is *not* retracted: it still runs and its result still lands in
    /// the result store.
    pub async fn submit_with_timeout(
        &self,
        mut job: Job,
        timeout: Duration,
    ) -> Result<JobResult, PoolError> {
        let completion = job.attach_completion();
        let job_id = self.submit(job).await?;

        match tokio::time::timeout(timeout, completion).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(PoolError::CompletionDropped(job_id)),
            Err(_) => {
                tracing::warn!(%job_id, ?timeout, "gave up waiting, job keeps running");
                Err(PoolError::Timeout {
                    job_id,
                    after: timeout,
                })
            }
        }
    }

    /// Stop accepting jobs, let the workers drain the queue, wait for them.
    ///
    /// A second call returns `AlreadyStopped` right away.
    pub async fn stop(&self) -> Result<(), PoolError> {
        let group = {
            let mut lifecycle = self.lifecycle.lock().await;
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running(group) => Some(group),
                Lifecycle::Idle => None,
                Lifecycle::Stopped => return Err(PoolError::AlreadyStopped),
            }
        };

        let queued = self.queue.len().await;
        tracing::info!(queued, "stopping worker pool");
        self.queue.close().await;
        if let Some(group) = group {
            group.join().await;
        }

        let stats = self.stats().await;
        tracing::info!(
            processed = stats.processed,
            failed = stats.failed,
            active = stats.active,
            "worker pool stopped"
        );
        Ok(())
    }

    /// Consistent snapshot of the counters.
    pub async fn stats(&self) -> PoolStats {
        self.ledger.lock().await.stats()
    }

    pub async fn result(&self, id: JobId) -> Option<JobResult> {
        self.ledger.lock().await.results().get(id).cloned()
    }

    pub async fn results(&self) -> HashMap<JobId, JobResult> {
        self.ledger.lock().await.results().snapshot()
    }

    pub async fn result_count(&self) -> usize {
        self.ledger.lock().await.results().len()
    }

    /// Jobs waiting in the queue (not yet picked up by a worker).
    pub async fn queue_len(&self) -> usize {
        self.queue.len().await
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock().await, Lifecycle::Running(_))
    }

    async fn ensure_running(&self) -> Result<(), PoolError> {
        match *self.lifecycle.lock().await {
            Lifecycle::Running(_) => Ok(()),
            Lifecycle::Idle => Err(PoolError::NotStarted),
            Lifecycle::Stopped => Err(PoolError::Stopped),
        }
    }

    /// Taken before the ledger guard: waiting for capacity while holding the
    /// ledger would block the workers that free it.
    async fn reserve_slot(&self) -> Result<Slot<'_>, PoolError> {
        match self.config.submit_policy {
            SubmitPolicy::Block => self.queue.reserve().await,
            SubmitPolicy::FailFast => self.queue.try_reserve(),
        }
    }

    /// Push + `active += 1`, inside the caller's ledger critical section.
    async fn enqueue(
        &self,
        ledger: &mut Ledger,
        slot: Slot<'_>,
        job: Job,
    ) -> Result<JobId, PoolError> {
        let job_id = job.id();
        let priority = job.priority();
        self.queue.push(slot, job).await.map_err(|(err, _job)| err)?;
        ledger.record_accepted(job_id);

        tracing::debug!(%job_id, priority, "job queued");
        Ok(job_id)
    }
}
