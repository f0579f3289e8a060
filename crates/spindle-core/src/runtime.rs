use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::domain::{Job, JobId, JobOutcome, JobResult};
use crate::error::JobError;

/// Which worker is running a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerContext {
    pub worker_id: usize,
}

/// The work function applied to every job of a pool.
///
/// The handler gets the whole `Job` so it can decode the payload as it likes.
/// `Ok(output)` is recorded as success, `Err` as failure.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, ctx: &WorkerContext, job: &Job) -> Result<String, JobError>;
}

/// Default handler: reports which worker picked the job up.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
    async fn handle(&self, ctx: &WorkerContext, job: &Job) -> Result<String, JobError> {
        Ok(format!(
            "Processed job {} by worker {}",
            job.id().as_u64(),
            ctx.worker_id
        ))
    }
}

/// Adapter turning an async closure into a `JobHandler`.
///
/// ```ignore
/// let handler = handler_fn(|_ctx, id, payload| async move {
///     Ok(format!("{id}: {payload}"))
/// });
/// ```
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(WorkerContext, JobId, serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, JobError>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(WorkerContext, JobId, serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, JobError>> + Send,
{
    async fn handle(&self, ctx: &WorkerContext, job: &Job) -> Result<String, JobError> {
        (self.f)(*ctx, job.id(), job.payload().clone()).await
    }
}

/// Runtime executes one job with its handler and turns whatever happens into
/// a `JobResult`.
///
/// The handler runs in its own task: a panic there becomes a failed outcome
/// instead of killing the worker (which would leave `active` stuck).
pub struct Runtime {
    handler: Arc<dyn JobHandler>,
}

impl Runtime {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        Self { handler }
    }

    pub async fn execute(&self, worker_id: usize, job: Job) -> JobResult {
        let job_id = job.id();
        let handler = Arc::clone(&self.handler);
        let ctx = WorkerContext { worker_id };

        let started = Instant::now();
        let joined = tokio::spawn(async move { handler.handle(&ctx, &job).await }).await;
        let elapsed = started.elapsed();

        let outcome = match joined {
            Ok(Ok(output)) => JobOutcome::succeeded(output),
            Ok(Err(err)) => JobOutcome::failed(err.to_string()),
            Err(join_err) if join_err.is_panic() => JobOutcome::failed("handler panicked"),
            Err(join_err) => JobOutcome::failed(format!("handler task aborted: {join_err}")),
        };

        JobResult::new(job_id, worker_id, outcome, elapsed)
    }
}
