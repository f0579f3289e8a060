use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::ledger::Ledger;
use crate::queue::JobQueue;
use crate::runtime::Runtime;

/// Worker group handle.
/// - workers exit once the queue is closed and drained
/// - `join()` で全ワーカーの終了を待てる
/// - join せずに drop すると abort される
pub struct WorkerGroup {
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers over the shared queue.
    pub fn spawn(
        n: usize,
        queue: Arc<JobQueue>,
        runtime: Arc<Runtime>,
        ledger: Arc<Mutex<Ledger>>,
    ) -> Self {
        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let rt = Arc::clone(&runtime);
            let ledger = Arc::clone(&ledger);

            let join = tokio::spawn(async move {
                worker_loop(worker_id, q, rt, ledger).await;
            });
            joins.push(join);
        }

        Self { joins }
    }

    /// Wait for every worker to exit.
    ///
    /// Does not close the queue itself: call `JobQueue::close` first or this
    /// waits forever.
    pub async fn join(mut self) {
        let joins = std::mem::take(&mut self.joins);
        for (worker_id, join) in joins.into_iter().enumerate() {
            if let Err(e) = join.await {
                tracing::error!(worker_id, error = %e, "worker task ended abnormally");
            }
        }
    }
}

impl Drop for WorkerGroup {
    /// A group dropped without `join()` aborts its workers instead of leaving
    /// them parked on the queue forever.
    fn drop(&mut self) {
        for join in &self.joins {
            join.abort();
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<JobQueue>,
    runtime: Arc<Runtime>,
    ledger: Arc<Mutex<Ledger>>,
) {
    tracing::debug!(worker_id, "worker started");

    // pop() は「次のジョブ」と「close」の両方で起きる。None は close 済みかつ空
    while let Some(mut job) = queue.pop().await {
        let job_id = job.id();
        let completion = job.take_completion();
        tracing::debug!(worker_id, %job_id, priority = job.priority(), "job dequeued");

        // a dequeued job always runs to completion, shutdown or not
        let result = runtime.execute(worker_id, job).await;

        if !result.outcome.is_success() {
            tracing::warn!(worker_id, %job_id, outcome = ?result.outcome, "job failed");
        }

        // result + counters first, so the result is visible before the signal fires
        ledger.lock().await.record_completion(result.clone());

        if let Some(tx) = completion
            && tx.send(result).is_err()
        {
            tracing::debug!(worker_id, %job_id, "completion receiver gone, result kept in store");
        }
    }

    tracing::debug!(worker_id, "worker exiting");
}
