//! In-memory bounded job queue.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify, Semaphore, SemaphorePermit, TryAcquireError};

use crate::domain::Job;
use crate::error::PoolError;

/// Queue contents; the single source of truth for "what is waiting".
struct QueueState {
    items: VecDeque<Job>,
    closed: bool,
}

/// A reserved queue slot.
///
/// Producers reserve first (possibly waiting) and push later, so the push
/// itself never waits and can run inside the caller's critical section.
/// Dropping an unused slot gives the capacity back.
pub struct Slot<'a> {
    permit: SemaphorePermit<'a>,
}

/// Bounded FIFO queue shared by every worker of a pool.
///
/// Design:
/// - `slots` holds one permit per free position. A permit is forgotten on
///   push and re-added on pop.
/// - `ready` wakes workers waiting in `pop()`.
/// - `close()` rejects new pushes, but jobs already queued stay poppable.
pub struct JobQueue {
    state: Mutex<QueueState>,
    ready: Notify,
    slots: Semaphore,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            ready: Notify::new(),
            slots: Semaphore::new(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for a free slot (backpressure).
    pub async fn reserve(&self) -> Result<Slot<'_>, PoolError> {
        let permit = self.slots.acquire().await.map_err(|_| PoolError::Stopped)?;
        Ok(Slot { permit })
    }

    /// Take a free slot without waiting.
    pub fn try_reserve(&self) -> Result<Slot<'_>, PoolError> {
        match self.slots.try_acquire() {
            Ok(permit) => Ok(Slot { permit }),
            Err(TryAcquireError::NoPermits) => Err(PoolError::QueueFull),
            Err(TryAcquireError::Closed) => Err(PoolError::Stopped),
        }
    }

    /// Append a job into a previously reserved slot.
    ///
    /// Fails with `Stopped` if the queue was closed after the reservation; in
    /// that case the job is handed back untouched.
    pub async fn push(&self, slot: Slot<'_>, job: Job) -> Result<(), (PoolError, Job)> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err((PoolError::Stopped, job));
            }
            state.items.push_back(job);
            // the slot now belongs to the queued job until pop() frees it
            slot.permit.forget();
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Take the next job, waiting while the queue is empty.
    ///
    /// Returns `None` only once the queue is closed *and* empty.
    pub async fn pop(&self) -> Option<Job> {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            // register before checking so a close() in between is not missed
            notified.as_mut().enable();

            let next = {
                let mut state = self.state.lock().await;
                let next = state.items.pop_front();
                if next.is_none() && state.closed {
                    return None;
                }
                next
            };

            if let Some(job) = next {
                self.slots.add_permits(1);
                return Some(job);
            }

            notified.await;
        }
    }

    /// Stop accepting jobs and wake everyone waiting on the queue.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().await;
            state.closed = true;
        }
        self.slots.close();
        self.ready.notify_waiters();
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn job(id: u64) -> Job {
        Job::new(id, serde_json::json!({ "n": id }))
    }

    async fn push(queue: &JobQueue, id: u64) {
        let slot = queue.reserve().await.unwrap();
        queue.push(slot, job(id)).await.map_err(|(e, _)| e).unwrap();
    }

    #[tokio::test]
    async fn pops_in_fifo_order_regardless_of_priority() {
        let queue = JobQueue::new(4);
        for (id, priority) in [(1, 0), (2, 10), (3, -5)] {
            let slot = queue.try_reserve().unwrap();
            let job = job(id).with_priority(priority);
            queue.push(slot, job).await.map_err(|(e, _)| e).unwrap();
        }

        let order: Vec<u64> = vec![
            queue.pop().await.unwrap().id().as_u64(),
            queue.pop().await.unwrap().id().as_u64(),
            queue.pop().await.unwrap().id().as_u64(),
        ];
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn try_reserve_reports_full() {
        let queue = JobQueue::new(2);
        push(&queue, 1).await;
        push(&queue, 2).await;

        assert!(matches!(queue.try_reserve(), Err(PoolError::QueueFull)));

        queue.pop().await.unwrap();
        assert!(queue.try_reserve().is_ok());
    }

    #[tokio::test]
    async fn dropped_slot_returns_capacity() {
        let queue = JobQueue::new(1);
        {
            let _slot = queue.try_reserve().unwrap();
            assert!(matches!(queue.try_reserve(), Err(PoolError::QueueFull)));
        }
        assert!(queue.try_reserve().is_ok());
    }

    #[tokio::test]
    async fn reserve_waits_for_pop() {
        let queue = Arc::new(JobQueue::new(1));
        push(&queue, 1).await;

        let waiter = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { push(&queue, 2).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        assert_eq!(queue.pop().await.unwrap().id().as_u64(), 1);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn push_wakes_pop() {
        let queue = Arc::new(JobQueue::new(4));
        let popper = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.pop().await.map(|job| job.id().as_u64()) }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        push(&queue, 9).await;

        let popped = tokio::time::timeout(Duration::from_secs(1), popper)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped, Some(9));
    }

    #[tokio::test]
    async fn close_drains_then_returns_none() {
        let queue = JobQueue::new(4);
        push(&queue, 1).await;
        push(&queue, 2).await;
        queue.close().await;

        assert_eq!(queue.pop().await.unwrap().id().as_u64(), 1);
        assert_eq!(queue.pop().await.unwrap().id().as_u64(), 2);
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn close_wakes_idle_poppers() {
        let queue = Arc::new(JobQueue::new(4));
        let poppers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.pop().await.is_none() })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close().await;

        for popper in poppers {
            let got_none = tokio::time::timeout(Duration::from_secs(1), popper)
                .await
                .unwrap()
                .unwrap();
            assert!(got_none);
        }
    }

    #[tokio::test]
    async fn closed_queue_rejects_reservations_and_pushes() {
        let queue = JobQueue::new(2);
        let slot = queue.try_reserve().unwrap();
        queue.close().await;

        assert!(matches!(queue.try_reserve(), Err(PoolError::Stopped)));
        assert!(matches!(queue.reserve().await, Err(PoolError::Stopped)));

        let (err, job) = queue.push(slot, job(5)).await.unwrap_err();
        assert_eq!(err, PoolError::Stopped);
        assert_eq!(job.id().as_u64(), 5);
        assert!(queue.is_empty().await);
    }
}
