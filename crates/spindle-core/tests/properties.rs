//! End-to-end properties of the pool, the bus and the transfer manager.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use spindle_core::{
    BusError, Counter, EchoHandler, EventBus, Job, JobId, PoolConfig, PoolError, Resource,
    ResourceId, TransactionManager, TransferConfig, WorkerPool, handler_fn, parallel_map,
};

fn job(id: u64) -> Job {
    Job::new(id, serde_json::json!({ "data": format!("Job {id}") }))
}

#[rstest]
#[case::none(0, 1)]
#[case::one(1, 1)]
#[case::many(250, 4)]
#[case::more_workers_than_jobs(3, 8)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_submitted_job_is_recorded_once(#[case] jobs: u64, #[case] workers: usize) {
    let pool = WorkerPool::new(
        PoolConfig::default().with_workers(workers).with_queue_capacity(16),
        Arc::new(EchoHandler),
    );
    pool.start().await.unwrap();

    for i in 0..jobs {
        pool.submit(job(i)).await.unwrap();
    }
    pool.stop().await.unwrap();

    let stats = pool.stats().await;
    assert_eq!(pool.result_count().await as u64, jobs);
    assert_eq!(stats.processed, jobs);
    assert_eq!(stats.active, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_share_one_pool() {
    let pool = Arc::new(WorkerPool::new(
        PoolConfig::default().with_workers(4).with_queue_capacity(8),
        Arc::new(EchoHandler),
    ));
    pool.start().await.unwrap();

    let producers: Vec<_> = (0..8u64)
        .map(|p| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                for i in 0..50 {
                    pool.submit(job(p * 1_000 + i)).await.unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }
    pool.stop().await.unwrap();

    let results = pool.results().await;
    assert_eq!(results.len(), 400);
    assert!(results.contains_key(&JobId::new(7_049)));
    assert_eq!(pool.stats().await.active, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stats_snapshots_never_straddle_a_completion() {
    const JOBS: u64 = 200;
    let handler = handler_fn(|_ctx, id, _payload| async move {
        tokio::time::sleep(Duration::from_micros(200)).await;
        Ok(id.to_string())
    });
    let pool = Arc::new(WorkerPool::new(
        PoolConfig::default().with_workers(4).with_queue_capacity(JOBS as usize),
        Arc::new(handler),
    ));
    pool.start().await.unwrap();

    for i in 0..JOBS {
        pool.submit(job(i)).await.unwrap();
    }

    // every accepted job is either active or recorded, in every snapshot
    loop {
        let stats = pool.stats().await;
        assert_eq!(stats.completed() + stats.active, JOBS, "straddled snapshot: {stats:?}");
        if stats.completed() == JOBS {
            break;
        }
        tokio::task::yield_now().await;
    }

    pool.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_does_not_lose_the_result() {
    let handler = handler_fn(|_ctx, id, _payload| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(format!("late {id}"))
    });
    let pool = WorkerPool::new(PoolConfig::default().with_workers(2), Arc::new(handler));
    pool.start().await.unwrap();

    let err = pool
        .submit_with_timeout(job(1), Duration::from_millis(5))
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Timeout { job_id, .. } if job_id == JobId::new(1)));

    // no blocked writer: stop() returns once the job is done
    tokio::time::timeout(Duration::from_secs(2), pool.stop())
        .await
        .unwrap()
        .unwrap();

    let stored = pool.result(JobId::new(1)).await.unwrap();
    assert_eq!(stored.output(), Some("late job-1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn counter_increments_are_not_lost() {
    const TASKS: u64 = 10;
    const PER_TASK: u64 = 1_000;
    let counter = Arc::new(Counter::new());

    let totals = parallel_map(0..TASKS, |_| {
        let counter = Arc::clone(&counter);
        async move {
            for _ in 0..PER_TASK {
                counter.increment();
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(totals.len() as u64, TASKS);
    assert_eq!(counter.get(), TASKS * PER_TASK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_transfers_never_deadlock() {
    const ROUNDS: usize = 10_000;
    let a = ResourceId::new(1);
    let b = ResourceId::new(2);
    let tm = Arc::new(
        TransactionManager::pair(
            Resource::new(a, "initial A".to_string()),
            Resource::new(b, "initial B".to_string()),
            TransferConfig::default(),
        )
        .unwrap(),
    );

    let run = |from: ResourceId, to: ResourceId, value: &'static str| {
        let tm = Arc::clone(&tm);
        tokio::spawn(async move {
            for _ in 0..ROUNDS {
                tm.transfer(from, to, value.to_string()).await?;
            }
            Ok::<_, spindle_core::TxError>(())
        })
    };
    let forward = run(a, b, "value1");
    let backward = run(b, a, "value2");

    let (forward, backward) = tokio::time::timeout(Duration::from_secs(30), async {
        (forward.await.unwrap(), backward.await.unwrap())
    })
    .await
    .expect("transfers deadlocked");
    forward.unwrap();
    backward.unwrap();

    let values = (tm.read(a).await.unwrap(), tm.read(b).await.unwrap());
    assert!(values.0.is_empty() ^ values.1.is_empty(), "{values:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn publish_racing_close_is_safe() {
    for _ in 0..50 {
        let bus = Arc::new(EventBus::new(8));
        let mut subs = Vec::new();
        for _ in 0..3 {
            subs.push(bus.subscribe().await.unwrap());
        }

        let publisher = tokio::spawn({
            let bus = Arc::clone(&bus);
            async move {
                let mut ok = 0u32;
                while bus.publish(format!("event {ok}")).await.is_ok() {
                    ok += 1;
                    tokio::task::yield_now().await;
                }
                ok
            }
        });
        let closer = tokio::spawn({
            let bus = Arc::clone(&bus);
            async move { bus.close().await }
        });

        assert!(closer.await.unwrap());
        assert_eq!(bus.publish("late".to_string()).await, Err(BusError::Closed));
        publisher.await.unwrap();

        for mut sub in subs {
            let mut seen = 0;
            while let Some(event) = sub.recv().await {
                assert_ne!(event, "late");
                seen += 1;
            }
            assert!(seen <= 8);
        }
    }
}
