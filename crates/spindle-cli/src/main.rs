use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use spindle_core::{
    BusConfig, Counter, EventBus, Job, JobError, JobHandler, PoolConfig, PoolError, Resource,
    ResourceId, TransactionManager, TransferConfig, WorkerContext, WorkerPool, parallel_map,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Echo handler with a bit of simulated work.
struct JitterHandler {
    max_delay_ms: u64,
}

#[async_trait]
impl JobHandler for JitterHandler {
    async fn handle(&self, ctx: &WorkerContext, job: &Job) -> Result<String, JobError> {
        let delay = rand::thread_rng().gen_range(1..=self.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(format!(
            "Processed job {} by worker {}",
            job.id().as_u64(),
            ctx.worker_id
        ))
    }
}

async fn pool_demo(config: PoolConfig) -> Result<()> {
    let pool = WorkerPool::new(config, Arc::new(JitterHandler { max_delay_ms: 20 }));
    pool.start().await?;

    for i in 0..10u64 {
        let job = Job::new(i, serde_json::json!({ "data": format!("Job {i}") }));
        pool.submit(job).await?;
    }

    // the wait only gives up on listening; the job still finishes
    let slow = Job::new(100u64, serde_json::json!({ "data": "slow" }));
    match pool.submit_with_timeout(slow, Duration::from_millis(1)).await {
        Ok(result) => tracing::info!(output = ?result.output(), "slow job finished in time"),
        Err(PoolError::Timeout { job_id, after }) => {
            tracing::info!(%job_id, ?after, "timed out waiting, job still in flight")
        }
        Err(e) => return Err(e.into()),
    }

    pool.stop().await?;

    let stats = pool.stats().await;
    println!(
        "Completed jobs: {} (processed={}, failed={}, active={}, avg={:?})",
        pool.result_count().await,
        stats.processed,
        stats.failed,
        stats.active,
        stats.average_time()
    );
    Ok(())
}

async fn counter_demo() -> Result<()> {
    let counter = Arc::new(Counter::new());
    parallel_map(0..10, |_| {
        let counter = Arc::clone(&counter);
        async move {
            for _ in 0..1_000 {
                counter.increment();
            }
        }
    })
    .await?;

    println!("Counter value: {} (expected: 10000)", counter.get());
    Ok(())
}

async fn transfer_demo(config: TransferConfig) -> Result<()> {
    let a = ResourceId::new(1);
    let b = ResourceId::new(2);
    let tm = Arc::new(TransactionManager::pair(
        Resource::new(a, "initial A".to_string()),
        Resource::new(b, "initial B".to_string()),
        config,
    )?);

    let ab = tokio::spawn({
        let tm = Arc::clone(&tm);
        async move { tm.transfer(a, b, "value1".to_string()).await }
    });
    let ba = tokio::spawn({
        let tm = Arc::clone(&tm);
        async move { tm.transfer(b, a, "value2".to_string()).await }
    });
    ab.await??;
    ba.await??;

    println!(
        "Transaction demo complete: A={:?} B={:?}",
        tm.read(a).await?,
        tm.read(b).await?
    );
    Ok(())
}

async fn bus_demo(config: BusConfig) -> Result<()> {
    let bus = Arc::new(EventBus::from_config(&config));
    let mut sub = bus.subscribe().await?;

    let publisher = tokio::spawn({
        let bus = Arc::clone(&bus);
        async move {
            let mut sent = 0u32;
            while bus.publish(format!("event {sent}")).await.is_ok() {
                sent += 1;
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            sent
        }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    bus.close().await;
    let published = publisher.await?;

    let mut received = 0;
    while sub.recv().await.is_some() {
        received += 1;
    }
    let stats = bus.stats().await;
    println!(
        "Event bus closed: published={published} received={received} dropped={}",
        stats.dropped
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spindle_core=info,spindle_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("Concurrency Demo");

    pool_demo(PoolConfig::from_env()?).await?;
    counter_demo().await?;

    let mut transfer = TransferConfig::from_env()?;
    if transfer.hold_delay_ms == 0 {
        // hold the first lock for a while so both directions overlap
        transfer.hold_delay_ms = 10;
    }
    transfer_demo(transfer).await?;

    bus_demo(BusConfig::from_env()?).await?;

    tracing::info!("demo finished");
    Ok(())
}
