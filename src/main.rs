use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use burst_batch::consumer::{ConsumerConfig, RateLimitedConsumer, handler_fn};
use burst_batch::extract::WeightLimit;
use burst_batch::store::{MemoryStore, Store};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Summed job cost allowed per batch. Configure via `BURST_BATCH_CAPACITY`.
const DEFAULT_CAPACITY: u64 = 64;

/// Number of jobs the producer enqueues. Configure via `BURST_BATCH_ITEMS`.
const DEFAULT_ITEMS: u64 = 200;

#[derive(Debug, Clone, Copy)]
struct Job {
    id: u64,
    cost: u64,
}

impl Job {
    fn new(id: u64) -> Self {
        Job {
            id,
            cost: id.wrapping_mul(7919) % 13 + 1,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "burst_batch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ConsumerConfig::from_json_file(&path)?,
        None => ConsumerConfig::from_env(),
    };
    let capacity = env_u64("BURST_BATCH_CAPACITY", DEFAULT_CAPACITY);
    let items = env_u64("BURST_BATCH_ITEMS", DEFAULT_ITEMS);
    let interval = config.interval;

    info!(
        interval_ms = interval.as_millis() as u64,
        policy = ?config.cycle_policy,
        capacity,
        items,
        "Starting burst-batch demo"
    );

    let store = Arc::new(MemoryStore::new());
    let consumer = Arc::new(RateLimitedConsumer::new(
        config,
        Arc::clone(&store),
        WeightLimit::new(capacity, |job: &Job| job.cost),
        handler_fn(|batch: &[Job]| {
            let cost: u64 = batch.iter().map(|job| job.cost).sum();
            info!(
                jobs = batch.len(),
                cost,
                first = ?batch.first().map(|job| job.id),
                "Delivered batch"
            );
            Ok::<_, Infallible>(())
        }),
    )?);

    let producer = tokio::spawn({
        let store = Arc::clone(&store);
        async move {
            for id in 0..items {
                if let Err(rejected) = store.put(Job::new(id)) {
                    warn!(error = %rejected, "Producer stopped early");
                    break;
                }
                tokio::time::sleep(interval / 8).await;
            }
        }
    });

    let runner = tokio::spawn({
        let consumer = Arc::clone(&consumer);
        async move { consumer.run().await }
    });

    let drained = {
        let store = Arc::clone(&store);
        async move {
            let _ = producer.await;
            while !store.is_empty() {
                tokio::time::sleep(interval).await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        _ = drained => info!("Store drained, shutting down"),
    }

    let dirty = consumer.close().await?;
    let exit = runner.await??;
    info!(?exit, "Consumer loop finished");
    let remaining = store.close()?;

    info!(
        dirty = dirty.len(),
        remaining = remaining.len(),
        "Shutdown complete"
    );
    println!("{}", serde_json::to_string_pretty(&consumer.stats())?);

    Ok(())
}
