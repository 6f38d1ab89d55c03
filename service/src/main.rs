//! Parkstream service binary.
//!
//! Wires the occupancy pipeline against a Redpanda/Kafka cluster:
//!
//! 1. seeds the snapshot topic from the static garage topology;
//! 2. runs the aggregation join and the cache mirror;
//! 3. periodically reports zone statuses from the query facade;
//! 4. shuts down cleanly on ctrl-c.
//!
//! The HTTP query surface is a separate deployment concern; this binary
//! exposes the same data through its periodic status report.

use anyhow::Context;
use parkstream_core::environment::SystemClock;
use parkstream_core::health::Health;
use parkstream_redpanda::RedpandaLog;
use parkstream_service::{ServiceConfig, default_garage, seed_topology, spawn_pipeline};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env();
    tracing::info!(?config, "Starting parkstream");

    // Three handles, three consumer groups: the aggregator's event
    // subscription resumes from committed offsets; both snapshot
    // subscriptions replay from earliest. The aggregator's snapshot group
    // is suffixed with the process id so every start replays the compacted
    // log instead of resuming a stale committed position.
    let events: Arc<RedpandaLog> = Arc::new(
        RedpandaLog::builder()
            .brokers(&config.brokers)
            .consumer_group(&config.aggregator_group)
            .build()
            .context("creating event stream handle")?,
    );
    let aggregator_snapshots: Arc<RedpandaLog> = Arc::new(
        RedpandaLog::builder()
            .brokers(&config.brokers)
            .consumer_group(format!(
                "{}-restore-{}",
                config.aggregator_group,
                std::process::id()
            ))
            .auto_offset_reset("earliest")
            .build()
            .context("creating aggregator snapshot handle")?,
    );
    let mirror_snapshots: Arc<RedpandaLog> = Arc::new(
        RedpandaLog::builder()
            .brokers(&config.brokers)
            .consumer_group(&config.mirror_group)
            .auto_offset_reset("earliest")
            .build()
            .context("creating mirror snapshot handle")?,
    );

    let garage = default_garage();
    seed_topology(aggregator_snapshots.as_ref(), &config.snapshot_topic, &garage)
        .await
        .context("seeding garage topology")?;

    let pipeline = spawn_pipeline(
        events,
        aggregator_snapshots,
        mirror_snapshots,
        &config,
        Arc::new(SystemClock),
    );

    let mut status_interval = tokio::time::interval(Duration::from_secs(10));
    status_interval.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-c received, shutting down");
                break;
            }

            _ = status_interval.tick() => {
                let statuses = pipeline.query.all_zone_statuses();
                if statuses.is_empty() {
                    tracing::info!("No zone data yet");
                }
                for status in statuses {
                    tracing::info!(
                        zone = %status.zone_id,
                        occupied = status.occupied_spots,
                        available = status.available_spots,
                        "Zone status"
                    );
                }
                tracing::info!(
                    recent_events = pipeline.query.recent_events().len(),
                    aggregator = ?*pipeline.aggregator_health.borrow(),
                    mirror = ?*pipeline.mirror_health.borrow(),
                    "Pipeline status"
                );
            }
        }

        // A component going unhealthy is fatal: stop rather than keep
        // serving stale data as current.
        if *pipeline.aggregator_health.borrow() == Health::Unhealthy
            || *pipeline.mirror_health.borrow() == Health::Unhealthy
        {
            tracing::error!("Pipeline component unhealthy, shutting down");
            break;
        }
    }

    pipeline.shutdown();
    let (aggregator_result, mirror_result) =
        tokio::join!(pipeline.aggregator_handle, pipeline.mirror_handle);
    aggregator_result.context("joining aggregator task")??;
    mirror_result.context("joining mirror task")??;

    tracing::info!("Parkstream stopped");
    Ok(())
}
