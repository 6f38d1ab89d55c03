//! # Parkstream Service
//!
//! Wiring for the occupancy pipeline: configuration, topology seeding, and
//! the assembly of the aggregation join, cache mirror and query facade into
//! running tasks.
//!
//! The binary (`parkstream`) runs this against a Redpanda/Kafka cluster;
//! the end-to-end tests run the identical wiring against the in-memory log.

use anyhow::Context;
use parkstream_core::activity::ActivityLog;
use parkstream_core::environment::Clock;
use parkstream_core::health::Health;
use parkstream_core::log::DurableLog;
use parkstream_core::model::{Garage, Zone};
use parkstream_core::record::SerializedRecord;
use parkstream_occupancy::{AggregationError, OccupancyAggregator};
use parkstream_query::{CacheMirror, MirrorError, QueryService, ZoneStatusCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Deployment configuration, read from the environment with defaults
/// suitable for local development.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Kafka/Redpanda bootstrap servers.
    pub brokers: String,
    /// Topic carrying parking events, partitioned by zone.
    pub event_topic: String,
    /// Compacted topic carrying the latest occupancy snapshot per zone.
    pub snapshot_topic: String,
    /// Consumer group for the aggregator's event subscription.
    pub aggregator_group: String,
    /// Consumer group for the cache mirror.
    pub mirror_group: String,
    /// Snapshot-stream idle window ending the aggregator's bootstrap replay.
    pub bootstrap_idle: Duration,
}

impl ServiceConfig {
    /// Load configuration from `PARKSTREAM_*` environment variables,
    /// falling back to local-development defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };

        Self {
            brokers: var("PARKSTREAM_BROKERS", "localhost:9092"),
            event_topic: var("PARKSTREAM_EVENT_TOPIC", "parking-events"),
            snapshot_topic: var("PARKSTREAM_SNAPSHOT_TOPIC", "zone-occupancy"),
            aggregator_group: var("PARKSTREAM_AGGREGATOR_GROUP", "occupancy-aggregator"),
            mirror_group: var("PARKSTREAM_MIRROR_GROUP", "zone-status-mirror"),
            bootstrap_idle: OccupancyAggregator::DEFAULT_BOOTSTRAP_IDLE,
        }
    }
}

/// The default garage topology: three zones, 100 spaces.
#[must_use]
pub fn default_garage() -> Garage {
    Garage::new(
        "main-garage",
        "Main Parking Garage",
        vec![
            Zone::new("A", "Zone A", 30),
            Zone::new("B", "Zone B", 40),
            Zone::new("C", "Zone C", 30),
        ],
    )
}

/// Publish one seed snapshot per zone so the aggregation join knows zone
/// capacities before the first event arrives.
///
/// Idempotent: re-seeding overwrites each zone's compacted record with the
/// same empty snapshot, and on an already-running system the later real
/// snapshots win.
///
/// # Errors
///
/// Returns an error if encoding or publishing a seed snapshot fails.
pub async fn seed_topology(
    log: &dyn DurableLog,
    snapshot_topic: &str,
    garage: &Garage,
) -> anyhow::Result<()> {
    for snapshot in garage.seed_snapshots() {
        let record = SerializedRecord::from_record(&snapshot)
            .with_context(|| format!("encoding seed snapshot for zone {}", snapshot.zone_id))?;
        log.publish(snapshot_topic, &record)
            .await
            .with_context(|| format!("publishing seed snapshot for zone {}", snapshot.zone_id))?;
        tracing::info!(zone = %snapshot.zone_id, total = snapshot.total_spaces, "Seeded zone");
    }
    Ok(())
}

/// A running pipeline: spawned aggregator and mirror plus the read models
/// they feed.
pub struct RunningPipeline {
    /// Read-only query facade over the cache and activity ring.
    pub query: QueryService,
    /// The cache maintained by the mirror.
    pub cache: Arc<ZoneStatusCache>,
    /// The activity ring fed by the aggregator.
    pub activity: Arc<ActivityLog>,
    /// Aggregator health.
    pub aggregator_health: watch::Receiver<Health>,
    /// Mirror health.
    pub mirror_health: watch::Receiver<Health>,
    /// Join handle for the aggregator task.
    pub aggregator_handle: JoinHandle<Result<(), AggregationError>>,
    /// Join handle for the mirror task.
    pub mirror_handle: JoinHandle<Result<(), MirrorError>>,
    aggregator_shutdown: watch::Sender<bool>,
    mirror_shutdown: watch::Sender<bool>,
}

impl RunningPipeline {
    /// Signal both components to stop; await the join handles to observe
    /// completion.
    pub fn shutdown(&self) {
        let _ = self.aggregator_shutdown.send(true);
        let _ = self.mirror_shutdown.send(true);
    }
}

/// Assemble and spawn the pipeline over the given log handles.
///
/// `events` must resume from committed offsets; `aggregator_snapshots` and
/// `mirror_snapshots` must replay from earliest (see the redpanda crate
/// docs for the per-handle offset policy). The handles may all be the same
/// object for log implementations that replay on every subscription, like
/// the in-memory test log.
#[must_use]
pub fn spawn_pipeline(
    events: Arc<dyn DurableLog>,
    aggregator_snapshots: Arc<dyn DurableLog>,
    mirror_snapshots: Arc<dyn DurableLog>,
    config: &ServiceConfig,
    clock: Arc<dyn Clock>,
) -> RunningPipeline {
    let activity = Arc::new(ActivityLog::new());
    let cache = Arc::new(ZoneStatusCache::new());

    let (aggregator, aggregator_shutdown) = OccupancyAggregator::new(
        events,
        aggregator_snapshots,
        config.event_topic.clone(),
        config.snapshot_topic.clone(),
        Arc::clone(&activity),
        Arc::clone(&clock),
    );
    let mut aggregator = aggregator.with_bootstrap_idle(config.bootstrap_idle);
    let aggregator_health = aggregator.health();
    let aggregator_handle = tokio::spawn(async move { aggregator.run().await });

    let (mut mirror, mirror_shutdown) = CacheMirror::new(
        mirror_snapshots,
        config.snapshot_topic.clone(),
        Arc::clone(&cache),
        clock,
    );
    let mirror_health = mirror.health();
    let mirror_handle = tokio::spawn(async move { mirror.run().await });

    RunningPipeline {
        query: QueryService::new(Arc::clone(&cache), Arc::clone(&activity)),
        cache,
        activity,
        aggregator_health,
        mirror_health,
        aggregator_handle,
        mirror_handle,
        aggregator_shutdown,
        mirror_shutdown,
    }
}
