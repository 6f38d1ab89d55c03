//! The occupancy aggregation join.

use crate::view::OccupancyView;
use futures::StreamExt;
use parkstream_core::activity::ActivityLog;
use parkstream_core::environment::Clock;
use parkstream_core::health::Health;
use parkstream_core::log::{DurableLog, LogError, RecordStream};
use parkstream_core::model::{ActivityKind, EventType, OccupancySnapshot, ParkingEvent, ZoneActivityEvent};
use parkstream_core::record::{OCCUPANCY_SNAPSHOT_V1, PARKING_EVENT_V1, SerializedRecord};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Errors that stop the aggregation join.
///
/// Anything that reaches this enum is fatal to the component: transient
/// per-record problems (malformed payloads, unrecognized event types) are
/// logged and skipped instead.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// Could not establish a log subscription.
    #[error("Failed to subscribe: {0}")]
    Subscription(LogError),

    /// Could not publish an updated snapshot to the snapshot log.
    #[error("Failed to publish snapshot for zone '{zone_id}': {source}")]
    Publish {
        /// The zone whose snapshot could not be written.
        zone_id: String,
        /// The underlying log failure.
        source: LogError,
    },

    /// The event stream subscription ended.
    #[error("Event stream terminated")]
    EventStreamTerminated,

    /// The snapshot log subscription ended.
    #[error("Snapshot log stream terminated")]
    SnapshotStreamTerminated,
}

/// Stateful processor joining the event stream to the snapshot log.
///
/// One aggregator instance serves the zone partitions its consumer group
/// assigns it; within the instance, records are processed one at a time in
/// arrival order, which is the only ordering guarantee occupancy counting
/// relies on. Scale-out is by running more instances in the same group:
/// each then owns a disjoint set of zones, and no two writers ever contend
/// for the same zone key.
///
/// # Example
///
/// ```ignore
/// let (mut aggregator, shutdown) = OccupancyAggregator::new(
///     events_handle,           // committed offsets
///     snapshots_handle,        // earliest, for state rebuild
///     "parking-events",
///     "zone-occupancy",
///     Arc::clone(&activity),
///     Arc::new(SystemClock),
/// );
///
/// let health = aggregator.health();
/// tokio::spawn(async move { aggregator.run().await });
/// // ... shutdown.send(true) to stop.
/// ```
pub struct OccupancyAggregator {
    /// Handle for the event stream subscription (resumes from committed
    /// offsets).
    events: Arc<dyn DurableLog>,
    /// Handle for the snapshot log: subscribed from earliest for the state
    /// rebuild, and used to publish updated snapshots.
    snapshots: Arc<dyn DurableLog>,
    /// Event stream topic.
    event_topic: String,
    /// Snapshot log topic.
    snapshot_topic: String,
    /// Materialized latest-snapshot-per-zone state.
    view: OccupancyView,
    /// Ring of recent activity, shared with the query path.
    activity: Arc<ActivityLog>,
    /// Processing-time source for activity stamps.
    clock: Arc<dyn Clock>,
    /// How long the snapshot stream must stay idle before bootstrap is
    /// considered complete.
    bootstrap_idle: Duration,
    /// Health reported to whoever wired the component.
    health: watch::Sender<Health>,
    /// Shutdown signal.
    shutdown: watch::Receiver<bool>,
}

impl OccupancyAggregator {
    /// Default snapshot-stream idle window ending bootstrap.
    pub const DEFAULT_BOOTSTRAP_IDLE: Duration = Duration::from_secs(2);

    /// Create an aggregator and the sender used to shut it down.
    ///
    /// `events` must be configured to resume from committed offsets;
    /// `snapshots` must replay from earliest so [`run`](Self::run) can
    /// rebuild the view. The two may be the same handle when the
    /// implementation (e.g. the in-memory test log) replays for every
    /// subscription.
    #[must_use]
    pub fn new(
        events: Arc<dyn DurableLog>,
        snapshots: Arc<dyn DurableLog>,
        event_topic: impl Into<String>,
        snapshot_topic: impl Into<String>,
        activity: Arc<ActivityLog>,
        clock: Arc<dyn Clock>,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (health_tx, _) = watch::channel(Health::Healthy);

        let aggregator = Self {
            events,
            snapshots,
            event_topic: event_topic.into(),
            snapshot_topic: snapshot_topic.into(),
            view: OccupancyView::new(),
            activity,
            clock,
            bootstrap_idle: Self::DEFAULT_BOOTSTRAP_IDLE,
            health: health_tx,
            shutdown: shutdown_rx,
        };

        (aggregator, shutdown_tx)
    }

    /// Override the bootstrap idle window (tests use a few milliseconds).
    #[must_use]
    pub const fn with_bootstrap_idle(mut self, idle: Duration) -> Self {
        self.bootstrap_idle = idle;
        self
    }

    /// Subscribe to this component's health.
    #[must_use]
    pub fn health(&self) -> watch::Receiver<Health> {
        self.health.subscribe()
    }

    /// Read access to the materialized view (primarily for tests and
    /// diagnostics).
    #[must_use]
    pub const fn view(&self) -> &OccupancyView {
        &self.view
    }

    /// Run the join until shutdown or a fatal log failure.
    ///
    /// Replays the snapshot log into the view first (recovery), then
    /// consumes both streams: snapshot arrivals update the view only, event
    /// arrivals drive aggregation.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationError`] when a subscription cannot be
    /// established, a stream terminates, or a snapshot publish fails; all are
    /// cases where continuing would silently lose occupancy updates. Health
    /// flips to [`Health::Unhealthy`] before returning.
    pub async fn run(&mut self) -> Result<(), AggregationError> {
        tracing::info!(
            event_topic = %self.event_topic,
            snapshot_topic = %self.snapshot_topic,
            "Starting occupancy aggregator"
        );

        let mut snapshot_stream = self
            .snapshots
            .subscribe(&[self.snapshot_topic.as_str()])
            .await
            .map_err(|e| self.fail(AggregationError::Subscription(e)))?;

        self.bootstrap(&mut snapshot_stream).await?;

        let mut event_stream = self
            .events
            .subscribe(&[self.event_topic.as_str()])
            .await
            .map_err(|e| self.fail(AggregationError::Subscription(e)))?;

        while !*self.shutdown.borrow() {
            tokio::select! {
                // Table side: materialize, never emit.
                snapshot = snapshot_stream.next() => match snapshot {
                    Some(Ok(record)) => self.absorb_snapshot(&record),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Error on snapshot stream");
                    }
                    None => return Err(self.fail(AggregationError::SnapshotStreamTerminated)),
                },

                // Stream side: the only trigger for aggregation.
                event = event_stream.next() => match event {
                    Some(Ok(record)) => self.process_event(&record).await?,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Error on event stream");
                    }
                    None => return Err(self.fail(AggregationError::EventStreamTerminated)),
                },

                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        tracing::info!("Occupancy aggregator stopped");
        Ok(())
    }

    /// Drain the snapshot stream until it stays idle for the configured
    /// window, restoring the last materialized snapshot per zone.
    async fn bootstrap(&mut self, snapshot_stream: &mut RecordStream) -> Result<(), AggregationError> {
        loop {
            match tokio::time::timeout(self.bootstrap_idle, snapshot_stream.next()).await {
                Ok(Some(Ok(record))) => self.absorb_snapshot(&record),
                Ok(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Error replaying snapshot log");
                }
                Ok(None) => return Err(self.fail(AggregationError::SnapshotStreamTerminated)),
                // Idle: the compacted log has been replayed.
                Err(_) => break,
            }
        }

        tracing::info!(zones = self.view.len(), "Materialized view restored");
        Ok(())
    }

    /// Apply a snapshot-log record to the view. Table-side only: this path
    /// produces no output, which is what keeps the feedback loop
    /// one-directional.
    fn absorb_snapshot(&mut self, record: &SerializedRecord) {
        if record.record_type != OCCUPANCY_SNAPSHOT_V1 {
            tracing::warn!(
                record_type = %record.record_type,
                key = %record.key,
                "Unknown record type on snapshot log"
            );
            return;
        }

        match record.decode::<OccupancySnapshot>() {
            Ok(snapshot) => {
                tracing::debug!(
                    zone = %snapshot.zone_id,
                    total = snapshot.total_spaces,
                    occupied = snapshot.occupied_spaces,
                    "Materializing snapshot"
                );
                self.view.insert(snapshot);
            }
            Err(e) => {
                tracing::warn!(key = %record.key, error = %e, "Undecodable snapshot record");
            }
        }
    }

    /// Process one event-stream record: fold, publish, materialize, notify.
    async fn process_event(&mut self, record: &SerializedRecord) -> Result<(), AggregationError> {
        if record.record_type != PARKING_EVENT_V1 {
            tracing::warn!(
                record_type = %record.record_type,
                key = %record.key,
                "Unknown record type on event stream"
            );
            return Ok(());
        }

        let event = match record.decode::<ParkingEvent>() {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(key = %record.key, error = %e, "Undecodable parking event");
                return Ok(());
            }
        };

        let Some(kind) = ActivityKind::from_event_type(event.event_type) else {
            // Not an error: a producer ahead of our schema. No state change.
            tracing::warn!(
                zone = %event.zone_id,
                event_id = %event.event_id,
                "Unrecognized event type, skipping"
            );
            return Ok(());
        };

        let prev = self.view.snapshot_or_zero(&event.zone_id);
        if event.event_type == EventType::Exited && prev.occupied_spaces == 0 {
            // Data-quality anomaly: an exit with no matching entry. The
            // count clamps at zero; surface it for operators.
            tracing::warn!(
                zone = %event.zone_id,
                event_id = %event.event_id,
                "Exit event for empty zone, clamping occupancy at zero"
            );
        }

        let updated = prev.apply(event.event_type);

        let serialized = match SerializedRecord::from_record(&updated) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::warn!(zone = %updated.zone_id, error = %e, "Failed to encode snapshot");
                return Ok(());
            }
        };

        self.snapshots
            .publish(&self.snapshot_topic, &serialized)
            .await
            .map_err(|e| {
                self.fail(AggregationError::Publish {
                    zone_id: updated.zone_id.clone(),
                    source: e,
                })
            })?;

        tracing::info!(
            zone = %updated.zone_id,
            total = updated.total_spaces,
            occupied = updated.occupied_spaces,
            "Zone occupancy updated"
        );

        // Read-your-writes: the next event for this zone must see this
        // snapshot without waiting for the feedback echo.
        self.view.insert(updated);

        self.activity.record(ZoneActivityEvent {
            zone_id: event.zone_id,
            kind,
            timestamp: self.clock.now(),
        });

        Ok(())
    }

    /// Flip health to unhealthy and pass the error through.
    fn fail(&self, error: AggregationError) -> AggregationError {
        tracing::error!(error = %error, "Occupancy aggregator failing");
        let _ = self.health.send(Health::Unhealthy);
        error
    }
}
