//! Cache mirror: the independent snapshot-log consumer feeding the cache.

use crate::cache::ZoneStatusCache;
use futures::StreamExt;
use parkstream_core::environment::Clock;
use parkstream_core::health::Health;
use parkstream_core::log::{DurableLog, LogError};
use parkstream_core::model::{OccupancySnapshot, ZoneStatus};
use parkstream_core::record::{OCCUPANCY_SNAPSHOT_V1, SerializedRecord};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Errors that stop the cache mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Could not establish the snapshot log subscription.
    #[error("Failed to subscribe: {0}")]
    Subscription(LogError),

    /// The snapshot log subscription ended.
    #[error("Snapshot log stream terminated")]
    StreamTerminated,
}

/// Independent reader of the snapshot log maintaining the
/// [`ZoneStatusCache`].
///
/// Runs on its own subscription (own consumer group, replaying from
/// earliest) so read-path failures never touch write-path correctness, and
/// vice versa. Each observed snapshot is recomputed into a [`ZoneStatus`]
/// (`available = total - occupied`) and stamped with *processing* time
/// before overwriting the cache entry.
///
/// The mirror may lag the snapshot log by a bounded interval; queries see
/// eventually-consistent data and never wait for it to catch up.
pub struct CacheMirror {
    /// Snapshot log handle, configured to replay from earliest.
    snapshots: Arc<dyn DurableLog>,
    /// Snapshot log topic.
    snapshot_topic: String,
    /// The cache this mirror maintains.
    cache: Arc<ZoneStatusCache>,
    /// Processing-time source for `last_updated` stamps.
    clock: Arc<dyn Clock>,
    /// Health reported to whoever wired the component.
    health: watch::Sender<Health>,
    /// Shutdown signal.
    shutdown: watch::Receiver<bool>,
}

impl CacheMirror {
    /// Create a mirror and the sender used to shut it down.
    #[must_use]
    pub fn new(
        snapshots: Arc<dyn DurableLog>,
        snapshot_topic: impl Into<String>,
        cache: Arc<ZoneStatusCache>,
        clock: Arc<dyn Clock>,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (health_tx, _) = watch::channel(Health::Healthy);

        let mirror = Self {
            snapshots,
            snapshot_topic: snapshot_topic.into(),
            cache,
            clock,
            health: health_tx,
            shutdown: shutdown_rx,
        };

        (mirror, shutdown_tx)
    }

    /// Subscribe to this component's health.
    #[must_use]
    pub fn health(&self) -> watch::Receiver<Health> {
        self.health.subscribe()
    }

    /// Consume the snapshot log until shutdown or a fatal failure.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when the subscription cannot be established
    /// or the stream terminates; continuing would mean silently serving
    /// ever-staler data as current. Health flips to [`Health::Unhealthy`]
    /// before returning.
    pub async fn run(&mut self) -> Result<(), MirrorError> {
        tracing::info!(snapshot_topic = %self.snapshot_topic, "Starting cache mirror");

        let mut stream = self
            .snapshots
            .subscribe(&[self.snapshot_topic.as_str()])
            .await
            .map_err(|e| self.fail(MirrorError::Subscription(e)))?;

        while !*self.shutdown.borrow() {
            tokio::select! {
                record = stream.next() => match record {
                    Some(Ok(record)) => self.apply(&record),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Error on snapshot stream");
                    }
                    None => return Err(self.fail(MirrorError::StreamTerminated)),
                },

                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        tracing::info!("Cache mirror stopped");
        Ok(())
    }

    /// Recompute and overwrite one cache entry from a snapshot record.
    fn apply(&self, record: &SerializedRecord) {
        if record.record_type != OCCUPANCY_SNAPSHOT_V1 {
            tracing::warn!(
                record_type = %record.record_type,
                key = %record.key,
                "Unknown record type on snapshot log"
            );
            return;
        }

        let snapshot = match record.decode::<OccupancySnapshot>() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(key = %record.key, error = %e, "Undecodable snapshot record");
                return;
            }
        };

        let status = ZoneStatus::from_snapshot(&snapshot, self.clock.now());
        tracing::info!(
            zone = %status.zone_id,
            occupied = status.occupied_spots,
            available = status.available_spots,
            "Updating cache"
        );
        self.cache.update(status);
    }

    /// Flip health to unhealthy and pass the error through.
    fn fail(&self, error: MirrorError) -> MirrorError {
        tracing::error!(error = %error, "Cache mirror failing");
        let _ = self.health.send(Health::Unhealthy);
        error
    }
}
