//! Durable log abstraction: publish/subscribe over a partitioned,
//! key-ordered append log.
//!
//! Two logs drive the pipeline, both behind this one trait:
//!
//! - the **event stream** (`parking-events`): append-only vehicle
//!   entry/exit events, partitioned by zone;
//! - the **snapshot log** (`zone-occupancy`): key-compacted, holding the
//!   latest [`OccupancySnapshot`](crate::model::OccupancySnapshot) per zone.
//!
//! Offset semantics (resume from committed position vs. replay from
//! earliest) and the consumer group are decided when the log handle is
//! built, not per call: each consumer constructs a handle configured for
//! its own replay needs. Delivery is at-least-once: consumers must tolerate
//! a record being observed twice across a crash.
//!
//! Implementations: `RedpandaLog` (production, `parkstream-redpanda`) and
//! `MemoryLog` (deterministic tests, `parkstream-testing`).

use crate::record::SerializedRecord;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during durable log operations.
#[derive(Error, Debug, Clone)]
pub enum LogError {
    /// Failed to connect to the log broker.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a record to a topic.
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to subscribe to topics.
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// The reason for failure.
        reason: String,
    },

    /// A record arrived that could not be decoded.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Network or transport error.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Generic error for other failures.
    #[error("Log error: {0}")]
    Other(String),
}

/// Stream of records from a subscription.
///
/// Each item is a `Result`: transient decode/transport failures surface as
/// `Err` items while the stream keeps going; the stream *ending* means the
/// subscription itself is gone, which consumers treat as fatal.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<SerializedRecord, LogError>> + Send>>;

/// A durable, partitioned, key-ordered append log.
///
/// # Guarantees assumed of implementations
///
/// - **Ordered within a partition**: records with the same key are delivered
///   in publish order. This is the only ordering the pipeline relies on.
/// - **At-least-once**: a record may be redelivered after a crash between
///   delivery and offset commit.
/// - **Compaction** (snapshot topics): retention may drop all but the latest
///   record per key; replaying from earliest still yields the latest state.
///
/// # Dyn compatibility
///
/// Methods return `Pin<Box<dyn Future>>` rather than using `async fn` so the
/// trait can be used as `Arc<dyn DurableLog>` and shared across components.
pub trait DurableLog: Send + Sync {
    /// Publish a record to a topic, partitioned by the record's key.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::PublishFailed`] if the record cannot be written.
    fn publish(
        &self,
        topic: &str,
        record: &SerializedRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of records.
    ///
    /// Where the stream starts (earliest vs. committed offset) is a property
    /// of the handle, fixed at construction time.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::SubscriptionFailed`] if the subscription cannot
    /// be established.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<RecordStream, LogError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_error_display_carries_context() {
        let err = LogError::PublishFailed {
            topic: "zone-occupancy".to_string(),
            reason: "broker away".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("zone-occupancy"));
        assert!(rendered.contains("broker away"));
    }

    #[test]
    fn errors_are_cloneable_for_stream_fanout() {
        let err = LogError::TransportError("reset".to_string());
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
