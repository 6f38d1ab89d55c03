//! Redpanda-backed durable log for the parkstream pipeline.
//!
//! Implements [`DurableLog`] from `parkstream-core` on top of `rdkafka`, so
//! any Kafka-compatible broker (Redpanda, Apache Kafka, MSK, ...) can carry
//! the event stream and the snapshot log.
//!
//! # Partitioning
//!
//! Every [`SerializedRecord`] carries its partition key (the zone id), and
//! publishes use it as the Kafka message key. All records for a zone land on
//! one partition, which is what gives the aggregation join its per-zone
//! ordering guarantee. The snapshot topic is expected to be configured with
//! key compaction (`cleanup.policy=compact`) so only the latest snapshot per
//! zone is retained long-term.
//!
//! # Delivery semantics
//!
//! At-least-once, with manual offset commits: an offset is committed only
//! after the record has been handed to the subscriber's channel. A crash
//! before commit redelivers the record on restart, so consumers must
//! tolerate observing a record twice.
//!
//! # Offset policy per handle
//!
//! Where a subscription starts is fixed when the handle is built:
//!
//! - the aggregation join's **snapshot handle** and the cache mirror replay
//!   from `earliest` (rebuild state from the compacted log);
//! - the aggregation join's **event handle** resumes from its consumer
//!   group's committed offset (`latest` for a brand-new group).
//!
//! # Example
//!
//! ```no_run
//! use parkstream_redpanda::RedpandaLog;
//! use parkstream_core::log::DurableLog;
//! use parkstream_core::record::SerializedRecord;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let log = RedpandaLog::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("zone-status-mirror")
//!     .auto_offset_reset("earliest")
//!     .build()?;
//!
//! let mut stream = log.subscribe(&["zone-occupancy"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(record) => println!("zone {}: {}", record.key, record.record_type),
//!         Err(e) => eprintln!("stream error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use futures::StreamExt;
use parkstream_core::log::{DurableLog, LogError, RecordStream};
use parkstream_core::record::SerializedRecord;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Wire form of a record on a Kafka topic: the record type tag is prefixed
/// to the payload so the key stays the raw zone id (compaction-friendly)
/// while the value remains self-describing.
fn encode_value(record: &SerializedRecord) -> Vec<u8> {
    let type_bytes = record.record_type.as_bytes();
    let mut value = Vec::with_capacity(4 + type_bytes.len() + record.data.len());
    value.extend_from_slice(&(type_bytes.len() as u32).to_be_bytes());
    value.extend_from_slice(type_bytes);
    value.extend_from_slice(&record.data);
    value
}

/// Inverse of [`encode_value`]; reconstructs a [`SerializedRecord`] from a
/// message key and value.
fn decode_value(key: &str, value: &[u8]) -> Result<SerializedRecord, LogError> {
    let header: [u8; 4] = value
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| LogError::DeserializationFailed("value shorter than header".to_string()))?;
    let type_len = u32::from_be_bytes(header) as usize;

    let type_end = 4_usize
        .checked_add(type_len)
        .filter(|end| *end <= value.len())
        .ok_or_else(|| LogError::DeserializationFailed("type tag exceeds value".to_string()))?;

    let record_type = std::str::from_utf8(&value[4..type_end])
        .map_err(|e| LogError::DeserializationFailed(format!("type tag not utf-8: {e}")))?
        .to_string();

    Ok(SerializedRecord::new(
        record_type,
        key.to_string(),
        value[type_end..].to_vec(),
    ))
}

/// Durable log handle backed by a Redpanda/Kafka cluster.
///
/// One handle owns a producer and the configuration consumers are built
/// from. Components that need different offset policies (see crate docs)
/// build separate handles.
pub struct RedpandaLog {
    /// Kafka producer for publishing records.
    producer: FutureProducer,
    /// Broker addresses (for creating consumers).
    brokers: String,
    /// Producer send timeout.
    timeout: Duration,
    /// Consumer group ID (if explicitly set).
    consumer_group: Option<String>,
    /// Record buffer size for subscribers.
    buffer_size: usize,
    /// Auto offset reset policy.
    auto_offset_reset: String,
}

impl RedpandaLog {
    /// Create a log handle with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::ConnectionFailed`] if the producer cannot be
    /// created from the given broker list.
    pub fn new(brokers: &str) -> Result<Self, LogError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a builder for configuring the log handle.
    #[must_use]
    pub fn builder() -> RedpandaLogBuilder {
        RedpandaLogBuilder::default()
    }

    /// The broker list this handle connects to.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for configuring a [`RedpandaLog`].
#[derive(Default)]
pub struct RedpandaLogBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaLogBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode: `"0"`, `"1"` (default), or
    /// `"all"`.
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec (`"none"` (default), `"gzip"`, `"snappy"`,
    /// `"lz4"`, `"zstd"`).
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the producer send timeout. Default: 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the consumer group ID for subscriptions created from this handle.
    ///
    /// Each consumer in the pipeline uses its own group (the aggregation
    /// join's event handle, its snapshot handle, and the cache mirror track
    /// progress independently). If unset, a group name is derived from the
    /// subscribed topics.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set the in-memory record buffer between the Kafka consumer and the
    /// subscriber. Default: 1000.
    ///
    /// # Panics
    ///
    /// Panics if `buffer_size` is 0.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        assert!(buffer_size > 0, "buffer_size must be greater than 0");
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Set where a new consumer group starts reading: `"earliest"` (replay
    /// the topic, required for state rebuilds) or `"latest"` (default, only
    /// new records).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`RedpandaLog`].
    ///
    /// # Errors
    ///
    /// Returns [`LogError::ConnectionFailed`] if brokers are unset or the
    /// producer cannot be created.
    pub fn build(self) -> Result<RedpandaLog, LogError> {
        let brokers = self
            .brokers
            .ok_or_else(|| LogError::ConnectionFailed("Brokers not configured".to_string()))?;

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", self.producer_acks.as_deref().unwrap_or("1"))
            .set(
                "compression.type",
                self.compression.as_deref().unwrap_or("none"),
            );

        let producer: FutureProducer = producer_config
            .create()
            .map_err(|e| LogError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        tracing::info!(
            brokers = %brokers,
            consumer_group = self.consumer_group.as_deref().unwrap_or("<derived>"),
            auto_offset_reset = self.auto_offset_reset.as_deref().unwrap_or("latest"),
            "RedpandaLog created"
        );

        Ok(RedpandaLog {
            producer,
            brokers,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            consumer_group: self.consumer_group,
            buffer_size: self.buffer_size.unwrap_or(1000),
            auto_offset_reset: self.auto_offset_reset.unwrap_or_else(|| "latest".to_string()),
        })
    }
}

impl DurableLog for RedpandaLog {
    fn publish(
        &self,
        topic: &str,
        record: &SerializedRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>> {
        let topic = topic.to_string();
        let record = record.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let value = encode_value(&record);

            // The partition key is the zone id: same zone, same partition,
            // strict order, and the compaction key on snapshot topics.
            let kafka_record = FutureRecord::to(&topic)
                .payload(&value)
                .key(record.key.as_bytes());

            match self
                .producer
                .send(kafka_record, Timeout::After(timeout))
                .await
            {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition = partition,
                        offset = offset,
                        key = %record.key,
                        record_type = %record.record_type,
                        "Record published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %topic,
                        key = %record.key,
                        error = %kafka_error,
                        "Failed to publish record"
                    );
                    Err(LogError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<RecordStream, LogError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let group_id = consumer_group.unwrap_or_else(|| {
                let mut sorted = topics.clone();
                sorted.sort();
                format!("parkstream-{}", sorted.join("-"))
            });

            // Manual commit keeps delivery at-least-once: offsets advance
            // only after the record reaches the subscriber's channel.
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| LogError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| LogError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %group_id,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            // The spawned task owns the consumer and forwards records;
            // commits happen only after a successful channel send.
            tokio::spawn(async move {
                let mut stream = consumer.stream();

                while let Some(msg_result) = stream.next().await {
                    match msg_result {
                        Ok(message) => {
                            let record_result = match (message.key(), message.payload()) {
                                (Some(key), Some(payload)) => std::str::from_utf8(key)
                                    .map_err(|e| {
                                        LogError::DeserializationFailed(format!(
                                            "record key not utf-8: {e}"
                                        ))
                                    })
                                    .and_then(|key| decode_value(key, payload)),
                                _ => Err(LogError::DeserializationFailed(
                                    "message missing key or payload".to_string(),
                                )),
                            };

                            let was_decode_failure = record_result.is_err();
                            if tx.send(record_result).await.is_err() {
                                // Receiver dropped: exit without committing
                                // so the record is redelivered elsewhere.
                                tracing::debug!("Subscriber dropped, exiting consumer task");
                                break;
                            }

                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "Offset commit failed (record may be redelivered)"
                                );
                            } else if was_decode_failure {
                                tracing::warn!(
                                    topic = message.topic(),
                                    offset = message.offset(),
                                    "Committed past undecodable record"
                                );
                            }
                        }
                        Err(e) => {
                            let err =
                                LogError::TransportError(format!("Failed to receive record: {e}"));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                        }
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as RecordStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redpanda_log_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaLog>();
        assert_sync::<RedpandaLog>();
    }

    #[test]
    fn value_encoding_round_trips() {
        let record = SerializedRecord::new(
            "OccupancySnapshot.v1".to_string(),
            "A".to_string(),
            vec![1, 2, 3, 4],
        );
        let value = encode_value(&record);
        #[allow(clippy::unwrap_used)] // Panics: test fails if decode fails
        let decoded = decode_value("A", &value).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn truncated_value_is_rejected() {
        assert!(matches!(
            decode_value("A", &[0, 0]),
            Err(LogError::DeserializationFailed(_))
        ));
        // Header claims a type tag longer than the value.
        assert!(matches!(
            decode_value("A", &[0, 0, 0, 99, b'x']),
            Err(LogError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn builder_requires_brokers() {
        assert!(matches!(
            RedpandaLog::builder().build(),
            Err(LogError::ConnectionFailed(_))
        ));
    }
}
