//! In-memory durable log for deterministic pipeline tests.

use parkstream_core::log::{DurableLog, LogError, RecordStream};
use parkstream_core::record::SerializedRecord;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

type RecordResult = Result<SerializedRecord, LogError>;

#[derive(Default)]
struct TopicState {
    /// Every record ever published, in publish order. Retention is
    /// unbounded: tests are short-lived, and replay-from-start then models
    /// both an uncompacted topic read from earliest and (because applying
    /// stale snapshots before the latest is idempotent) a compacted one.
    records: Vec<SerializedRecord>,
    /// Live fan-out channels for active subscriptions.
    subscribers: Vec<mpsc::UnboundedSender<RecordResult>>,
}

/// Fully in-memory [`DurableLog`]: per-topic retained records plus live
/// fan-out to subscribers.
///
/// Semantics match what the pipeline assumes of the real log:
///
/// - publish order is preserved per topic (and therefore per key);
/// - every subscription replays retained records from the start, then tails
///   live publishes, the in-memory equivalent of a consumer group created
///   with `auto.offset.reset=earliest`;
/// - each subscription sees every record (independent consumer groups).
///
/// Cloning is cheap and shares the underlying topics, so a producer and
/// several consumers can hold "handles" to the same log, as they would with
/// a shared broker.
#[derive(Clone, Default)]
pub struct MemoryLog {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
}

impl MemoryLog {
    /// Create an empty in-memory log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All records retained for a topic, in publish order. For assertions.
    #[must_use]
    pub fn records(&self, topic: &str) -> Vec<SerializedRecord> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(|state| state.records.clone())
            .unwrap_or_default()
    }

    /// Number of records retained for a topic. For assertions.
    #[must_use]
    pub fn record_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, |state| state.records.len())
    }

    /// Drop all topics and retained records (subscriber channels close).
    pub fn clear(&self) {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DurableLog for MemoryLog {
    fn publish(
        &self,
        topic: &str,
        record: &SerializedRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>> {
        let topic = topic.to_string();
        let record = record.clone();

        Box::pin(async move {
            let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
            let state = topics.entry(topic).or_default();
            state.records.push(record.clone());
            // Fan out to live subscribers, dropping any that went away.
            state
                .subscribers
                .retain(|tx| tx.send(Ok(record.clone())).is_ok());
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<RecordStream, LogError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();

        Box::pin(async move {
            let (tx, rx) = mpsc::unbounded_channel();

            {
                let mut state_map = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
                for topic in &topics {
                    let state = state_map.entry(topic.clone()).or_default();
                    // Replay retention first; live records follow through
                    // the channel in publish order.
                    for record in &state.records {
                        let _ = tx.send(Ok(record.clone()));
                    }
                    state.subscribers.push(tx.clone());
                }
            }
            drop(tx);

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
