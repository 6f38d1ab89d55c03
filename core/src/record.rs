//! Wire records: the versioned binary encoding used on the durable logs.
//!
//! Records are serialized with `bincode` and tagged with a stable,
//! versioned `record_type` string (e.g. `"ParkingEvent.v1"`) so schemas can
//! evolve over time. Unlike a generic event bus, every record here also
//! carries an explicit **partition key**, the zone id, because per-zone
//! ordering is the one correctness guarantee the aggregation join relies on.
//!
//! # Example
//!
//! ```
//! use parkstream_core::model::OccupancySnapshot;
//! use parkstream_core::record::SerializedRecord;
//!
//! let snapshot = OccupancySnapshot {
//!     zone_id: "A".to_string(),
//!     total_spaces: 30,
//!     occupied_spaces: 4,
//! };
//!
//! let serialized = SerializedRecord::from_record(&snapshot)?;
//! assert_eq!(serialized.record_type, "OccupancySnapshot.v1");
//! assert_eq!(serialized.key, "A");
//!
//! let decoded: OccupancySnapshot = serialized.decode()?;
//! assert_eq!(decoded, snapshot);
//! # Ok::<(), parkstream_core::record::RecordError>(())
//! ```

use crate::model::{OccupancySnapshot, ParkingEvent};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for record encoding and decoding.
#[derive(Error, Debug)]
pub enum RecordError {
    /// Failed to serialize a record to bytes.
    #[error("Failed to serialize record: {0}")]
    Serialization(String),

    /// Failed to deserialize a record from bytes.
    #[error("Failed to deserialize record: {0}")]
    Deserialization(String),

    /// A record tagged with a type this consumer does not know.
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),
}

/// A value that can be written to and read back from a durable log.
///
/// # Record naming convention
///
/// [`record_type`](Record::record_type) returns a stable identifier with a
/// version suffix (`"ParkingEvent.v1"`, `"OccupancySnapshot.v1"`), allowing
/// schema evolution without breaking old consumers.
///
/// # Partitioning
///
/// [`partition_key`](Record::partition_key) determines which partition the
/// record lands on. All parkstream records key by zone id: events for a zone
/// are strictly ordered, and the snapshot log compacts to one live record
/// per zone.
pub trait Record: Send + Sync + 'static {
    /// Stable, versioned identifier for this record's schema.
    fn record_type(&self) -> &'static str;

    /// The partition key (zone id) for this record.
    fn partition_key(&self) -> &str;

    /// Serialize this record to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Serialization`] if encoding fails.
    fn to_bytes(&self) -> Result<Vec<u8>, RecordError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| RecordError::Serialization(e.to_string()))
    }

    /// Deserialize a record from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Deserialization`] if the bytes are corrupt or
    /// encode a different schema.
    fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| RecordError::Deserialization(e.to_string()))
    }
}

/// Record type tag for [`ParkingEvent`] payloads.
pub const PARKING_EVENT_V1: &str = "ParkingEvent.v1";

/// Record type tag for [`OccupancySnapshot`] payloads.
pub const OCCUPANCY_SNAPSHOT_V1: &str = "OccupancySnapshot.v1";

impl Record for ParkingEvent {
    fn record_type(&self) -> &'static str {
        PARKING_EVENT_V1
    }

    fn partition_key(&self) -> &str {
        &self.zone_id
    }
}

impl Record for OccupancySnapshot {
    fn record_type(&self) -> &'static str {
        OCCUPANCY_SNAPSHOT_V1
    }

    fn partition_key(&self) -> &str {
        &self.zone_id
    }
}

/// A serialized record ready for publishing: type tag, partition key, and
/// payload bytes.
///
/// This is the wire format between components and the durable log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedRecord {
    /// The record type identifier (e.g. `"OccupancySnapshot.v1"`).
    pub record_type: String,

    /// The partition key; the zone id for all parkstream records.
    pub key: String,

    /// The bincode-serialized payload.
    pub data: Vec<u8>,
}

impl SerializedRecord {
    /// Create a serialized record from raw parts.
    #[must_use]
    pub const fn new(record_type: String, key: String, data: Vec<u8>) -> Self {
        Self {
            record_type,
            key,
            data,
        }
    }

    /// Serialize a [`Record`] into its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Serialization`] if encoding fails.
    pub fn from_record<R: Record + Serialize>(record: &R) -> Result<Self, RecordError> {
        Ok(Self {
            record_type: record.record_type().to_string(),
            key: record.partition_key().to_string(),
            data: record.to_bytes()?,
        })
    }

    /// Decode the payload as a concrete record type.
    ///
    /// The caller picks the target type based on topic or
    /// [`record_type`](Self::record_type); the payload is not self-describing
    /// beyond that tag.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Deserialization`] if the payload does not
    /// decode as `R`.
    pub fn decode<R: Record + DeserializeOwned>(&self) -> Result<R, RecordError> {
        R::from_bytes(&self.data)
    }
}

impl fmt::Display for SerializedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedRecord {{ type: {}, key: {}, size: {} bytes }}",
            self.record_type,
            self.key,
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventType, VehicleRef};
    use uuid::Uuid;

    fn sample_event() -> ParkingEvent {
        ParkingEvent {
            event_id: Uuid::new_v4(),
            space_id: "A-17".to_string(),
            zone_id: "A".to_string(),
            event_type: EventType::Entered,
            vehicle: VehicleRef {
                id: "veh-1".to_string(),
                license_plate: "XYZ-123".to_string(),
                state: "CA".to_string(),
                vehicle_type: "car".to_string(),
            },
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if serialization fails
    fn parking_event_round_trips() {
        let event = sample_event();
        let serialized = SerializedRecord::from_record(&event).expect("serialize");

        assert_eq!(serialized.record_type, "ParkingEvent.v1");
        assert_eq!(serialized.key, "A");

        let decoded: ParkingEvent = serialized.decode().expect("decode");
        assert_eq!(decoded, event);
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if serialization fails
    fn snapshot_keys_by_zone() {
        let snapshot = OccupancySnapshot {
            zone_id: "C".to_string(),
            total_spaces: 30,
            occupied_spaces: 28,
        };
        let serialized = SerializedRecord::from_record(&snapshot).expect("serialize");
        assert_eq!(serialized.key, "C");
        assert_eq!(serialized.record_type, "OccupancySnapshot.v1");
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let serialized = SerializedRecord::new(
            "OccupancySnapshot.v1".to_string(),
            "A".to_string(),
            vec![0xff, 0x00, 0x01],
        );
        let result: Result<OccupancySnapshot, _> = serialized.decode();
        assert!(matches!(result, Err(RecordError::Deserialization(_))));
    }

    #[test]
    fn display_includes_type_and_key() {
        let serialized =
            SerializedRecord::new("ParkingEvent.v1".to_string(), "B".to_string(), vec![1, 2, 3]);
        let display = format!("{serialized}");
        assert!(display.contains("ParkingEvent.v1"));
        assert!(display.contains("key: B"));
        assert!(display.contains("3 bytes"));
    }
}
