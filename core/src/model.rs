//! Domain model for the parking garage occupancy pipeline.
//!
//! The model splits into three groups:
//!
//! - **Topology**: [`Garage`] and [`Zone`] describe the physical garage.
//!   Immutable once the deployment is configured.
//! - **Write side**: [`ParkingEvent`] (one vehicle entry/exit occurrence) and
//!   [`OccupancySnapshot`] (the latest occupied/total count per zone). The
//!   snapshot log retains exactly one live snapshot per zone; the fold from
//!   events into snapshots lives on [`OccupancySnapshot::apply`].
//! - **Read side**: [`ZoneStatus`] (cached, query-optimized status with
//!   derived availability) and [`ZoneActivityEvent`] (a lossy projection of
//!   recent activity for display). Both are derived, disposable, and
//!   rebuildable (or, for activity, intentionally ephemeral).
//!
//! # Counting rules
//!
//! Occupancy is a running sum clamped at zero: an exit with no matching prior
//! entry is tolerated and leaves the count at zero. There is deliberately
//! **no clamp at `total_spaces`**: bursty entries without matching exits can
//! report more occupied spaces than exist, and [`ZoneStatus::available_spots`]
//! is signed so that state remains representable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical subdivision of the garage with a fixed total space count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Unique zone identifier; used as the partition key for all records
    /// concerning this zone.
    pub id: String,
    /// Display name of the zone.
    pub name: String,
    /// Total number of parking spaces in this zone.
    pub total_spaces: u32,
}

impl Zone {
    /// Create a new zone.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, total_spaces: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            total_spaces,
        }
    }

    /// The snapshot that introduces this zone to the snapshot log: empty,
    /// but carrying the zone's true `total_spaces`.
    ///
    /// Published once at deployment bootstrap so the aggregation join knows
    /// zone capacity before the first event arrives. Until such a seed (or a
    /// prior snapshot) exists, the join falls back to a zero-valued snapshot
    /// with `total_spaces = 0`.
    #[must_use]
    pub fn seed_snapshot(&self) -> OccupancySnapshot {
        OccupancySnapshot {
            zone_id: self.id.clone(),
            total_spaces: self.total_spaces,
            occupied_spaces: 0,
        }
    }
}

/// A parking garage: the authoritative topology of zones.
///
/// Fixed deployment configuration, not runtime state: occupancy lives in
/// the snapshot log, never here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Garage {
    /// Unique garage identifier.
    pub id: String,
    /// Display name of the garage.
    pub name: String,
    /// Total number of parking spaces across all zones.
    pub total_spaces: u32,
    /// The zones making up this garage.
    pub zones: Vec<Zone>,
}

impl Garage {
    /// Create a new garage from its zones.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, zones: Vec<Zone>) -> Self {
        let total_spaces = zones.iter().map(|z| z.total_spaces).sum();
        Self {
            id: id.into(),
            name: name.into(),
            total_spaces,
            zones,
        }
    }

    /// Look up a zone by id.
    #[must_use]
    pub fn zone(&self, zone_id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == zone_id)
    }

    /// Seed snapshots for every zone, for publishing at deployment bootstrap.
    ///
    /// See [`Zone::seed_snapshot`].
    #[must_use]
    pub fn seed_snapshots(&self) -> Vec<OccupancySnapshot> {
        self.zones.iter().map(Zone::seed_snapshot).collect()
    }
}

/// The kind of occurrence a [`ParkingEvent`] describes.
///
/// `Unrecognized` is a legitimate wire value (a producer ahead of this
/// consumer's schema), not an error: the join logs it and applies no state
/// change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A vehicle entered the zone (occupancy +1).
    Entered,
    /// A vehicle exited the zone (occupancy -1, clamped at 0).
    Exited,
    /// An event type this consumer does not understand (no state change).
    Unrecognized,
}

/// Reference to the vehicle involved in a parking event.
///
/// Carried opaquely through the pipeline; the occupancy fold never inspects
/// it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRef {
    /// Vehicle identifier.
    pub id: String,
    /// License plate as captured at the gate.
    pub license_plate: String,
    /// Registration state/region of the plate.
    pub state: String,
    /// Vehicle type (e.g. "car", "motorcycle").
    pub vehicle_type: String,
}

/// One vehicle entry/exit occurrence, as appended to the event stream.
///
/// Immutable and append-only. Events are partitioned by
/// [`zone_id`](ParkingEvent::zone_id), so ordering is guaranteed (and only
/// relied upon) within a single zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// The specific space involved, when the sensor reports one.
    pub space_id: String,
    /// The zone this event belongs to (partition key).
    pub zone_id: String,
    /// What happened.
    pub event_type: EventType,
    /// The vehicle involved.
    pub vehicle: VehicleRef,
    /// Event time in epoch milliseconds, stamped by the producer.
    pub timestamp: i64,
}

/// The latest known occupancy for a zone; one live record per zone on the
/// compacted snapshot log.
///
/// # Examples
///
/// ```
/// use parkstream_core::model::{EventType, OccupancySnapshot};
///
/// let snapshot = OccupancySnapshot {
///     zone_id: "A".to_string(),
///     total_spaces: 30,
///     occupied_spaces: 3,
/// };
///
/// let after_entry = snapshot.apply(EventType::Entered);
/// assert_eq!(after_entry.occupied_spaces, 4);
///
/// // Exits never take the count below zero.
/// let empty = OccupancySnapshot::zero("B");
/// assert_eq!(empty.apply(EventType::Exited).occupied_spaces, 0);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    /// The zone this snapshot describes (compaction key).
    pub zone_id: String,
    /// Total spaces in the zone; 0 until the topology or a prior snapshot
    /// supplies it, carried forward on every update thereafter.
    pub total_spaces: u32,
    /// Currently occupied spaces. Never negative; not clamped above.
    pub occupied_spaces: u32,
}

impl OccupancySnapshot {
    /// The zero-valued snapshot used when a zone has no prior state.
    #[must_use]
    pub fn zero(zone_id: impl Into<String>) -> Self {
        Self {
            zone_id: zone_id.into(),
            total_spaces: 0,
            occupied_spaces: 0,
        }
    }

    /// Fold one event into this snapshot, producing the updated snapshot.
    ///
    /// `total_spaces` is carried forward unchanged. `Unrecognized` is the
    /// identity; callers decide whether the unchanged snapshot is worth
    /// emitting (the aggregation join does not emit it).
    #[must_use]
    pub fn apply(&self, event_type: EventType) -> Self {
        let occupied_spaces = match event_type {
            EventType::Entered => self.occupied_spaces + 1,
            EventType::Exited => self.occupied_spaces.saturating_sub(1),
            EventType::Unrecognized => self.occupied_spaces,
        };
        Self {
            zone_id: self.zone_id.clone(),
            total_spaces: self.total_spaces,
            occupied_spaces,
        }
    }

    /// Available spaces derived from this snapshot.
    ///
    /// Signed: occupancy has no upper clamp, so availability can go negative
    /// under bursty entries.
    #[must_use]
    pub const fn available_spaces(&self) -> i64 {
        self.total_spaces as i64 - self.occupied_spaces as i64
    }
}

/// Cached, query-optimized status of a zone.
///
/// Derived from an [`OccupancySnapshot`] by the cache mirror. `last_updated`
/// is *processing* time (when the mirror applied the snapshot), not the
/// originating event's timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStatus {
    /// The zone this status describes.
    pub zone_id: String,
    /// Currently occupied spots.
    pub occupied_spots: u32,
    /// Derived availability (`total - occupied`); negative when occupancy
    /// exceeds capacity.
    pub available_spots: i64,
    /// When the cache entry was last overwritten (processing time).
    pub last_updated: DateTime<Utc>,
}

impl ZoneStatus {
    /// Derive a status from a snapshot, stamped with the given processing
    /// time.
    #[must_use]
    pub fn from_snapshot(snapshot: &OccupancySnapshot, now: DateTime<Utc>) -> Self {
        Self {
            zone_id: snapshot.zone_id.clone(),
            occupied_spots: snapshot.occupied_spaces,
            available_spots: snapshot.available_spaces(),
            last_updated: now,
        }
    }
}

/// Direction of a recent activity occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    /// A vehicle entered.
    Enter,
    /// A vehicle exited.
    Exit,
}

impl ActivityKind {
    /// Map an event type to an activity kind.
    ///
    /// Returns `None` for [`EventType::Unrecognized`]: unknown events never
    /// reach the activity display.
    #[must_use]
    pub const fn from_event_type(event_type: EventType) -> Option<Self> {
        match event_type {
            EventType::Entered => Some(Self::Enter),
            EventType::Exited => Some(Self::Exit),
            EventType::Unrecognized => None,
        }
    }
}

/// A lossy, bounded projection of a [`ParkingEvent`] kept only for the
/// recent-activity display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneActivityEvent {
    /// The zone where the activity occurred.
    pub zone_id: String,
    /// Entry or exit.
    pub kind: ActivityKind,
    /// When the aggregation join processed the event.
    pub timestamp: DateTime<Utc>,
}
