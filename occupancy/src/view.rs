//! Materialized view of the snapshot log: latest snapshot per zone.

use parkstream_core::model::OccupancySnapshot;
use std::collections::HashMap;

/// In-memory reconstruction of the latest [`OccupancySnapshot`] per zone,
/// used for point lookups during the join.
///
/// Owned exclusively by one [`OccupancyAggregator`](crate::OccupancyAggregator);
/// partition ownership guarantees a single writer per zone, so no internal
/// locking is needed.
#[derive(Debug, Default)]
pub struct OccupancyView {
    snapshots: HashMap<String, OccupancySnapshot>,
}

impl OccupancyView {
    /// Create an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest snapshot for a zone, if any has been materialized.
    #[must_use]
    pub fn get(&self, zone_id: &str) -> Option<&OccupancySnapshot> {
        self.snapshots.get(zone_id)
    }

    /// The latest snapshot for a zone, or the zero-valued snapshot if the
    /// zone has never been seen (the join's left-join default).
    #[must_use]
    pub fn snapshot_or_zero(&self, zone_id: &str) -> OccupancySnapshot {
        self.snapshots
            .get(zone_id)
            .cloned()
            .unwrap_or_else(|| OccupancySnapshot::zero(zone_id))
    }

    /// Materialize a snapshot, replacing any previous one for the zone.
    pub fn insert(&mut self, snapshot: OccupancySnapshot) {
        self.snapshots.insert(snapshot.zone_id.clone(), snapshot);
    }

    /// Number of zones with a materialized snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no zone has been materialized yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_zone_defaults_to_zero() {
        let view = OccupancyView::new();
        assert!(view.get("A").is_none());

        let zero = view.snapshot_or_zero("A");
        assert_eq!(zero.zone_id, "A");
        assert_eq!(zero.total_spaces, 0);
        assert_eq!(zero.occupied_spaces, 0);
    }

    #[test]
    fn insert_replaces_previous_snapshot() {
        let mut view = OccupancyView::new();
        view.insert(OccupancySnapshot {
            zone_id: "A".to_string(),
            total_spaces: 30,
            occupied_spaces: 3,
        });
        view.insert(OccupancySnapshot {
            zone_id: "A".to_string(),
            total_spaces: 30,
            occupied_spaces: 4,
        });

        assert_eq!(view.len(), 1);
        assert_eq!(view.get("A").map(|s| s.occupied_spaces), Some(4));
    }
}
