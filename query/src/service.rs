//! Read-only query facade over the cache and the activity ring.

use crate::cache::ZoneStatusCache;
use parkstream_core::activity::ActivityLog;
use parkstream_core::model::{ZoneActivityEvent, ZoneStatus};
use std::sync::Arc;

/// Read-only facade consumed by the external HTTP layer.
///
/// Delegates to the [`ZoneStatusCache`] and the
/// [`ActivityLog`]; never mutates either, and never blocks on (or even
/// knows about) the aggregation path. A zone with no data yields `None`
/// immediately: "not yet available" is an answer, not an error.
#[derive(Clone)]
pub struct QueryService {
    cache: Arc<ZoneStatusCache>,
    activity: Arc<ActivityLog>,
}

impl QueryService {
    /// Create a query service over the given read models.
    #[must_use]
    pub const fn new(cache: Arc<ZoneStatusCache>, activity: Arc<ActivityLog>) -> Self {
        Self { cache, activity }
    }

    /// Current status of one zone, or `None` if the zone has never received
    /// an update.
    #[must_use]
    pub fn zone_status(&self, zone_id: &str) -> Option<ZoneStatus> {
        self.cache.get(zone_id)
    }

    /// Current status of every cached zone; empty on a system that has not
    /// processed any snapshots yet.
    #[must_use]
    pub fn all_zone_statuses(&self) -> Vec<ZoneStatus> {
        self.cache.all()
    }

    /// The most recent entry/exit occurrences (at most the ring's capacity,
    /// most recent last).
    #[must_use]
    pub fn recent_events(&self) -> Vec<ZoneActivityEvent> {
        self.activity.recent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parkstream_core::model::{ActivityKind, ZoneActivityEvent};

    #[test]
    fn empty_system_answers_with_empty_data() {
        let service = QueryService::new(
            Arc::new(ZoneStatusCache::new()),
            Arc::new(ActivityLog::new()),
        );

        assert!(service.zone_status("A").is_none());
        assert!(service.all_zone_statuses().is_empty());
        assert!(service.recent_events().is_empty());
    }

    #[test]
    fn delegates_to_cache_and_ring() {
        let cache = Arc::new(ZoneStatusCache::new());
        let activity = Arc::new(ActivityLog::new());
        let service = QueryService::new(Arc::clone(&cache), Arc::clone(&activity));

        cache.update(ZoneStatus {
            zone_id: "A".to_string(),
            occupied_spots: 4,
            available_spots: 26,
            last_updated: Utc::now(),
        });
        activity.record(ZoneActivityEvent {
            zone_id: "A".to_string(),
            kind: ActivityKind::Enter,
            timestamp: Utc::now(),
        });

        assert_eq!(
            service.zone_status("A").map(|s| s.available_spots),
            Some(26)
        );
        assert_eq!(service.all_zone_statuses().len(), 1);
        assert_eq!(service.recent_events().len(), 1);
    }
}
