//! In-memory zone status cache.

use parkstream_core::model::ZoneStatus;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// The `zone → status` map serving low-latency reads.
///
/// Purely a read accelerator: the snapshot log remains the source of truth,
/// and this map can be dropped and rebuilt from it at any time. Created
/// empty at startup and owned by the process; there is deliberately no
/// global/static instance.
///
/// One writer (the [`CacheMirror`](crate::CacheMirror)) overwrites entries;
/// arbitrary concurrent readers take the read lock. Reads return owned
/// copies, so no lock is held while a caller inspects a status.
#[derive(Debug, Default)]
pub struct ZoneStatusCache {
    statuses: RwLock<HashMap<String, ZoneStatus>>,
}

impl ZoneStatusCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the cached status for a zone.
    pub fn update(&self, status: ZoneStatus) {
        // Poison only means a panicking writer; the map stays structurally
        // valid, so recover and keep serving.
        let mut statuses = self
            .statuses
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        statuses.insert(status.zone_id.clone(), status);
    }

    /// The cached status for a zone, or `None` if the zone has never
    /// received an update. Never computes from scratch, never blocks on the
    /// aggregation path.
    #[must_use]
    pub fn get(&self, zone_id: &str) -> Option<ZoneStatus> {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(zone_id)
            .cloned()
    }

    /// A copy of all currently cached statuses. Empty means "no data yet",
    /// which is a valid answer on a freshly started system.
    #[must_use]
    pub fn all(&self) -> Vec<ZoneStatus> {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Number of zones currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no zone has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
