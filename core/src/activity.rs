//! Bounded, thread-safe buffer of recent entry/exit activity.
//!
//! The activity log is a fixed-capacity ring: the aggregation join pushes a
//! [`ZoneActivityEvent`] for every processed event, and once the ring is
//! full the oldest entry is evicted. It backs the recent-activity display
//! and nothing else: content is intentionally lost on restart and is never
//! rebuilt from the durable logs.

use crate::model::ZoneActivityEvent;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Default number of activity entries retained.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 50;

/// Fixed-capacity, thread-safe ring of the most recent activity events.
///
/// Safe for a concurrent writer (the aggregation join) and concurrent
/// readers (the query path): writes push-and-evict under one lock, and reads
/// copy the current contents out so callers never observe a
/// partially-mutated buffer.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use parkstream_core::activity::ActivityLog;
/// use parkstream_core::model::{ActivityKind, ZoneActivityEvent};
///
/// let log = ActivityLog::with_capacity(2);
/// for zone in ["A", "B", "C"] {
///     log.record(ZoneActivityEvent {
///         zone_id: zone.to_string(),
///         kind: ActivityKind::Enter,
///         timestamp: Utc::now(),
///     });
/// }
///
/// // Capacity 2: the "A" entry has been evicted, most recent last.
/// let recent = log.recent();
/// assert_eq!(recent.len(), 2);
/// assert_eq!(recent[0].zone_id, "B");
/// assert_eq!(recent[1].zone_id, "C");
/// ```
#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<ZoneActivityEvent>>,
    capacity: usize,
}

impl ActivityLog {
    /// Create an activity log with the default capacity of
    /// [`DEFAULT_ACTIVITY_CAPACITY`] entries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ACTIVITY_CAPACITY)
    }

    /// Create an activity log bounded at `capacity` entries.
    ///
    /// A capacity of 0 retains nothing; every record is dropped on arrival.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an activity event, evicting the oldest entry if the ring is
    /// full. O(1) amortized.
    pub fn record(&self, event: ZoneActivityEvent) {
        // A poisoned lock only means another writer panicked mid-push; the
        // deque itself is still structurally valid, so recover and continue.
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(event);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Snapshot the current contents, oldest first / most recent last.
    ///
    /// Returns an owned copy; concurrent writes after the snapshot are not
    /// reflected.
    #[must_use]
    pub fn recent(&self) -> Vec<ZoneActivityEvent> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the ring currently holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured maximum number of retained entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}
