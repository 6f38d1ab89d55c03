//! # Parkstream Core
//!
//! Core types and abstractions for the parkstream occupancy pipeline.
//!
//! This crate provides the pieces every other crate in the workspace builds
//! on:
//!
//! - **Data model** ([`model`]): zones, parking events, occupancy snapshots,
//!   and the derived read-side types.
//! - **Wire records** ([`record`]): versioned binary encoding of events and
//!   snapshots, keyed by zone for partition-ordered delivery.
//! - **Durable log** ([`log`]): the publish/subscribe abstraction over a
//!   durable, partitioned, key-ordered append log (Redpanda/Kafka in
//!   production, in-memory in tests).
//! - **Activity ring** ([`activity`]): the bounded, thread-safe buffer of
//!   recent entry/exit occurrences backing the activity display.
//! - **Environment** ([`environment`]): injected dependencies, currently the
//!   [`Clock`](environment::Clock) used for processing-time stamps.
//!
//! ## Data flow
//!
//! ```text
//! ┌──────────────┐    ParkingEvent     ┌──────────────────┐
//! │ Event Stream │────────────────────▶│ Aggregation Join │
//! └──────────────┘  (keyed by zone)    └────────┬─────────┘
//!                                               │ OccupancySnapshot
//!                                               ▼
//!                                      ┌──────────────────┐
//!                                      │   Snapshot Log   │ (compacted)
//!                                      └────────┬─────────┘
//!                                               │
//!                                               ▼
//!                                      ┌──────────────────┐
//!                                      │   Cache Mirror   │──▶ queries
//!                                      └──────────────────┘
//! ```
//!
//! The snapshot log is the single source of truth for occupancy. Everything
//! downstream of it is a disposable read model.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod activity;
pub mod log;
pub mod model;
pub mod record;

/// Component health reporting.
///
/// The aggregation join and the cache mirror stop making progress and flip
/// to [`Health::Unhealthy`] when their log subscription is lost, rather
/// than silently serving stale data as current. Recovery is by restart
/// (reconnect and replay from the last committed position).
pub mod health {
    /// Liveness of a long-running pipeline component.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Health {
        /// Consuming its subscription and making progress.
        Healthy,
        /// Subscription lost or terminated; data served downstream of this
        /// component must be considered stale.
        Unhealthy,
    }
}

/// Environment traits - injected dependencies for testability.
///
/// External effects are abstracted behind traits so components can run
/// against deterministic implementations in tests.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability.
    ///
    /// Read-side types are stamped with *processing* time (the moment a
    /// record is applied), not the event's original timestamp. Injecting the
    /// clock keeps those stamps deterministic under test.
    ///
    /// # Examples
    ///
    /// ```
    /// use parkstream_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let now = clock.now();
    /// assert!(now.timestamp() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time.
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
