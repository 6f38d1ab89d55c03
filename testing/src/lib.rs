//! # Parkstream Testing
//!
//! Testing utilities for the parkstream pipeline:
//!
//! - [`MemoryLog`]: a fully in-memory [`DurableLog`](parkstream_core::log::DurableLog)
//!   so the aggregation join and cache mirror run deterministically without
//!   a broker;
//! - [`mocks::FixedClock`] / [`mocks::test_clock`]: deterministic time for
//!   processing-time stamps;
//! - [`events`]: builders for well-formed parking events.
//!
//! ## Example
//!
//! ```
//! use parkstream_core::log::DurableLog;
//! use parkstream_core::record::SerializedRecord;
//! use parkstream_testing::MemoryLog;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let log = MemoryLog::new();
//! log.publish(
//!     "parking-events",
//!     &SerializedRecord::new("ParkingEvent.v1".into(), "A".into(), vec![1]),
//! )
//! .await?;
//!
//! // Subscriptions replay retained records, then tail live publishes.
//! let mut stream = log.subscribe(&["parking-events"]).await?;
//! let first = stream.next().await.transpose()?;
//! assert_eq!(first.map(|r| r.key), Some("A".to_string()));
//! # Ok(())
//! # }
//! ```

mod memory_log;

pub use memory_log::MemoryLog;

/// Deterministic mock implementations of environment traits.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use parkstream_core::environment::Clock;

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making processing-time stamps
    /// reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use parkstream_testing::mocks::FixedClock;
    /// use parkstream_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a fixed clock pinned at the given time.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC).
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot
    /// happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Builders for well-formed test events.
pub mod events {
    use parkstream_core::model::{EventType, ParkingEvent, VehicleRef};
    use uuid::Uuid;

    /// Build a parking event for the given zone and event type, with a
    /// fresh event id and placeholder vehicle data.
    #[must_use]
    pub fn parking_event(zone_id: &str, event_type: EventType) -> ParkingEvent {
        ParkingEvent {
            event_id: Uuid::new_v4(),
            space_id: format!("{zone_id}-1"),
            zone_id: zone_id.to_string(),
            event_type,
            vehicle: VehicleRef {
                id: "veh-test".to_string(),
                license_plate: "TEST-001".to_string(),
                state: "CA".to_string(),
                vehicle_type: "car".to_string(),
            },
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Install a compact tracing subscriber for a test, if none is installed
/// yet.
///
/// Safe to call from every test; only the first call in a process wins.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
