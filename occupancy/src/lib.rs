//! # Parkstream Occupancy
//!
//! The aggregation join: the stateful processor that turns the raw
//! entry/exit event stream into durable per-zone occupancy snapshots.
//!
//! For each event arriving on the event stream, the
//! [`OccupancyAggregator`]:
//!
//! 1. looks up the zone's current snapshot in its materialized
//!    [`OccupancyView`] (zero-valued if the zone has never been seen);
//! 2. folds the event in (+1 entered, -1 exited clamped at zero);
//! 3. publishes the updated snapshot back onto the compacted snapshot log,
//!    keyed by zone;
//! 4. notifies the activity ring.
//!
//! # One-directional triggering
//!
//! The aggregator reads *and* writes the snapshot log, which makes the loop
//! self-referential. Snapshot-log arrivals, including the echo of the
//! aggregator's own writes, are **table-side only**: they update the view
//! and never produce output. Only event-stream arrivals drive aggregation.
//! Because each computed snapshot is also applied to the view synchronously
//! before the next event is taken, consecutive events for a zone never read
//! stale state, and the echoed record is an idempotent overwrite.
//!
//! # Recovery
//!
//! On startup the aggregator replays the snapshot log (its subscription is
//! expected to start from earliest) until the stream goes idle, restoring
//! the last materialized snapshot per zone before any event is consumed.
//! Delivery from the underlying log is at-least-once: a crash between
//! snapshot publish and event-offset commit re-applies the in-flight event
//! on restart. Tightening that to exactly-once would require transactional
//! produce-and-commit from the log and is out of scope.

mod aggregator;
mod view;

pub use aggregator::{AggregationError, OccupancyAggregator};
pub use view::OccupancyView;
