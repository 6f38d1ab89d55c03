//! # Parkstream Query
//!
//! The read side of the pipeline: everything needed to answer zone-status
//! queries without touching the aggregation path.
//!
//! - [`ZoneStatusCache`]: the in-memory `zone → status` map, owned by the
//!   process and populated only by the mirror;
//! - [`CacheMirror`]: an independent consumer of the snapshot log that
//!   overwrites cache entries as snapshots arrive;
//! - [`QueryService`]: the read-only facade consumed by an external HTTP
//!   layer.
//!
//! The mirror communicates with the write side exclusively through the
//! durable snapshot log, never via in-process calls, so a crash or lag on
//! either side cannot corrupt the other. The cache is rebuilt on restart by
//! replaying the compacted snapshot log from the beginning; until the
//! replay catches up, queries simply see fewer zones (an empty result is
//! valid data, not an error).

mod cache;
mod mirror;
mod service;

pub use cache::ZoneStatusCache;
pub use mirror::{CacheMirror, MirrorError};
pub use service::QueryService;
