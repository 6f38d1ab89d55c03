//! Integration tests for the cache mirror, run against the in-memory
//! durable log.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Panics: test failures

use parkstream_core::environment::Clock;
use parkstream_core::health::Health;
use parkstream_core::log::DurableLog;
use parkstream_core::model::OccupancySnapshot;
use parkstream_core::record::SerializedRecord;
use parkstream_query::{CacheMirror, MirrorError, ZoneStatusCache};
use parkstream_testing::MemoryLog;
use parkstream_testing::mocks::test_clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const SNAPSHOT_TOPIC: &str = "zone-occupancy";

struct Mirrored {
    cache: Arc<ZoneStatusCache>,
    shutdown: watch::Sender<bool>,
    health: watch::Receiver<Health>,
    handle: JoinHandle<Result<(), MirrorError>>,
}

fn spawn_mirror(log: &MemoryLog) -> Mirrored {
    let cache = Arc::new(ZoneStatusCache::new());
    let (mut mirror, shutdown) = CacheMirror::new(
        Arc::new(log.clone()),
        SNAPSHOT_TOPIC,
        Arc::clone(&cache),
        Arc::new(test_clock()),
    );
    let health = mirror.health();
    let handle = tokio::spawn(async move { mirror.run().await });

    Mirrored {
        cache,
        shutdown,
        health,
        handle,
    }
}

async fn publish_snapshot(log: &MemoryLog, zone: &str, total: u32, occupied: u32) {
    let snapshot = OccupancySnapshot {
        zone_id: zone.to_string(),
        total_spaces: total,
        occupied_spaces: occupied,
    };
    log.publish(
        SNAPSHOT_TOPIC,
        &SerializedRecord::from_record(&snapshot).expect("encode"),
    )
    .await
    .expect("publish");
}

async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn snapshot_round_trips_into_availability() {
    let log = MemoryLog::new();
    let mirrored = spawn_mirror(&log);

    publish_snapshot(&log, "A", 30, 4).await;

    wait_until(|| mirrored.cache.get("A").is_some()).await;

    let status = mirrored.cache.get("A").expect("status");
    assert_eq!(status.occupied_spots, 4);
    assert_eq!(status.available_spots, 26);
    // Stamped with processing time from the injected clock, not event time.
    assert_eq!(status.last_updated, test_clock().now());
}

#[tokio::test]
async fn later_snapshots_overwrite_earlier_ones() {
    let log = MemoryLog::new();
    let mirrored = spawn_mirror(&log);

    publish_snapshot(&log, "A", 30, 3).await;
    publish_snapshot(&log, "A", 30, 4).await;

    wait_until(|| mirrored.cache.get("A").map(|s| s.occupied_spots) == Some(4)).await;
    assert_eq!(mirrored.cache.len(), 1);
}

#[tokio::test]
async fn overfull_zone_reports_negative_availability() {
    let log = MemoryLog::new();
    let mirrored = spawn_mirror(&log);

    // Occupancy has no upper clamp; availability goes negative.
    publish_snapshot(&log, "B", 40, 41).await;

    wait_until(|| mirrored.cache.get("B").is_some()).await;
    let status = mirrored.cache.get("B").expect("status");
    assert_eq!(status.available_spots, -1);
}

#[tokio::test]
async fn restart_rebuilds_the_cache_from_the_log() {
    let log = MemoryLog::new();
    publish_snapshot(&log, "A", 30, 4).await;
    publish_snapshot(&log, "B", 40, 12).await;

    // First mirror sees the history.
    let first = spawn_mirror(&log);
    wait_until(|| first.cache.len() == 2).await;
    first.shutdown.send(true).expect("shutdown");
    first.handle.await.expect("join").expect("run");

    // A "restarted" mirror starts with an empty cache and repopulates it by
    // replaying the snapshot log from the beginning.
    let second = spawn_mirror(&log);
    wait_until(|| second.cache.len() == 2).await;
    assert_eq!(second.cache.get("A").map(|s| s.occupied_spots), Some(4));
    assert_eq!(second.cache.get("B").map(|s| s.occupied_spots), Some(12));
}

#[tokio::test]
async fn fresh_mirror_serves_empty_not_errors() {
    let log = MemoryLog::new();
    let mirrored = spawn_mirror(&log);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(mirrored.cache.all().is_empty());
    assert!(mirrored.cache.get("A").is_none());
}

#[tokio::test]
async fn losing_the_subscription_flips_health() {
    let log = MemoryLog::new();
    let mut mirrored = spawn_mirror(&log);
    assert_eq!(*mirrored.health.borrow(), Health::Healthy);

    tokio::time::sleep(Duration::from_millis(50)).await;
    log.clear();

    let result = mirrored.handle.await.expect("join");
    assert!(matches!(result, Err(MirrorError::StreamTerminated)));

    mirrored.health.changed().await.expect("health change");
    assert_eq!(*mirrored.health.borrow(), Health::Unhealthy);
}
