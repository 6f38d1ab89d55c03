//! End-to-end pipeline tests: events flow through the aggregation join,
//! onto the snapshot log, through the cache mirror, and out via the query
//! facade, all over the in-memory durable log.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Panics: test failures

use parkstream_core::log::DurableLog;
use parkstream_core::model::{EventType, OccupancySnapshot};
use parkstream_core::record::SerializedRecord;
use parkstream_service::{RunningPipeline, ServiceConfig, default_garage, seed_topology, spawn_pipeline};
use parkstream_testing::MemoryLog;
use parkstream_testing::events::parking_event;
use parkstream_testing::mocks::test_clock;
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> ServiceConfig {
    ServiceConfig {
        brokers: "unused".to_string(),
        event_topic: "parking-events".to_string(),
        snapshot_topic: "zone-occupancy".to_string(),
        aggregator_group: "occupancy-aggregator".to_string(),
        mirror_group: "zone-status-mirror".to_string(),
        bootstrap_idle: Duration::from_millis(50),
    }
}

fn spawn(log: &MemoryLog, config: &ServiceConfig) -> RunningPipeline {
    // The in-memory log replays on every subscription, so one shared handle
    // covers all three roles.
    spawn_pipeline(
        Arc::new(log.clone()),
        Arc::new(log.clone()),
        Arc::new(log.clone()),
        config,
        Arc::new(test_clock()),
    )
}

async fn send_event(log: &MemoryLog, config: &ServiceConfig, zone: &str, event_type: EventType) {
    let event = parking_event(zone, event_type);
    log.publish(
        &config.event_topic,
        &SerializedRecord::from_record(&event).expect("encode event"),
    )
    .await
    .expect("publish event");
}

async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..300 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 3s");
}

#[tokio::test]
async fn entry_event_reaches_the_query_facade() {
    let log = MemoryLog::new();
    let config = test_config();

    // Topology seeded, zone A already holding three vehicles.
    seed_topology(&log, &config.snapshot_topic, &default_garage())
        .await
        .expect("seed");
    let prior = OccupancySnapshot {
        zone_id: "A".to_string(),
        total_spaces: 30,
        occupied_spaces: 3,
    };
    log.publish(
        &config.snapshot_topic,
        &SerializedRecord::from_record(&prior).expect("encode"),
    )
    .await
    .expect("publish prior");

    let pipeline = spawn(&log, &config);

    send_event(&log, &config, "A", EventType::Entered).await;

    wait_until(|| {
        pipeline
            .query
            .zone_status("A")
            .map(|s| s.occupied_spots)
            == Some(4)
    })
    .await;

    let status = pipeline.query.zone_status("A").expect("status");
    assert_eq!(status.occupied_spots, 4);
    assert_eq!(status.available_spots, 26);

    pipeline.shutdown();
}

#[tokio::test]
async fn exit_on_unknown_zone_surfaces_as_zero_not_negative() {
    let log = MemoryLog::new();
    let config = test_config();
    let pipeline = spawn(&log, &config);

    // Zone D is not part of the seeded topology and has no prior snapshot.
    send_event(&log, &config, "D", EventType::Exited).await;

    wait_until(|| pipeline.query.zone_status("D").is_some()).await;

    let status = pipeline.query.zone_status("D").expect("status");
    assert_eq!(status.occupied_spots, 0);
    assert_eq!(status.available_spots, 0);

    pipeline.shutdown();
}

#[tokio::test]
async fn sixty_events_leave_exactly_fifty_in_the_activity_ring() {
    let log = MemoryLog::new();
    let config = test_config();
    seed_topology(&log, &config.snapshot_topic, &default_garage())
        .await
        .expect("seed");

    let pipeline = spawn(&log, &config);

    // 60 entries round-robin across the three zones.
    let zones = ["A", "B", "C"];
    for i in 0..60 {
        send_event(&log, &config, zones[i % 3], EventType::Entered).await;
    }

    // All 60 folded (20 vehicles per zone) and all 60 recorded in the
    // ring: once the oldest survivor is event 10, the 60th has landed.
    wait_until(|| {
        let folded: u32 = pipeline
            .query
            .all_zone_statuses()
            .iter()
            .map(|s| s.occupied_spots)
            .sum();
        let recent = pipeline.query.recent_events();
        folded == 60 && recent.first().map(|e| e.zone_id.as_str()) == Some("B")
    })
    .await;

    // The ring kept only the most recent 50; the 10 oldest were evicted.
    let recent = pipeline.query.recent_events();
    assert_eq!(recent.len(), 50);
    // Event 10 (the oldest survivor) went to zone B in the round-robin.
    assert_eq!(recent[0].zone_id, "B");
    assert_eq!(recent[49].zone_id, zones[59 % 3]);

    // And the statuses agree with the fold.
    let mut statuses = pipeline.query.all_zone_statuses();
    statuses.sort_by(|a, b| a.zone_id.cmp(&b.zone_id));
    assert_eq!(statuses.len(), 3);
    assert_eq!(statuses[0].occupied_spots, 20); // A: 30 total
    assert_eq!(statuses[0].available_spots, 10);
    assert_eq!(statuses[1].occupied_spots, 20); // B: 40 total
    assert_eq!(statuses[1].available_spots, 20);
    assert_eq!(statuses[2].occupied_spots, 20); // C: 30 total
    assert_eq!(statuses[2].available_spots, 10);

    pipeline.shutdown();
}

#[tokio::test]
async fn fresh_system_answers_queries_with_empty_data() {
    let log = MemoryLog::new();
    let config = test_config();
    let pipeline = spawn(&log, &config);

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(pipeline.query.all_zone_statuses().is_empty());
    assert!(pipeline.query.zone_status("A").is_none());
    assert!(pipeline.query.recent_events().is_empty());

    pipeline.shutdown();
}
