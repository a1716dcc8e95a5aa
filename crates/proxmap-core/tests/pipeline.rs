//! End-to-end detection pipeline: snapshot JSON → aggregation → state
//! machines → notification log.

use chrono::{DateTime, TimeDelta, Utc};

use proxmap_core::aggregate::flatten_snapshot;
use proxmap_core::availability::AvailabilityTracker;
use proxmap_core::history::NotificationLog;
use proxmap_core::proximity::ProximityTracker;
use proxmap_core::types::{EventKind, NotificationEvent, Proximity, Snapshot, TrackKey};

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC3339")
        .with_timezone(&Utc)
}

fn snapshot(device_ts: i64, beacon_distance: f64) -> Snapshot {
    let doc = format!(
        r#"{{
            "devices": [
                {{
                    "ident": "dev-1",
                    "name": "Truck 7",
                    "lat": -13.83,
                    "lon": -171.76,
                    "timestamp_raw": {device_ts},
                    "beacons": [
                        {{"id": "beacon-x", "distance": {beacon_distance}, "last_seen_raw": {device_ts}}}
                    ]
                }},
                {{
                    "ident": "DAILY_REPORT",
                    "beacons": [{{"id": "ignored", "distance": 0.1}}]
                }}
            ],
            "beacon_names": {{"beacon-x": "Pallet Tag"}}
        }}"#
    );
    serde_json::from_str(&doc).expect("parse snapshot")
}

/// Run one full poll cycle and collect emitted events.
fn run_cycle(
    snap: &Snapshot,
    proximity: &mut ProximityTracker,
    availability: &mut AvailabilityTracker,
    log: &mut NotificationLog,
    now: DateTime<Utc>,
) -> Vec<NotificationEvent> {
    let mut emitted = Vec::new();

    for device in &snap.devices {
        if let Some(ev) = availability.observe(device, now) {
            emitted.push(ev);
        }
    }
    for obs in flatten_snapshot(snap) {
        if let Some(ev) = proximity.observe(&obs, now).expect("valid observation") {
            emitted.push(ev);
        }
    }
    for ev in &emitted {
        log.push(ev.clone());
    }
    emitted
}

#[test]
fn in_out_lifecycle_emits_single_left() {
    let mut proximity = ProximityTracker::new();
    let mut availability = AvailabilityTracker::new();
    let mut log = NotificationLog::new();

    // Snapshot A: beacon at 2 m, first sight → no event, state in.
    let t_a = ts("2026-03-01T08:00:00Z");
    let snap_a = snapshot(t_a.timestamp(), 2.0);
    let events = run_cycle(&snap_a, &mut proximity, &mut availability, &mut log, t_a);
    assert!(events.is_empty(), "first sight must be silent");
    let key = TrackKey::new("dev-1", "beacon-x");
    assert_eq!(proximity.get(&key).expect("tracked").state, Proximity::In);

    // Snapshot B: beacon at 6 m → exactly one left event.
    let t_b = t_a + TimeDelta::seconds(4);
    let snap_b = snapshot(t_b.timestamp(), 6.0);
    let events = run_cycle(&snap_b, &mut proximity, &mut availability, &mut log, t_b);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Left);
    assert_eq!(events[0].name, "Pallet Tag");
    assert_eq!(proximity.get(&key).expect("tracked").state, Proximity::Out);

    // Snapshot C: still 6 m, 11 minutes later → no event from the core,
    // but the heartbeat timestamp is refreshed.
    let t_c = t_b + TimeDelta::minutes(11);
    let snap_c = snapshot(t_c.timestamp(), 6.0);
    let events = run_cycle(&snap_c, &mut proximity, &mut availability, &mut log, t_c);
    assert!(events.is_empty(), "heartbeat emission is external");
    assert_eq!(proximity.get(&key).expect("tracked").last_status_at, t_c);

    // The log holds exactly the one transition.
    assert_eq!(log.len(), 1);
    assert_eq!(log.unread(), 1);
}

#[test]
fn device_goes_offline_once() {
    let mut proximity = ProximityTracker::new();
    let mut availability = AvailabilityTracker::new();
    let mut log = NotificationLog::new();

    let t0 = ts("2026-03-01T08:00:00Z");
    // Baseline: fresh report → online, silent.
    run_cycle(&snapshot(t0.timestamp(), 2.0), &mut proximity, &mut availability, &mut log, t0);

    // Report is now 1300 s old: one offline event, nothing for the beacon
    // (its classification has not changed).
    let t1 = t0 + TimeDelta::seconds(1300);
    let stale = snapshot(t0.timestamp(), 2.0);
    let events = run_cycle(&stale, &mut proximity, &mut availability, &mut log, t1);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Offline);
    assert_eq!(events[0].device_ident.as_deref(), Some("dev-1"));

    // Remains offline on following cycles: zero further events.
    let t2 = t1 + TimeDelta::seconds(4);
    let events = run_cycle(&stale, &mut proximity, &mut availability, &mut log, t2);
    assert!(events.is_empty());
}

#[test]
fn unparseable_report_time_changes_nothing() {
    let mut availability = AvailabilityTracker::new();

    let doc = r#"{
        "devices": [{"ident": "dev-1", "timestamp_raw": "not-a-number", "beacons": []}]
    }"#;
    let snap: Snapshot = serde_json::from_str(doc).expect("parse snapshot");

    let now = ts("2026-03-01T08:00:00Z");
    for device in &snap.devices {
        assert!(availability.observe(device, now).is_none());
    }
    assert!(availability.is_empty());
}

#[test]
fn daily_report_feeds_neither_machine() {
    let snap = snapshot(1_700_000_000, 2.0);

    let obs = flatten_snapshot(&snap);
    assert_eq!(obs.len(), 1, "daily report beacons are excluded");

    let mut availability = AvailabilityTracker::new();
    let now = ts("2026-03-01T08:00:00Z");
    for device in &snap.devices {
        availability.observe(device, now);
    }
    assert_eq!(availability.len(), 1, "daily report device is not tracked");
}

#[test]
fn clearing_history_is_local_only() {
    let mut log = NotificationLog::new();
    log.push(NotificationEvent {
        kind: EventKind::In,
        name: "Pallet Tag".to_string(),
        event_time: ts("2026-03-01T08:00:00Z"),
        distance: Some(1.2),
        beacon_id: Some("beacon-x".to_string()),
        device_ident: Some("dev-1".to_string()),
        persist: true,
    });
    assert_eq!(log.unread(), 1);

    log.clear();
    assert!(log.is_empty());
    assert_eq!(log.unread(), 0);
    // Nothing here reaches out to the durable sink; the persist flag was
    // consumed by the dispatcher at emission time.
}
