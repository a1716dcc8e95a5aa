//! Snapshot flattening: device records → one observation per (device, beacon).

use crate::types::{ObservedBeacon, Snapshot, epoch_to_utc};

/// Flatten a snapshot into observed beacons, carrying each owning device's
/// identity, name, position and color onto the observation.
///
/// Pure transform. Output order is device order then beacon order, so
/// repeated calls on the same snapshot compare equal.
///
/// Skipped entirely:
/// - the `DAILY_REPORT` pseudo-device (side-channel payload);
/// - beacons with a missing or empty id (no tracking key can be formed).
pub fn flatten_snapshot(snapshot: &Snapshot) -> Vec<ObservedBeacon> {
    let mut observations = Vec::new();

    for device in &snapshot.devices {
        if device.is_daily_report() {
            continue;
        }

        for beacon in &device.beacons {
            let beacon_id = match beacon.id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => continue,
            };

            let name = resolve_name(snapshot, &beacon_id, beacon.name.as_deref());

            observations.push(ObservedBeacon {
                beacon_id,
                name,
                device_ident: device.ident.clone(),
                device_name: device.display_name().to_string(),
                lat: device.lat,
                lon: device.lon,
                color: device.color.clone(),
                distance: beacon.distance,
                last_seen: beacon.last_seen_raw.and_then(epoch_to_utc),
                rssi: beacon.rssi,
            });
        }
    }

    observations
}

/// Display name priority: rename table → per-snapshot name → raw id.
fn resolve_name(snapshot: &Snapshot, beacon_id: &str, snapshot_name: Option<&str>) -> String {
    if let Some(renamed) = snapshot.beacon_names.get(beacon_id) {
        if !renamed.is_empty() {
            return renamed.clone();
        }
    }
    match snapshot_name {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => beacon_id.to_string(),
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BeaconRecord, DeviceRecord, DAILY_REPORT_IDENT};
    use std::collections::HashMap;

    fn beacon(id: &str, distance: Option<f64>) -> BeaconRecord {
        BeaconRecord {
            id: Some(id.to_string()),
            distance,
            ..BeaconRecord::default()
        }
    }

    fn device(ident: &str, beacons: Vec<BeaconRecord>) -> DeviceRecord {
        DeviceRecord {
            ident: ident.to_string(),
            beacons,
            ..DeviceRecord::default()
        }
    }

    #[test]
    fn flattens_one_observation_per_pair() {
        let snap = Snapshot {
            devices: vec![
                device("d1", vec![beacon("b1", Some(1.0)), beacon("b2", Some(5.0))]),
                device("d2", vec![beacon("b1", Some(2.0))]),
            ],
            beacon_names: HashMap::new(),
        };

        let obs = flatten_snapshot(&snap);
        assert_eq!(obs.len(), 3);
        // Same beacon id under two devices stays two distinct observations.
        assert_eq!(obs[0].track_key().to_string(), "d1/b1");
        assert_eq!(obs[2].track_key().to_string(), "d2/b1");
    }

    #[test]
    fn excludes_daily_report_pseudo_device() {
        let snap = Snapshot {
            devices: vec![
                device(DAILY_REPORT_IDENT, vec![beacon("b1", Some(1.0))]),
                device("d1", vec![beacon("b2", Some(1.0))]),
            ],
            beacon_names: HashMap::new(),
        };

        let obs = flatten_snapshot(&snap);
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].device_ident, "d1");
    }

    #[test]
    fn skips_beacons_without_id() {
        let snap = Snapshot {
            devices: vec![device(
                "d1",
                vec![
                    BeaconRecord::default(),
                    BeaconRecord {
                        id: Some(String::new()),
                        ..BeaconRecord::default()
                    },
                    beacon("b1", None),
                ],
            )],
            beacon_names: HashMap::new(),
        };

        let obs = flatten_snapshot(&snap);
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].beacon_id, "b1");
    }

    #[test]
    fn resolved_name_takes_priority() {
        let mut names = HashMap::new();
        names.insert("b1".to_string(), "Kitchen Tag".to_string());

        let snap = Snapshot {
            devices: vec![device(
                "d1",
                vec![
                    BeaconRecord {
                        id: Some("b1".to_string()),
                        name: Some("raw-name".to_string()),
                        ..BeaconRecord::default()
                    },
                    BeaconRecord {
                        id: Some("b2".to_string()),
                        name: Some("Garage Tag".to_string()),
                        ..BeaconRecord::default()
                    },
                    beacon("b3", None),
                ],
            )],
            beacon_names: names,
        };

        let obs = flatten_snapshot(&snap);
        assert_eq!(obs[0].name, "Kitchen Tag"); // rename table wins
        assert_eq!(obs[1].name, "Garage Tag"); // snapshot name
        assert_eq!(obs[2].name, "b3"); // raw id fallback
    }

    #[test]
    fn carries_device_attributes_forward() {
        let snap = Snapshot {
            devices: vec![DeviceRecord {
                ident: "d1".to_string(),
                name: Some("Truck 7".to_string()),
                color: Some("#3b82f6".to_string()),
                lat: Some(-13.83),
                lon: Some(-171.76),
                beacons: vec![beacon("b1", Some(2.0))],
                ..DeviceRecord::default()
            }],
            beacon_names: HashMap::new(),
        };

        let obs = flatten_snapshot(&snap);
        assert_eq!(obs[0].device_name, "Truck 7");
        assert_eq!(obs[0].color.as_deref(), Some("#3b82f6"));
        assert_eq!(obs[0].lat, Some(-13.83));
        assert_eq!(obs[0].lon, Some(-171.76));
    }

    #[test]
    fn deterministic_order_across_calls() {
        let snap = Snapshot {
            devices: vec![
                device("d1", vec![beacon("b1", None), beacon("b2", None)]),
                device("d2", vec![beacon("b3", None)]),
            ],
            beacon_names: HashMap::new(),
        };

        assert_eq!(flatten_snapshot(&snap), flatten_snapshot(&snap));
    }
}
