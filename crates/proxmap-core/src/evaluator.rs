//! Periodic status evaluator: "still in/out" pings and TTL-forced exits.
//!
//! The poll-cycle state machines emit transitions only. This component owns
//! the slower cadence work, run on its own timer (default every 60 s):
//!
//! - a beacon unseen past its TTL while judged in range is forced `left`;
//! - a state held past the still interval earns one `still_in`/`still_out`
//!   ping, deduped by the last-ping timestamp;
//! - beacons of offline devices get no pings (noise suppression).
//!
//! Safe to run repeatedly: every emission is deduped through the store, so
//! back-to-back passes produce nothing new.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

use crate::types::{
    EventKind, NotificationEvent, Proximity, TrackKey, BEACON_TTL_SECS, DEVICE_OFFLINE_SECS,
    STILL_INTERVAL_SECS,
};

#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    pub offline_after: TimeDelta,
    pub still_interval: TimeDelta,
    pub beacon_ttl: TimeDelta,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            offline_after: TimeDelta::seconds(DEVICE_OFFLINE_SECS),
            still_interval: TimeDelta::seconds(STILL_INTERVAL_SECS),
            beacon_ttl: TimeDelta::seconds(BEACON_TTL_SECS),
        }
    }
}

#[derive(Debug, Clone)]
struct BeaconRow {
    state: Proximity,
    name: String,
    last_change: DateTime<Utc>,
    last_still: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    active: bool,
}

#[derive(Debug, Clone, Copy)]
struct DeviceRow {
    online: bool,
    last_seen: DateTime<Utc>,
}

/// Keyed state the evaluator sweeps over. Fed by the dispatcher (transition
/// events) and by every poll cycle (seen/online bookkeeping).
#[derive(Debug, Default)]
pub struct EvaluatorStore {
    beacons: HashMap<TrackKey, BeaconRow>,
    devices: HashMap<String, DeviceRow>,
    config: EvaluatorConfig,
}

impl EvaluatorStore {
    pub fn new() -> Self {
        Self::with_config(EvaluatorConfig::default())
    }

    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self {
            beacons: HashMap::new(),
            devices: HashMap::new(),
            config,
        }
    }

    /// Record an `in`/`left` transition for a key. Resets the hold timer and
    /// clears the still-ping dedup mark.
    pub fn record_transition(
        &mut self,
        key: &TrackKey,
        name: &str,
        state: Proximity,
        now: DateTime<Utc>,
    ) {
        let row = self.beacons.entry(key.clone()).or_insert(BeaconRow {
            state,
            name: name.to_string(),
            last_change: now,
            last_still: None,
            last_seen: None,
            active: true,
        });
        row.state = state;
        row.name = name.to_string();
        row.last_change = now;
        row.last_still = None;
        row.active = true;
    }

    /// Record that a beacon appeared in the current snapshot.
    pub fn record_beacon_seen(&mut self, key: &TrackKey, name: &str, now: DateTime<Utc>) {
        if let Some(row) = self.beacons.get_mut(key) {
            row.last_seen = Some(now);
            row.name = name.to_string();
            row.active = true;
        }
    }

    /// Record a device's availability as judged by the poll cycle.
    pub fn record_device(&mut self, ident: &str, online: bool, now: DateTime<Utc>) {
        self.devices.insert(
            ident.to_string(),
            DeviceRow {
                online,
                last_seen: now,
            },
        );
    }

    /// One evaluator pass. Idempotent within the configured intervals.
    pub fn run_pass(&mut self, now: DateTime<Utc>) -> Vec<NotificationEvent> {
        let mut events = Vec::new();

        // Devices unseen past the offline window: mark offline in the store
        // and deactivate their beacons. Offline events themselves come from
        // the availability tracker; emitting here would double-announce.
        let mut went_offline = Vec::new();
        for (ident, row) in &mut self.devices {
            if row.online && now.signed_duration_since(row.last_seen) > self.config.offline_after {
                row.online = false;
                went_offline.push(ident.clone());
            }
        }
        for ident in &went_offline {
            for (key, row) in &mut self.beacons {
                if &key.device_ident == ident {
                    row.active = false;
                }
            }
        }

        for (key, row) in &mut self.beacons {
            if !row.active {
                continue;
            }
            // No pings for beacons of offline devices.
            if let Some(device) = self.devices.get(&key.device_ident) {
                if !device.online {
                    continue;
                }
            }

            // TTL: unseen too long while in range forces a left transition.
            if let Some(last_seen) = row.last_seen {
                if now.signed_duration_since(last_seen) > self.config.beacon_ttl {
                    if row.state != Proximity::Out {
                        row.state = Proximity::Out;
                        row.last_change = now;
                        row.last_still = None;
                        events.push(NotificationEvent {
                            kind: EventKind::Left,
                            name: row.name.clone(),
                            event_time: last_seen,
                            distance: None,
                            beacon_id: Some(key.beacon_id.clone()),
                            device_ident: Some(key.device_ident.clone()),
                            persist: true,
                        });
                    }
                    continue;
                }
            }

            // Still ping: state held for a full interval, and at least one
            // interval since the previous ping.
            if now.signed_duration_since(row.last_change) < self.config.still_interval {
                continue;
            }
            if let Some(last_still) = row.last_still {
                if now.signed_duration_since(last_still) < self.config.still_interval {
                    continue;
                }
            }

            row.last_still = Some(now);
            let kind = match row.state {
                Proximity::In => EventKind::StillIn,
                Proximity::Out => EventKind::StillOut,
            };
            events.push(NotificationEvent {
                kind,
                name: row.name.clone(),
                event_time: now,
                distance: None,
                beacon_id: Some(key.beacon_id.clone()),
                device_ident: Some(key.device_ident.clone()),
                persist: false,
            });
        }

        events
    }

    pub fn contains(&self, key: &TrackKey) -> bool {
        self.beacons.contains_key(key)
    }

    pub fn beacon_count(&self) -> usize {
        self.beacons.len()
    }
}

// ─── Tests ────────────────────────────────────────────────────────
