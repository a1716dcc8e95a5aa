//! Per-device availability state machine.
//!
//! Classifies each device as online or offline from the staleness of its
//! last report, with the same baseline-on-first-sight rule as the proximity
//! tracker. A device with no usable report time is "no data": nothing is
//! asserted, nothing changes.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

use crate::types::{
    Availability, DeviceRecord, EventKind, NotificationEvent, epoch_to_utc, DEVICE_OFFLINE_SECS,
};

/// Keyed availability table, one entry per device ident.
#[derive(Debug)]
pub struct AvailabilityTracker {
    states: HashMap<String, Availability>,
    offline_after: TimeDelta,
}

impl Default for AvailabilityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::with_offline_after(TimeDelta::seconds(DEVICE_OFFLINE_SECS))
    }

    pub fn with_offline_after(offline_after: TimeDelta) -> Self {
        Self {
            states: HashMap::new(),
            offline_after,
        }
    }

    /// Evaluate one device record. Returns at most one transition event.
    ///
    /// Skipped entirely (no state asserted or changed): the daily-report
    /// pseudo-device, and any device whose `timestamp_raw` is missing or
    /// unparseable.
    pub fn observe(&mut self, device: &DeviceRecord, now: DateTime<Utc>) -> Option<NotificationEvent> {
        if device.is_daily_report() {
            return None;
        }
        let reported_at = device.timestamp_raw.and_then(epoch_to_utc)?;

        let age = now.signed_duration_since(reported_at);
        let now_state = if age > self.offline_after {
            Availability::Offline
        } else {
            Availability::Online
        };

        match self.states.insert(device.ident.clone(), now_state) {
            // First sight: silent baseline.
            None => None,
            Some(prior) if prior == now_state => None,
            Some(_) => {
                let kind = match now_state {
                    Availability::Online => EventKind::Online,
                    Availability::Offline => EventKind::Offline,
                };
                Some(NotificationEvent {
                    kind,
                    name: device.display_name().to_string(),
                    event_time: now,
                    distance: None,
                    beacon_id: None,
                    device_ident: Some(device.ident.clone()),
                    persist: true,
                })
            }
        }
    }

    pub fn get(&self, ident: &str) -> Option<Availability> {
        self.states.get(ident).copied()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

// ─── Tests ────────────────────────────────────────────────────────
