//! Per-beacon proximity state machine.
//!
//! Converts periodically refreshed distance readings into one-shot
//! `in`/`left` transition events:
//!
//! - **Baseline on first sight**: the first observation of a tracking key in
//!   a session records state without emitting, so a restart never
//!   manufactures a spurious transition.
//! - **One event per flip**: a state change between consecutive cycles emits
//!   exactly one event; a steady state emits nothing.
//! - **Heartbeat bookkeeping only**: when a state has been held past the
//!   still interval, the last-status timestamp is refreshed so the external
//!   periodic evaluator does not double-ping; emission stays out of here.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

use crate::types::{
    CoreError, EventKind, NotificationEvent, ObservedBeacon, Proximity, TrackKey,
    STILL_INTERVAL_SECS,
};

/// Recorded proximity state for one tracking key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProximityState {
    pub state: Proximity,
    /// When the last transition event was emitted or the last heartbeat
    /// window elapsed, whichever came later.
    pub last_status_at: DateTime<Utc>,
}

/// Keyed proximity table. One instance owns all per-key state for a session;
/// inject it into the poll cycle instead of sharing process-wide maps.
#[derive(Debug)]
pub struct ProximityTracker {
    states: HashMap<TrackKey, ProximityState>,
    still_interval: TimeDelta,
}

impl Default for ProximityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProximityTracker {
    pub fn new() -> Self {
        Self::with_still_interval(TimeDelta::seconds(STILL_INTERVAL_SECS))
    }

    pub fn with_still_interval(still_interval: TimeDelta) -> Self {
        Self {
            states: HashMap::new(),
            still_interval,
        }
    }

    /// Evaluate one observation against the stored state for its key.
    ///
    /// Returns at most one transition event. Errors only on an observation
    /// whose tracking key cannot be formed; such input is rejected rather
    /// than merged into another key.
    pub fn observe(
        &mut self,
        obs: &ObservedBeacon,
        now: DateTime<Utc>,
    ) -> Result<Option<NotificationEvent>, CoreError> {
        if obs.beacon_id.is_empty() || obs.device_ident.is_empty() {
            return Err(CoreError::InvalidTrackKey {
                device_ident: obs.device_ident.clone(),
                beacon_id: obs.beacon_id.clone(),
            });
        }

        let key = obs.track_key();
        let now_state = Proximity::classify(obs.distance);

        let Some(prior) = self.states.get_mut(&key) else {
            // First sight in this session: baseline silently.
            self.states.insert(
                key,
                ProximityState {
                    state: now_state,
                    last_status_at: now,
                },
            );
            return Ok(None);
        };

        if prior.state != now_state {
            prior.state = now_state;
            prior.last_status_at = now;
            return Ok(Some(transition_event(obs, now_state, now)));
        }

        // Steady state. Refresh the heartbeat timestamp once the still
        // interval has elapsed; the ping itself is the evaluator's job.
        if now.signed_duration_since(prior.last_status_at) >= self.still_interval {
            prior.last_status_at = now;
        }

        Ok(None)
    }

    pub fn get(&self, key: &TrackKey) -> Option<&ProximityState> {
        self.states.get(key)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

fn transition_event(
    obs: &ObservedBeacon,
    now_state: Proximity,
    now: DateTime<Utc>,
) -> NotificationEvent {
    let kind = match now_state {
        Proximity::In => EventKind::In,
        Proximity::Out => EventKind::Left,
    };
    NotificationEvent {
        kind,
        name: obs.name.clone(),
        event_time: obs.last_seen.unwrap_or(now),
        distance: obs.distance,
        beacon_id: Some(obs.beacon_id.clone()),
        device_ident: Some(obs.device_ident.clone()),
        persist: true,
    }
}

// ─── Tests ────────────────────────────────────────────────────────
