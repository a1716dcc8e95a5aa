use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

// ─── Constants ────────────────────────────────────────────────────

/// Distance at or below which a beacon counts as in range (meters).
pub const RANGE_THRESHOLD_METERS: f64 = 3.0;

/// A device whose last report is older than this is offline (seconds).
pub const DEVICE_OFFLINE_SECS: i64 = 1200;

/// Minimum spacing between "still in/out" status pings (seconds).
pub const STILL_INTERVAL_SECS: i64 = 600;

/// A beacon unseen for longer than this is forced out of range (seconds).
pub const BEACON_TTL_SECS: i64 = 900;

/// Pseudo-device ident used by the telemetry service as a side channel.
/// Not a trackable device; excluded from aggregation and both state machines.
pub const DAILY_REPORT_IDENT: &str = "DAILY_REPORT";

// ─── Wire Types ───────────────────────────────────────────────────

/// One snapshot of the tracked world, as served by the telemetry feed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    /// Durable rename table: beacon id → display name.
    #[serde(default)]
    pub beacon_names: HashMap<String, String>,
}

/// A tracked GPS-reporting device and the beacons it currently observes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceRecord {
    pub ident: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Display timestamp string; informational only.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Last-report time in epoch seconds. The feed emits this as a number,
    /// a numeric string, or not at all; junk parses to `None`.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub timestamp_raw: Option<f64>,
    #[serde(default)]
    pub beacons: Vec<BeaconRecord>,
}

impl DeviceRecord {
    /// True for the daily-report side-channel payload.
    pub fn is_daily_report(&self) -> bool {
        self.ident == DAILY_REPORT_IDENT
    }

    /// Display name falling back to the stable ident.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => &self.ident,
        }
    }
}

/// One beacon observation inside a device record. Ephemeral: rebuilt from
/// every snapshot, never persisted as an entity.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BeaconRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Estimated distance in meters; `None` means unknown/stale.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub distance: Option<f64>,
    #[serde(default)]
    pub last_seen: Option<String>,
    /// Last-seen time in epoch seconds, same lenient parse as `timestamp_raw`.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub last_seen_raw: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rssi: Option<f64>,
}

/// Accept a JSON number, a numeric string, or anything else (→ `None`).
/// A malformed field must degrade to "absent", never abort the cycle.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_f64))
}

fn coerce_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Convert lenient epoch seconds into a UTC timestamp.
pub fn epoch_to_utc(epoch_secs: f64) -> Option<DateTime<Utc>> {
    if !epoch_secs.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp(epoch_secs as i64, 0)
}

// ─── Tracking Key ─────────────────────────────────────────────────

/// Composite identity of one proximity relationship. Two beacons with the
/// same id under different devices are distinct tracked entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackKey {
    pub device_ident: String,
    pub beacon_id: String,
}

impl TrackKey {
    pub fn new(device_ident: impl Into<String>, beacon_id: impl Into<String>) -> Self {
        Self {
            device_ident: device_ident.into(),
            beacon_id: beacon_id.into(),
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_ident, self.beacon_id)
    }
}

// ─── Observation ──────────────────────────────────────────────────

/// Flattened beacon observation with the owning device carried forward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedBeacon {
    pub beacon_id: String,
    /// Resolved display name: rename table → snapshot name → raw id.
    pub name: String,
    pub device_ident: String,
    pub device_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub color: Option<String>,
    pub distance: Option<f64>,
    pub last_seen: Option<DateTime<Utc>>,
    pub rssi: Option<f64>,
}

impl ObservedBeacon {
    pub fn track_key(&self) -> TrackKey {
        TrackKey::new(self.device_ident.clone(), self.beacon_id.clone())
    }
}

// ─── Proximity & Availability ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proximity {
    In,
    Out,
}

impl Proximity {
    /// Classify a distance reading. The 3 m boundary is inclusive on the
    /// "in" side; a missing reading is treated as far out of range.
    pub fn classify(distance: Option<f64>) -> Self {
        match distance {
            Some(d) if d <= RANGE_THRESHOLD_METERS => Self::In,
            _ => Self::Out,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for Proximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Online,
    Offline,
}

impl Availability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Notification Events ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    In,
    Left,
    Online,
    Offline,
    StillIn,
    StillOut,
}

impl EventKind {
    /// Transition events are durably persisted; status pings stay local.
    pub fn is_transition(self) -> bool {
        matches!(self, Self::In | Self::Left | Self::Online | Self::Offline)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Left => "left",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::StillIn => "still_in",
            Self::StillOut => "still_out",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrete lifecycle event derived from the polled world state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Display name of the subject (beacon or device).
    pub name: String,
    pub event_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beacon_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_ident: Option<String>,
    /// True if this event must be forwarded to the durable sink.
    #[serde(skip)]
    pub persist: bool,
}

// ─── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// An observation whose tracking key cannot be formed must be rejected,
    /// never silently merged into another key.
    #[error("invalid tracking key: device={device_ident:?} beacon={beacon_id:?}")]
    InvalidTrackKey {
        device_ident: String,
        beacon_id: String,
    },
}

// ─── Tests ────────────────────────────────────────────────────────
