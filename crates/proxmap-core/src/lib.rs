//! proxmap-core: event-detection engine for beacon proximity tracking.
//!
//! Turns periodically refreshed telemetry snapshots into discrete,
//! de-duplicated lifecycle events: a beacon entering or leaving range, a
//! device going offline or back online, and periodic still-in-state pings.
//! Pure logic only, no IO and no async; the client crate owns polling,
//! dispatch and persistence.

pub mod aggregate;
pub mod availability;
pub mod evaluator;
pub mod history;
pub mod proximity;
pub mod types;
