//! Notification dispatcher: local history, unread badge, durable forwarding.

use proxmap_core::history::NotificationLog;
use proxmap_core::types::NotificationEvent;

use crate::sink::EventSink;

/// Fans one detected event out to its consumers: the in-memory history
/// (with unread counting), the terminal line renderer, and, for
/// persist-flagged events, the durable sink.
///
/// Sink writes are fire-and-forget: a failure is logged and the event stays
/// in local history; nothing retries and nothing blocks the poll cycle.
pub struct Dispatcher {
    log: NotificationLog,
    sink: Option<EventSink>,
}

impl Dispatcher {
    pub fn new(sink: Option<EventSink>) -> Self {
        Self {
            log: NotificationLog::new(),
            sink,
        }
    }

    pub fn dispatch(&mut self, event: NotificationEvent) {
        println!("{}", format_event(&event));

        if event.persist {
            if let Some(sink) = &self.sink {
                let sink = sink.clone();
                let payload = event.clone();
                tokio::spawn(async move {
                    if let Err(err) = sink.post_event(&payload).await {
                        tracing::warn!("event sink write failed: {err}");
                    }
                });
            }
        }

        self.log.push(event);
    }

    pub fn log(&self) -> &NotificationLog {
        &self.log
    }

    pub fn mark_viewed(&mut self) {
        self.log.mark_viewed();
    }

    pub fn clear_history(&mut self) {
        self.log.clear();
    }
}

/// One terminal line per event: time, kind, subject, optional distance and
/// correlation key.
pub fn format_event(event: &NotificationEvent) -> String {
    let mut line = format!(
        "{}  {:<9} {}",
        event.event_time.format("%H:%M:%S"),
        event.kind,
        event.name
    );
    if let Some(distance) = event.distance {
        line.push_str(&format!("  {distance:.1}m"));
    }
    if let (Some(device), Some(beacon)) = (&event.device_ident, &event.beacon_id) {
        line.push_str(&format!("  [{device}/{beacon}]"));
    } else if let Some(device) = &event.device_ident {
        line.push_str(&format!("  [{device}]"));
    }
    line
}

// ─── Tests ────────────────────────────────────────────────────────
