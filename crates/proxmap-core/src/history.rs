//! In-memory notification history with an unread counter.
//!
//! Append-only, chronological. Viewing zeroes the unread counter but keeps
//! entries; clearing empties the list and the counter. Neither touches the
//! durable sink's copy — that is the dispatcher's concern.

use crate::types::NotificationEvent;

#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Vec<NotificationEvent>,
    unread: usize,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and count it as unread.
    pub fn push(&mut self, event: NotificationEvent) {
        self.entries.push(event);
        self.unread += 1;
    }

    /// All events, oldest first.
    pub fn events(&self) -> &[NotificationEvent] {
        &self.entries
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    /// Mark the history as viewed: unread drops to zero, entries stay.
    pub fn mark_viewed(&mut self) {
        self.unread = 0;
    }

    /// Drop all entries and reset the unread counter.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.unread = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Tests ────────────────────────────────────────────────────────
