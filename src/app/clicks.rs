//! Single-click vs double-click disambiguation for server rows
//!
//! A click arms a pending expand for its row. A second click on the same
//! row before [`CLICK_WINDOW`] runs out turns into an activation and the
//! expand never fires. Otherwise the expand fires when the window closes,
//! or early if another row is clicked first.

use crate::constants::CLICK_WINDOW;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickEvent {
    Expand(String),
    Activate(String),
}

#[derive(Debug, Clone)]
struct PendingClick {
    guid: String,
    at: Instant,
}

#[derive(Debug, Default)]
pub struct ClickTracker {
    pending: Option<PendingClick>,
}

impl ClickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a click. Returns the events it resolves, in order.
    pub fn click(&mut self, guid: &str, now: Instant) -> Vec<ClickEvent> {
        let mut events = Vec::new();

        if let Some(pending) = self.pending.take() {
            let elapsed = now.saturating_duration_since(pending.at);
            if pending.guid == guid && elapsed < CLICK_WINDOW {
                events.push(ClickEvent::Activate(pending.guid));
                return events;
            }
            events.push(ClickEvent::Expand(pending.guid));
        }

        self.pending = Some(PendingClick { guid: guid.to_string(), at: now });
        events
    }

    /// When the pending expand is due, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.at + CLICK_WINDOW)
    }

    /// Fire the pending expand once its window has closed.
    pub fn poll(&mut self, now: Instant) -> Option<ClickEvent> {
        let due = self.deadline().is_some_and(|deadline| now >= deadline);
        if !due {
            return None;
        }
        self.pending.take().map(|p| ClickEvent::Expand(p.guid))
    }

    /// Drop any pending expand without firing it
    pub fn reset(&mut self) {
        self.pending = None;
    }
}
