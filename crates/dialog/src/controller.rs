use std::time::{Duration, Instant};

use kubesync_core::ConnectionSyncSnapshot;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One-shot visibility decision for a connection session.
///
/// `Undecided` renders like `Closed` but keeps the first-snapshot decision pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogDecision {
    Undecided,
    Open,
    Closed,
}

/// Sync dialog state for one connection.
///
/// - first snapshot: open if not fully synced, closed otherwise (once per session)
/// - open, not manually opened, fully synced: close after `dismiss_after`
/// - manual open: sticky until an explicit close
#[derive(Debug, Clone)]
pub struct SyncDialogController {
    connection_id: String,
    decision: DialogDecision,
    manually_opened: bool,
    seen_snapshot: bool,
    dismiss_at: Option<Instant>,
    dismiss_after: Duration,
}

impl SyncDialogController {
    pub fn new(connection_id: impl Into<String>, dismiss_after: Duration) -> Self {
        Self {
            connection_id: connection_id.into(),
            decision: DialogDecision::Undecided,
            manually_opened: false,
            seen_snapshot: false,
            dismiss_at: None,
            dismiss_after,
        }
    }

    pub fn connection_id(&self) -> &str { &self.connection_id }
    pub fn decision(&self) -> DialogDecision { self.decision }
    pub fn manually_opened(&self) -> bool { self.manually_opened }
    pub fn pending_dismissal(&self) -> Option<Instant> { self.dismiss_at }
    pub fn dismiss_after(&self) -> Duration { self.dismiss_after }

    /// Nothing is shown before the first snapshot, whatever the decision.
    pub fn is_visible(&self) -> bool { self.seen_snapshot && self.decision == DialogDecision::Open }

    /// Point the controller at another connection. All state resets; a
    /// pending dismissal is dropped. Returns false if the id is unchanged.
    pub fn switch_connection(&mut self, connection_id: &str) -> bool {
        if connection_id == self.connection_id { return false; }
        info!(from = %self.connection_id, to = %connection_id, "dialog: connection switched");
        *self = Self::new(connection_id, self.dismiss_after);
        true
    }

    /// Feed a new snapshot. Any pending dismissal is cancelled before the new
    /// state is evaluated, so a still-synced connection restarts the delay.
    pub fn observe(&mut self, snap: &ConnectionSyncSnapshot, now: Instant) {
        self.seen_snapshot = true;
        if self.decision == DialogDecision::Undecided {
            if snap.fully_synced {
                self.decision = DialogDecision::Closed;
                debug!(connection = %self.connection_id, "dialog: first snapshot already synced");
            } else {
                self.decision = DialogDecision::Open;
                counter!("kubesync_dialog_auto_open_total", 1u64);
                info!(connection = %self.connection_id, progress = snap.progress, "dialog: auto-open on first snapshot");
            }
        }
        self.rearm(snap.fully_synced, now);
    }

    fn rearm(&mut self, fully_synced: bool, now: Instant) {
        let stale = self.dismiss_at.take();
        let armed = self.decision == DialogDecision::Open && !self.manually_opened && fully_synced;
        if !armed {
            if stale.is_some() {
                debug!(connection = %self.connection_id, "dialog: dismissal cancelled");
            }
            return;
        }
        self.dismiss_at = Some(now + self.dismiss_after);
        debug!(
            connection = %self.connection_id,
            after_ms = self.dismiss_after.as_millis() as u64,
            restarted = stale.is_some(),
            "dialog: dismissal scheduled"
        );
    }

    /// Fire the dismissal timer if it has elapsed. Returns true when the dialog closed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.dismiss_at {
            Some(at) if now >= at => {
                self.dismiss_at = None;
                self.decision = DialogDecision::Closed;
                counter!("kubesync_dialog_auto_close_total", 1u64);
                info!(connection = %self.connection_id, "dialog: auto-closed after sync");
                true
            }
            _ => false,
        }
    }

    /// "Show sync view" for `connection_id`. Signals for other connections
    /// are ignored (returns false).
    pub fn request_open(&mut self, connection_id: &str) -> bool {
        if connection_id != self.connection_id { return false; }
        self.manually_opened = true;
        self.decision = DialogDecision::Open;
        self.dismiss_at = None;
        info!(connection = %self.connection_id, "dialog: opened on request");
        true
    }

    /// Explicit close by the user.
    pub fn close(&mut self) {
        self.manually_opened = false;
        self.decision = DialogDecision::Closed;
        self.dismiss_at = None;
        debug!(connection = %self.connection_id, "dialog: closed by user");
    }
}
