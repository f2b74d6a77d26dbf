//! kubesync public facade (in-process).
//!
//! A [`ConnectionView`] bundles everything one connection session needs: the
//! snapshot feed, the dialog controller, the retry dispatcher and an optional
//! navigation tree. Hosts call [`ConnectionView::render`] whenever they redraw
//! and get back a [`RenderTick`] with every derived view for that instant.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use kubesync_aggregate::{Badge, GroupSummary, NavNode, ProgressSummary};
pub use kubesync_core::{ConnectionSyncSnapshot, ResourceTypeKey, SyncConfig, SyncState};
pub use kubesync_dialog::{DialogDecision, ShowSyncView, SignalBus};
pub use kubesync_kubehub::{InformerControl, RetryDispatcher};
pub use kubesync_store::FeedHandle;

use kubesync_aggregate::{badge_map, summarize_groups};
use kubesync_dialog::SyncDialogController;

/// Everything a frontend draws for one connection at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderTick {
    pub connection_id: String,
    pub progress: ProgressSummary,
    pub groups: Vec<GroupSummary>,
    /// Nav-tree badges by node id; nodes without a badge are absent.
    pub badges: BTreeMap<String, Badge>,
    pub dialog_visible: bool,
}

/// One connection session.
pub struct ConnectionView {
    controller: SyncDialogController,
    feed: FeedHandle,
    epochs: watch::Receiver<u64>,
    seen_epoch: u64,
    signals: Option<broadcast::Receiver<ShowSyncView>>,
    dispatcher: RetryDispatcher,
    nav: Vec<NavNode>,
}

impl ConnectionView {
    pub fn new(connection_id: impl Into<String>, feed: FeedHandle, dispatcher: RetryDispatcher, dismiss_after: Duration) -> Self {
        let epochs = feed.subscribe();
        Self {
            controller: SyncDialogController::new(connection_id, dismiss_after),
            feed,
            epochs,
            seen_epoch: 0,
            signals: None,
            dispatcher,
            nav: Vec::new(),
        }
    }

    pub fn with_config(connection_id: impl Into<String>, feed: FeedHandle, dispatcher: RetryDispatcher, cfg: &SyncConfig) -> Self {
        Self::new(connection_id, feed, dispatcher, cfg.dismiss_after())
    }

    pub fn with_nav(mut self, roots: Vec<NavNode>) -> Self {
        self.nav = roots;
        self
    }

    /// Listen on an app-wide bus; pending signals are drained on each render.
    pub fn with_signals(mut self, bus: &SignalBus) -> Self {
        self.signals = Some(bus.subscribe());
        self
    }

    pub fn connection_id(&self) -> &str { self.controller.connection_id() }
    pub fn decision(&self) -> DialogDecision { self.controller.decision() }
    pub fn manually_opened(&self) -> bool { self.controller.manually_opened() }
    pub fn latest(&self) -> Option<std::sync::Arc<ConnectionSyncSnapshot>> { self.feed.latest() }

    /// Observe anything new, fire a due dismissal, then derive all views.
    pub fn render(&mut self, now: Instant) -> RenderTick {
        self.drain_signals();
        let epoch = *self.epochs.borrow_and_update();
        let snap = self.feed.latest();
        if epoch != self.seen_epoch {
            self.seen_epoch = epoch;
            if let Some(s) = snap.as_deref() {
                self.controller.observe(s, now);
            }
        }
        self.controller.poll(now);

        let snap = snap.as_deref();
        let badges = match snap {
            Some(s) if !self.nav.is_empty() => badge_map(&self.nav, s),
            _ => BTreeMap::new(),
        };
        RenderTick {
            connection_id: self.controller.connection_id().to_string(),
            progress: ProgressSummary::from_snapshot(snap),
            groups: summarize_groups(snap),
            badges,
            dialog_visible: self.controller.is_visible(),
        }
    }

    /// Handle a "show sync view" request. Returns false when it targets another connection.
    pub fn on_signal(&mut self, sig: &ShowSyncView) -> bool { self.controller.request_open(&sig.connection_id) }

    pub fn close_dialog(&mut self) { self.controller.close(); }

    /// Ask the backend to re-sync `key`. The displayed state only changes
    /// when a later snapshot says so.
    pub fn retry(&self, key: &ResourceTypeKey) -> JoinHandle<()> {
        self.dispatcher.retry(self.controller.connection_id(), key)
    }

    /// Re-target the view. Controller state resets and the first snapshot
    /// of the new feed is treated as a fresh arrival.
    pub fn switch_connection(&mut self, connection_id: &str, feed: FeedHandle) -> bool {
        if !self.controller.switch_connection(connection_id) {
            return false;
        }
        self.epochs = feed.subscribe();
        self.seen_epoch = 0;
        self.feed = feed;
        info!(connection = %connection_id, "view: connection switched");
        true
    }

    fn drain_signals(&mut self) {
        let Some(rx) = self.signals.as_mut() else { return };
        loop {
            match rx.try_recv() {
                Ok(sig) => {
                    self.controller.request_open(&sig.connection_id);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    debug!(skipped = n, "view: signal receiver lagged");
                }
                Err(_) => break,
            }
        }
    }
}
