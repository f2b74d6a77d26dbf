use std::time::Duration;

use kubesync_store::FeedHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::controller::{DialogDecision, SyncDialogController};
use crate::signals::ShowSyncView;

/// What the driver last published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogStatus {
    pub decision: DialogDecision,
    pub manually_opened: bool,
    pub visible: bool,
}

impl DialogStatus {
    fn of(c: &SyncDialogController) -> Self {
        Self { decision: c.decision(), manually_opened: c.manually_opened(), visible: c.is_visible() }
    }
}

enum Command {
    Close,
}

/// Handle to a running dialog driver. Dropping it stops the task and with
/// it any pending dismissal.
pub struct DialogHandle {
    status_rx: watch::Receiver<DialogStatus>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl DialogHandle {
    pub fn status(&self) -> DialogStatus { *self.status_rx.borrow() }
    pub fn is_visible(&self) -> bool { self.status().visible }
    pub fn subscribe(&self) -> watch::Receiver<DialogStatus> { self.status_rx.clone() }

    /// Explicit user close.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close);
    }

    pub fn shutdown(mut self) {
        if let Some(t) = self.task.take() { t.abort(); }
    }
}

impl Drop for DialogHandle {
    fn drop(&mut self) {
        if let Some(t) = self.task.take() { t.abort(); }
    }
}

fn now() -> std::time::Instant { Instant::now().into_std() }

/// Run `controller` against a connection feed and the app-wide signal bus.
///
/// The task wakes on new snapshot epochs, show/close requests and the
/// controller's dismissal deadline; it publishes a [`DialogStatus`] after each.
pub fn spawn_dialog_driver(
    mut controller: SyncDialogController,
    feed: FeedHandle,
    mut signals: broadcast::Receiver<ShowSyncView>,
) -> DialogHandle {
    let (status_tx, status_rx) = watch::channel(DialogStatus::of(&controller));
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let mut epochs = feed.subscribe();

    let task = tokio::spawn(async move {
        let connection = controller.connection_id().to_string();
        info!(connection = %connection, "dialog: driver started");
        // a snapshot may already be there when the view mounts
        if *epochs.borrow_and_update() > 0 {
            if let Some(snap) = feed.latest() {
                controller.observe(&snap, now());
            }
        }
        status_tx.send_replace(DialogStatus::of(&controller));

        let mut feed_open = true;
        let mut signals_open = true;
        loop {
            let deadline = controller.pending_dismissal();
            let sleep_at = deadline
                .map(Instant::from_std)
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
            tokio::select! {
                changed = epochs.changed(), if feed_open => {
                    match changed {
                        Ok(()) => {
                            if let Some(snap) = feed.latest() {
                                controller.observe(&snap, now());
                            }
                        }
                        Err(_) => {
                            debug!(connection = %connection, "dialog: feed closed");
                            feed_open = false;
                        }
                    }
                }
                sig = signals.recv(), if signals_open => {
                    match sig {
                        Ok(s) => { controller.request_open(&s.connection_id); }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!(connection = %connection, skipped = n, "dialog: signal receiver lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => { signals_open = false; }
                    }
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Close) => controller.close(),
                        None => break,
                    }
                }
                _ = tokio::time::sleep_until(sleep_at), if deadline.is_some() => {
                    controller.poll(now());
                }
            }
            status_tx.send_if_modified(|cur| {
                let next = DialogStatus::of(&controller);
                if *cur == next { return false; }
                *cur = next;
                true
            });
        }
        info!(connection = %connection, "dialog: driver stopped");
    });

    DialogHandle { status_rx, cmd_tx, task: Some(task) }
}
