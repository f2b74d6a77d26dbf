use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// App-wide request to show the sync view for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSyncView {
    pub connection_id: String,
}

/// Broadcast bus for [`ShowSyncView`]; every connection's driver listens and
/// ignores ids that are not its own.
#[derive(Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<ShowSyncView>,
}

impl SignalBus {
    pub fn new(cap: usize) -> Self {
        let (tx, _) = broadcast::channel(cap.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShowSyncView> { self.tx.subscribe() }

    /// Returns how many listeners received the signal.
    pub fn show(&self, connection_id: impl Into<String>) -> usize {
        let sig = ShowSyncView { connection_id: connection_id.into() };
        match self.tx.send(sig) {
            Ok(n) => n,
            Err(e) => {
                debug!(connection = %e.0.connection_id, "signals: no listeners for show request");
                0
            }
        }
    }
}

impl Default for SignalBus {
    fn default() -> Self { Self::new(64) }
}
