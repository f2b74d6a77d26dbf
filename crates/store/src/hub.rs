use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kubesync_core::{ConnectionKey, ConnectionSyncSnapshot, SyncConfig};
use tokio::sync::mpsc;
use tracing::info;

use crate::{spawn_ingest, FeedHandle, StateUpdate};

/// Read model for "latest snapshot of this connection".
pub trait SnapshotSource: Send + Sync {
    /// `None` until the connection has produced its first snapshot.
    fn latest(&self, key: &ConnectionKey) -> Option<Arc<ConnectionSyncSnapshot>>;
}

struct Entry {
    tx: mpsc::Sender<StateUpdate>,
    feed: FeedHandle,
}

/// Per-connection feeds keyed by `(plugin_id, connection_id)`.
///
/// Connections never share state; each gets its own ingest loop.
pub struct SyncHub {
    cfg: SyncConfig,
    feeds: Mutex<HashMap<ConnectionKey, Entry>>,
}

impl SyncHub {
    pub fn new(cfg: SyncConfig) -> Self { Self { cfg, feeds: Mutex::new(HashMap::new()) } }

    /// Ingest sender and read handle for a connection, spawning its loop on first use.
    pub fn open(&self, key: &ConnectionKey) -> (mpsc::Sender<StateUpdate>, FeedHandle) {
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(e) = feeds.get(key) {
            if !e.tx.is_closed() {
                return (e.tx.clone(), e.feed.clone());
            }
        }
        info!(connection = %key, "hub: starting connection feed");
        let (tx, feed) = spawn_ingest(&self.cfg);
        feeds.insert(key.clone(), Entry { tx: tx.clone(), feed: feed.clone() });
        (tx, feed)
    }

    pub fn feed(&self, key: &ConnectionKey) -> Option<FeedHandle> {
        self.feeds.lock().unwrap_or_else(|e| e.into_inner()).get(key).map(|e| e.feed.clone())
    }

    /// Forget a connection; its ingest loop drains and stops once other senders drop.
    pub fn close(&self, key: &ConnectionKey) -> bool {
        let removed = self.feeds.lock().unwrap_or_else(|e| e.into_inner()).remove(key).is_some();
        if removed { info!(connection = %key, "hub: connection feed closed"); }
        removed
    }

    pub fn connections(&self) -> Vec<ConnectionKey> {
        let mut out: Vec<ConnectionKey> = self.feeds.lock().unwrap_or_else(|e| e.into_inner()).keys().cloned().collect();
        out.sort();
        out
    }
}

impl SnapshotSource for SyncHub {
    fn latest(&self, key: &ConnectionKey) -> Option<Arc<ConnectionSyncSnapshot>> {
        self.feed(key).and_then(|f| f.latest())
    }
}

/// Fixed snapshots, for tests and offline tooling.
#[derive(Default)]
pub struct StaticSource {
    snaps: HashMap<ConnectionKey, Arc<ConnectionSyncSnapshot>>,
}

impl StaticSource {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, key: ConnectionKey, snap: ConnectionSyncSnapshot) -> Self {
        self.snaps.insert(key, Arc::new(snap));
        self
    }
}

impl SnapshotSource for StaticSource {
    fn latest(&self, key: &ConnectionKey) -> Option<Arc<ConnectionSyncSnapshot>> { self.snaps.get(key).cloned() }
}
