//! kubesync store: in-process snapshot feed.
//!
//! State updates from the sync engine are coalesced per resource type, folded
//! into a builder on a short ticker, and published as immutable snapshots
//! readers can load without locking.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use kubesync_core::{ConnectionSyncSnapshot, EmptySnapshotPolicy, FullSyncPolicy, ResourceTypeKey, SyncConfig, SyncState};
use metrics::{counter, gauge};
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

mod hub;

pub use hub::{SnapshotSource, StaticSource, SyncHub};


/// One state transition reported for a resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub key: ResourceTypeKey,
    pub state: SyncState,
    /// Item count; only meaningful alongside `Synced`.
    pub count: Option<u64>,
}

impl StateUpdate {
    pub fn new(key: impl Into<ResourceTypeKey>, state: SyncState) -> Self {
        Self { key: key.into(), state, count: None }
    }

    pub fn synced(key: impl Into<ResourceTypeKey>, count: u64) -> Self {
        Self { key: key.into(), state: SyncState::Synced, count: Some(count) }
    }
}

/// Coalescing queue keyed by resource type in first-seen order.
///
/// Never drops a key: the key space is the set of resource types, and a lost
/// transition would leave a type missing from every later snapshot. `cap` is
/// a flush threshold, not a limit.
pub struct Coalescer {
    map: FxHashMap<ResourceTypeKey, StateUpdate>,
    order: VecDeque<ResourceTypeKey>,
    cap: usize,
}

impl Coalescer {
    pub fn with_capacity(cap: usize) -> Self {
        Self { map: FxHashMap::default(), order: VecDeque::new(), cap: cap.max(1) }
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }
    /// Enough distinct keys queued that the owner should flush now.
    pub fn is_full(&self) -> bool { self.map.len() >= self.cap }

    /// Queue an update; a newer update for an already-queued key replaces it in place.
    pub fn push(&mut self, u: StateUpdate) {
        if !self.map.contains_key(&u.key) {
            self.order.push_back(u.key.clone());
        }
        self.map.insert(u.key.clone(), u);
    }

    pub fn drain_ready(&mut self) -> Vec<StateUpdate> {
        let mut out = Vec::with_capacity(self.order.len());
        while let Some(key) = self.order.pop_front() {
            if let Some(u) = self.map.remove(&key) {
                out.push(u);
            }
        }
        out
    }
}

/// Accumulates per-type states for one connection and freezes them into snapshots.
pub struct SnapshotBuilder {
    epoch: u64,
    policy: FullSyncPolicy,
    empty: EmptySnapshotPolicy,
    states: BTreeMap<ResourceTypeKey, SyncState>,
    counts: BTreeMap<ResourceTypeKey, u64>,
}

impl SnapshotBuilder {
    pub fn new(policy: FullSyncPolicy) -> Self {
        Self { epoch: 0, policy, empty: EmptySnapshotPolicy::default(), states: BTreeMap::new(), counts: BTreeMap::new() }
    }

    pub fn with_empty_policy(mut self, empty: EmptySnapshotPolicy) -> Self {
        self.empty = empty;
        self
    }

    pub fn epoch(&self) -> u64 { self.epoch }

    /// Apply a batch. Types are never removed once seen; a count survives
    /// only while its type stays `Synced`.
    pub fn apply(&mut self, batch: Vec<StateUpdate>) {
        for u in batch {
            if u.state != SyncState::Synced {
                self.counts.remove(&u.key);
            } else if let Some(n) = u.count {
                self.counts.insert(u.key.clone(), n);
            }
            self.states.insert(u.key, u.state);
        }
        self.epoch = self.epoch.saturating_add(1);
    }

    pub fn freeze(&self) -> Arc<ConnectionSyncSnapshot> {
        Arc::new(ConnectionSyncSnapshot::from_states_with(
            self.epoch,
            self.states.clone(),
            self.counts.clone(),
            self.policy,
            self.empty,
        ))
    }
}

/// Read side of a connection feed. Cheap to clone.
#[derive(Clone)]
pub struct FeedHandle {
    snap: Arc<ArcSwapOption<ConnectionSyncSnapshot>>,
    epoch_rx: watch::Receiver<u64>,
}

impl FeedHandle {
    /// Latest snapshot, or `None` before the first one has been published.
    pub fn latest(&self) -> Option<Arc<ConnectionSyncSnapshot>> { self.snap.load_full() }

    /// Epoch notifications; `0` means nothing published yet.
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.epoch_rx.clone() }

    /// A feed that already holds `snap` and will never change.
    pub fn fixed(snap: ConnectionSyncSnapshot) -> Self {
        let (publisher, feed) = manual_feed();
        publisher.publish(Arc::new(snap));
        feed
    }
}

/// Write side of a feed for hosts that build snapshots themselves.
pub struct FeedPublisher {
    snap: Arc<ArcSwapOption<ConnectionSyncSnapshot>>,
    epoch_tx: watch::Sender<u64>,
}

impl FeedPublisher {
    /// Swap in `snap` and notify subscribers. The notified epoch always
    /// advances, even if the source reuses epoch numbers.
    pub fn publish(&self, snap: Arc<ConnectionSyncSnapshot>) {
        self.snap.store(Some(snap));
        let next = self.epoch_tx.borrow().saturating_add(1);
        // stored even when nobody is subscribed
        self.epoch_tx.send_replace(next);
        counter!("kubesync_snapshots_published_total", 1u64);
    }

    pub fn published(&self) -> u64 { *self.epoch_tx.borrow() }
}

/// Feed without an ingest loop; snapshots arrive through [`FeedPublisher::publish`].
pub fn manual_feed() -> (FeedPublisher, FeedHandle) {
    let snap: Arc<ArcSwapOption<ConnectionSyncSnapshot>> = Arc::new(ArcSwapOption::empty());
    let (epoch_tx, epoch_rx) = watch::channel(0u64);
    (FeedPublisher { snap: Arc::clone(&snap), epoch_tx }, FeedHandle { snap, epoch_rx })
}

fn flush(builder: &mut SnapshotBuilder, batch: Vec<StateUpdate>, publisher: &FeedPublisher) {
    builder.apply(batch);
    publisher.publish(builder.freeze());
}

/// Spawn an ingest loop consuming state updates and swapping snapshots.
/// Returns a sender for updates and a handle for reads.
pub fn spawn_ingest(cfg: &SyncConfig) -> (mpsc::Sender<StateUpdate>, FeedHandle) {
    let (tx, mut rx) = mpsc::channel::<StateUpdate>(cfg.queue_cap.max(1));
    let (publisher, feed) = manual_feed();
    let cap = cfg.queue_cap;
    let policy = cfg.full_sync_policy;
    let empty = cfg.empty_snapshot;
    let interval = cfg.flush_interval();

    tokio::spawn(async move {
        let mut coalescer = Coalescer::with_capacity(cap);
        let mut builder = SnapshotBuilder::new(policy).with_empty_policy(empty);
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                maybe = rx.recv() => {
                    match maybe {
                        Some(u) => {
                            coalescer.push(u);
                            // a full queue is folded in right away instead of waiting for the tick
                            if coalescer.is_full() {
                                counter!("kubesync_ingest_early_flush_total", 1u64);
                                gauge!("kubesync_coalescer_pending", coalescer.len() as f64);
                                flush(&mut builder, coalescer.drain_ready(), &publisher);
                            }
                        }
                        None => {
                            debug!("ingest: update channel closed; draining");
                            let batch = coalescer.drain_ready();
                            if !batch.is_empty() {
                                flush(&mut builder, batch, &publisher);
                            }
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    let batch = coalescer.drain_ready();
                    if !batch.is_empty() {
                        flush(&mut builder, batch, &publisher);
                    }
                }
            }
        }
        info!(epoch = builder.epoch(), "ingest: loop stopped");
    });

    (tx, feed)
}
