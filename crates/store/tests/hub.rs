#![forbid(unsafe_code)]

use std::time::Duration;

use kubesync_core::{ConnectionKey, ConnectionSyncSnapshot, SyncConfig, SyncState};
use kubesync_store::{SnapshotSource, StateUpdate, StaticSource, SyncHub};

async fn wait_for(hub: &SyncHub, key: &ConnectionKey, pred: impl Fn(&ConnectionSyncSnapshot) -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if hub.latest(key).map(|s| pred(&s)).unwrap_or(false) { break; }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("snapshot condition not reached");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connections_are_isolated() {
    let hub = SyncHub::new(SyncConfig { flush_interval_ms: 2, ..SyncConfig::default() });
    let c1 = ConnectionKey::new("kubernetes", "c1");
    let c2 = ConnectionKey::new("kubernetes", "c2");
    let (tx1, _) = hub.open(&c1);
    let (tx2, _) = hub.open(&c2);

    tx1.send(StateUpdate::new("core::v1::Pod", SyncState::Error)).await.unwrap();
    tx2.send(StateUpdate::synced("core::v1::Pod", 1)).await.unwrap();

    wait_for(&hub, &c1, |s| s.total_types == 1).await;
    wait_for(&hub, &c2, |s| s.total_types == 1).await;
    assert_eq!(hub.latest(&c1).unwrap().state("core::v1::Pod"), Some(SyncState::Error));
    assert_eq!(hub.latest(&c2).unwrap().state("core::v1::Pod"), Some(SyncState::Synced));
    assert_eq!(hub.connections(), vec![c1.clone(), c2.clone()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reopening_returns_same_feed() {
    let hub = SyncHub::new(SyncConfig { flush_interval_ms: 2, ..SyncConfig::default() });
    let key = ConnectionKey::new("kubernetes", "c1");
    let (tx, _) = hub.open(&key);
    tx.send(StateUpdate::new("apps::v1::Deployment", SyncState::Syncing)).await.unwrap();
    wait_for(&hub, &key, |s| s.total_types == 1).await;

    let (_tx_again, feed) = hub.open(&key);
    assert_eq!(feed.latest().unwrap().state("apps::v1::Deployment"), Some(SyncState::Syncing));

    assert!(hub.close(&key));
    assert!(hub.latest(&key).is_none());
    assert!(!hub.close(&key));
}

#[test]
fn static_source_returns_configured_snapshot() {
    let key = ConnectionKey::new("kubernetes", "c1");
    let src = StaticSource::new().with(key.clone(), ConnectionSyncSnapshot::default());
    assert!(src.latest(&key).is_some());
    assert!(src.latest(&ConnectionKey::new("kubernetes", "other")).is_none());
}
