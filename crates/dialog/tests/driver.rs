#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use kubesync_core::ConnectionSyncSnapshot;
use kubesync_dialog::{spawn_dialog_driver, DialogDecision, SignalBus, SyncDialogController};
use kubesync_store::{manual_feed, FeedHandle};

const DISMISS: Duration = Duration::from_millis(1500);

fn snap(fully_synced: bool) -> Arc<ConnectionSyncSnapshot> {
    Arc::new(ConnectionSyncSnapshot { fully_synced, progress: if fully_synced { 1.0 } else { 0.5 }, ..Default::default() })
}

// Let the driver task run without letting the paused clock auto-advance.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn opens_on_first_snapshot_and_closes_after_delay() {
    let (publisher, feed) = manual_feed();
    let bus = SignalBus::default();
    let handle = spawn_dialog_driver(SyncDialogController::new("c1", DISMISS), feed, bus.subscribe());
    settle().await;
    assert!(!handle.is_visible());
    assert_eq!(handle.status().decision, DialogDecision::Undecided);

    publisher.publish(snap(false));
    settle().await;
    assert!(handle.is_visible());

    publisher.publish(snap(true));
    settle().await;
    tokio::time::advance(Duration::from_millis(1400)).await;
    settle().await;
    assert!(handle.is_visible(), "closed before the dismissal delay elapsed");

    tokio::time::advance(Duration::from_millis(100)).await;
    settle().await;
    assert!(!handle.is_visible());
    assert_eq!(handle.status().decision, DialogDecision::Closed);
}

#[tokio::test(start_paused = true)]
async fn manual_open_survives_full_sync() {
    let (publisher, feed) = manual_feed();
    let bus = SignalBus::default();
    let handle = spawn_dialog_driver(SyncDialogController::new("c1", DISMISS), feed, bus.subscribe());
    publisher.publish(snap(false));
    settle().await;
    assert_eq!(bus.show("c1"), 1);
    settle().await;
    assert!(handle.status().manually_opened);

    publisher.publish(snap(true));
    settle().await;
    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert!(handle.is_visible());

    handle.close();
    settle().await;
    assert!(!handle.is_visible());
    assert!(!handle.status().manually_opened);
}

#[tokio::test(start_paused = true)]
async fn show_for_other_connection_is_ignored() {
    let (publisher, feed) = manual_feed();
    let bus = SignalBus::default();
    let handle = spawn_dialog_driver(SyncDialogController::new("c1", DISMISS), feed, bus.subscribe());
    publisher.publish(snap(true));
    settle().await;
    assert!(!handle.is_visible());
    bus.show("c2");
    settle().await;
    assert!(!handle.is_visible());
    bus.show("c1");
    settle().await;
    assert!(handle.is_visible(), "a synced connection can still be inspected on demand");
}

#[tokio::test(start_paused = true)]
async fn reopening_during_dismissal_cancels_the_stale_timer() {
    let (publisher, feed) = manual_feed();
    let bus = SignalBus::default();
    let handle = spawn_dialog_driver(SyncDialogController::new("c1", DISMISS), feed, bus.subscribe());
    publisher.publish(snap(false));
    settle().await;
    publisher.publish(snap(true));
    settle().await;
    tokio::time::advance(Duration::from_millis(1000)).await;
    bus.show("c1");
    settle().await;
    tokio::time::advance(Duration::from_millis(1000)).await;
    settle().await;
    assert!(handle.is_visible());
}

#[tokio::test(start_paused = true)]
async fn snapshot_present_at_mount_is_observed() {
    let feed = FeedHandle::fixed(ConnectionSyncSnapshot { fully_synced: false, ..Default::default() });
    let bus = SignalBus::default();
    let handle = spawn_dialog_driver(SyncDialogController::new("c1", DISMISS), feed, bus.subscribe());
    settle().await;
    assert!(handle.is_visible());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_listening() {
    let (publisher, feed) = manual_feed();
    let bus = SignalBus::default();
    let handle = spawn_dialog_driver(SyncDialogController::new("c1", DISMISS), feed, bus.subscribe());
    settle().await;
    let mut status = handle.subscribe();
    handle.shutdown();
    settle().await;
    publisher.publish(snap(false));
    settle().await;
    assert!(!status.borrow_and_update().visible);
    assert!(status.changed().await.is_err(), "driver task should be gone");
}

#[tokio::test(start_paused = true)]
async fn new_synced_snapshot_restarts_dismissal() {
    let (publisher, feed) = manual_feed();
    let bus = SignalBus::default();
    let handle = spawn_dialog_driver(SyncDialogController::new("c1", DISMISS), feed, bus.subscribe());
    publisher.publish(snap(false));
    settle().await;
    publisher.publish(snap(true));
    settle().await;
    tokio::time::advance(Duration::from_millis(1000)).await;
    publisher.publish(snap(true));
    settle().await;

    // 1500ms after the first synced snapshot, only 500ms after the second
    tokio::time::advance(Duration::from_millis(500)).await;
    settle().await;
    assert!(handle.is_visible());

    tokio::time::advance(Duration::from_millis(1000)).await;
    settle().await;
    assert!(!handle.is_visible());
}
