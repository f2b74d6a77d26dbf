use std::collections::BTreeMap;

use kubesync_aggregate::{badge_map, summarize_groups, Badge, NavNode, ProgressSummary};
use kubesync_core::{ConnectionSyncSnapshot, FullSyncPolicy, ResourceTypeKey, SyncState};

fn snapshot(pairs: &[(&str, SyncState)]) -> ConnectionSyncSnapshot {
    let states = pairs.iter().map(|(k, s)| (ResourceTypeKey::from(*k), *s)).collect();
    ConnectionSyncSnapshot::from_states(1, states, BTreeMap::new(), FullSyncPolicy::IgnoreFailures)
}

fn cluster() -> ConnectionSyncSnapshot {
    snapshot(&[
        ("core::v1::Pod", SyncState::Synced),
        ("core::v1::Service", SyncState::Syncing),
        ("apps::v1::Deployment", SyncState::Error),
        ("apps::v1::ReplicaSet", SyncState::Cancelled),
        ("cert-manager.io::v1::Certificate", SyncState::Pending),
        ("cert-manager.io::v1::Issuer", SyncState::Synced),
    ])
}

#[test]
fn group_totals_agree_with_connection_progress() {
    let snap = cluster();
    let progress = ProgressSummary::from_snapshot(Some(&snap));
    let groups = summarize_groups(Some(&snap));
    let done: usize = groups.iter().map(|g| g.done_count).sum();
    let total: usize = groups.iter().map(|g| g.total_count).sum();
    assert_eq!((done, total), (progress.done, progress.total));
    assert_eq!(progress.errors, 1);
    assert_eq!(progress.cancelled, 1);
    let labels: Vec<_> = groups.iter().map(|g| g.group_label.as_str()).collect();
    assert_eq!(labels, vec!["Core", "Apps", "Cert-manager.io"]);
}

#[test]
fn nav_tree_badges_roll_up_to_each_section() {
    let nav = vec![
        NavNode::branch(
            "cluster",
            vec![
                NavNode::branch("workloads", vec![NavNode::leaf("core_v1_Pod"), NavNode::leaf("apps_v1_Deployment")]),
                NavNode::branch("network", vec![NavNode::leaf("core_v1_Service")]),
            ],
        ),
        NavNode::branch(
            "crds",
            vec![NavNode::leaf("cert-manager.io_v1_Certificate"), NavNode::leaf("cert-manager.io_v1_Issuer")],
        ),
        NavNode::branch("quiet", vec![NavNode::leaf("apps_v1_ReplicaSet")]),
    ];
    let badges = badge_map(&nav, &cluster());
    assert_eq!(badges.get("cluster"), Some(&Badge::ErrorIndicator));
    assert_eq!(badges.get("workloads"), Some(&Badge::ErrorIndicator));
    assert_eq!(badges.get("network"), Some(&Badge::SyncingIndicator));
    assert_eq!(badges.get("crds"), Some(&Badge::SyncingIndicator));
    assert_eq!(badges.get("core_v1_Pod"), None);
    assert_eq!(badges.get("quiet"), None);
}

#[test]
fn nav_tree_parses_from_json() {
    let nav: Vec<NavNode> = serde_json::from_value(serde_json::json!([
        { "id": "workloads", "children": [ { "id": "core_v1_Pod", "key": "core::v1::Pod" } ] }
    ]))
    .unwrap();
    let badges = badge_map(&nav, &snapshot(&[("core::v1::Pod", SyncState::Error)]));
    assert_eq!(badges.get("workloads"), Some(&Badge::ErrorIndicator));
}
