//! Per-API-group rollup of resource-type sync states.

use std::collections::BTreeMap;
use std::time::Instant;

use kubesync_core::key::format_group_label;
use kubesync_core::{ConnectionSyncSnapshot, ResourceTypeKey, SyncState};
use metrics::histogram;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

const CORE_LABEL: &str = "Core";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupItem {
    pub key: ResourceTypeKey,
    pub kind: String,
    pub state: SyncState,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_label: String,
    pub items: SmallVec<[GroupItem; 8]>,
    pub done_count: usize,
    pub total_count: usize,
    pub has_error: bool,
}

impl GroupSummary {
    /// Completion percentage, rounded; an empty group is 0%.
    pub fn percent(&self) -> u32 {
        if self.total_count == 0 { return 0; }
        (100.0 * self.done_count as f64 / self.total_count as f64).round() as u32
    }

    pub fn is_complete(&self) -> bool { self.done_count == self.total_count }
}

/// Group a snapshot's states by display group.
///
/// "Core" always sorts first, the remaining groups alphabetically by label;
/// items within a group are ordered by kind. No snapshot means no groups.
pub fn summarize_groups(snap: Option<&ConnectionSyncSnapshot>) -> Vec<GroupSummary> {
    let Some(snap) = snap else { return Vec::new(); };
    let started = Instant::now();
    let mut by_label: BTreeMap<String, SmallVec<[GroupItem; 8]>> = BTreeMap::new();
    for (key, state) in snap.states.iter() {
        let parts = key.parse();
        let label = format_group_label(&parts.group);
        by_label.entry(label).or_default().push(GroupItem {
            key: key.clone(),
            kind: parts.kind,
            state: *state,
            count: snap.count(key.as_str()),
        });
    }

    let mut out: Vec<GroupSummary> = by_label
        .into_iter()
        .map(|(group_label, mut items)| {
            items.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.key.cmp(&b.key)));
            let done_count = items.iter().filter(|i| i.state.is_terminal()).count();
            let has_error = items.iter().any(|i| i.state == SyncState::Error);
            let total_count = items.len();
            GroupSummary { group_label, items, done_count, total_count, has_error }
        })
        .collect();
    // BTreeMap already yields labels in order; only Core needs hoisting.
    out.sort_by_key(|g| g.group_label != CORE_LABEL);
    histogram!("kubesync_group_aggregate_ms", started.elapsed().as_secs_f64() * 1000.0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubesync_core::FullSyncPolicy;

    fn snap(pairs: &[(&str, SyncState)]) -> ConnectionSyncSnapshot {
        let states = pairs.iter().map(|(k, s)| (ResourceTypeKey::from(*k), *s)).collect();
        ConnectionSyncSnapshot::from_states(1, states, BTreeMap::new(), FullSyncPolicy::IgnoreFailures)
    }

    fn labels(groups: &[GroupSummary]) -> Vec<&str> { groups.iter().map(|g| g.group_label.as_str()).collect() }

    #[test]
    fn core_group_always_first() {
        let s = snap(&[
            ("networking::v1::Ingress", SyncState::Synced),
            ("core::v1::Pod", SyncState::Synced),
            ("apps::v1::Deployment", SyncState::Synced),
        ]);
        assert_eq!(labels(&summarize_groups(Some(&s))), vec!["Core", "Apps", "Networking"]);
    }

    #[test]
    fn core_sorts_ahead_of_labels_that_precede_it() {
        let s = snap(&[
            ("batch::v1::Job", SyncState::Synced),
            ("apps::v1::Deployment", SyncState::Synced),
            ("Pod", SyncState::Synced),
            ("zalando.org::v1::Postgresql", SyncState::Synced),
        ]);
        assert_eq!(labels(&summarize_groups(Some(&s))), vec!["Core", "Apps", "Batch", "Zalando.org"]);
    }

    #[test]
    fn bare_and_explicit_core_keys_share_a_group() {
        let s = snap(&[("Pod", SyncState::Synced), ("core::v1::Service", SyncState::Syncing), ("::v1::Node", SyncState::Pending)]);
        let groups = summarize_groups(Some(&s));
        assert_eq!(groups.len(), 1);
        let kinds: Vec<_> = groups[0].items.iter().map(|i| i.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Node", "Pod", "Service"]);
    }

    #[test]
    fn counts_done_and_errors_per_group() {
        let s = snap(&[
            ("apps::v1::Deployment", SyncState::Synced),
            ("apps::v1::DaemonSet", SyncState::Error),
            ("apps::v1::StatefulSet", SyncState::Syncing),
            ("apps::v1::ReplicaSet", SyncState::Cancelled),
            ("batch::v1::Job", SyncState::Pending),
        ]);
        let groups = summarize_groups(Some(&s));
        let apps = &groups[0];
        assert_eq!(apps.group_label, "Apps");
        assert_eq!((apps.done_count, apps.total_count), (3, 4));
        assert!(apps.has_error);
        assert_eq!(apps.percent(), 75);
        let batch = &groups[1];
        assert_eq!((batch.done_count, batch.total_count), (0, 1));
        assert!(!batch.has_error);
        assert_eq!(batch.percent(), 0);
    }

    #[test]
    fn percent_rounds_and_guards_empty() {
        let mut g = GroupSummary { group_label: "X".into(), items: SmallVec::new(), done_count: 0, total_count: 0, has_error: false };
        assert_eq!(g.percent(), 0);
        g.done_count = 2;
        g.total_count = 3;
        assert_eq!(g.percent(), 67);
        g.done_count = 1;
        g.total_count = 8;
        assert_eq!(g.percent(), 13);
    }

    #[test]
    fn item_counts_default_to_zero() {
        let mut s = snap(&[("core::v1::Pod", SyncState::Synced), ("core::v1::Secret", SyncState::Syncing)]);
        s.counts.insert(ResourceTypeKey::from("core::v1::Pod"), 42);
        let groups = summarize_groups(Some(&s));
        let counts: Vec<_> = groups[0].items.iter().map(|i| (i.kind.as_str(), i.count)).collect();
        assert_eq!(counts, vec![("Pod", 42), ("Secret", 0)]);
    }

    #[test]
    fn absent_or_empty_snapshot_has_no_groups() {
        assert!(summarize_groups(None).is_empty());
        assert!(summarize_groups(Some(&ConnectionSyncSnapshot::default())).is_empty());
    }
}
