//! Sync badges over a caller-supplied navigation tree.
//!
//! The rollup is a pure recursive walk that returns a parallel tree of
//! badges; the input tree and snapshot are only borrowed.

use std::collections::BTreeMap;

use kubesync_core::key::to_resource_type_key;
use kubesync_core::{ConnectionSyncSnapshot, ResourceTypeKey, SyncState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Badge {
    SyncingIndicator,
    ErrorIndicator,
}

/// Navigation tree node. Leaves map 1:1 to a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NavNode {
    Branch { id: String, children: Vec<NavNode> },
    Leaf { id: String, key: ResourceTypeKey },
}

impl NavNode {
    /// Leaf whose resource key is derived from a `group_version_Kind` id.
    pub fn leaf(id: impl Into<String>) -> Self {
        let id = id.into();
        let key = ResourceTypeKey::new(to_resource_type_key(&id));
        NavNode::Leaf { id, key }
    }

    pub fn leaf_with_key(id: impl Into<String>, key: impl Into<ResourceTypeKey>) -> Self {
        NavNode::Leaf { id: id.into(), key: key.into() }
    }

    pub fn branch(id: impl Into<String>, children: Vec<NavNode>) -> Self {
        NavNode::Branch { id: id.into(), children }
    }

    pub fn id(&self) -> &str {
        match self {
            NavNode::Branch { id, .. } | NavNode::Leaf { id, .. } => id,
        }
    }
}

/// Badge result mirroring the shape of the input tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeNode {
    pub id: String,
    pub badge: Option<Badge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BadgeNode>,
}

pub fn leaf_badge(state: Option<SyncState>) -> Option<Badge> {
    match state? {
        SyncState::Pending | SyncState::Syncing => Some(Badge::SyncingIndicator),
        SyncState::Error => Some(Badge::ErrorIndicator),
        SyncState::Synced | SyncState::Cancelled => None,
    }
}

// What a subtree contains, independent of how deep it sits.
#[derive(Default, Clone, Copy)]
struct Rollup {
    error: bool,
    in_flight: bool,
}

impl Rollup {
    fn merge(self, other: Rollup) -> Rollup {
        Rollup { error: self.error || other.error, in_flight: self.in_flight || other.in_flight }
    }

    // errors outrank in-flight work
    fn badge(self) -> Option<Badge> {
        if self.error {
            Some(Badge::ErrorIndicator)
        } else if self.in_flight {
            Some(Badge::SyncingIndicator)
        } else {
            None
        }
    }
}

fn walk(node: &NavNode, snap: &ConnectionSyncSnapshot) -> (BadgeNode, Rollup) {
    match node {
        NavNode::Leaf { id, key } => {
            let state = snap.state(key.as_str());
            let rollup = Rollup {
                error: state == Some(SyncState::Error),
                in_flight: state.map(SyncState::is_in_flight).unwrap_or(false),
            };
            (BadgeNode { id: id.clone(), badge: leaf_badge(state), children: Vec::new() }, rollup)
        }
        NavNode::Branch { id, children } => {
            let mut rollup = Rollup::default();
            let mut out = Vec::with_capacity(children.len());
            // every child is visited: siblings still need their own badges
            for child in children {
                let (badge_node, child_rollup) = walk(child, snap);
                rollup = rollup.merge(child_rollup);
                out.push(badge_node);
            }
            (BadgeNode { id: id.clone(), badge: rollup.badge(), children: out }, rollup)
        }
    }
}

/// Badge every node of `root` against `snap`.
pub fn badge_tree(root: &NavNode, snap: &ConnectionSyncSnapshot) -> BadgeNode { walk(root, snap).0 }

/// Flattened `id -> badge` for nodes that carry one, across several roots.
pub fn badge_map(roots: &[NavNode], snap: &ConnectionSyncSnapshot) -> BTreeMap<String, Badge> {
    fn collect(n: &BadgeNode, out: &mut BTreeMap<String, Badge>) {
        if let Some(b) = n.badge {
            out.insert(n.id.clone(), b);
        }
        for c in &n.children {
            collect(c, out);
        }
    }
    let mut out = BTreeMap::new();
    for root in roots {
        collect(&badge_tree(root, snap), &mut out);
    }
    out
}
