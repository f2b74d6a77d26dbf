//! kubesync aggregation: derives presentation-ready views from one
//! connection snapshot. Everything here is a pure function of its input.

#![forbid(unsafe_code)]

pub mod groups;
pub mod progress;
pub mod tree;

pub use groups::{summarize_groups, GroupItem, GroupSummary};
pub use progress::ProgressSummary;
pub use tree::{badge_map, badge_tree, leaf_badge, Badge, BadgeNode, NavNode};
