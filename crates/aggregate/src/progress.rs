use kubesync_core::{ConnectionSyncSnapshot, SyncState};
use serde::{Deserialize, Serialize};

/// Connection-wide progress line: done/total, fraction and failure tallies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub done: usize,
    pub total: usize,
    pub progress: f64,
    pub fully_synced: bool,
    pub errors: usize,
    pub cancelled: usize,
}

impl ProgressSummary {
    /// `total` and `progress` come from the source as reported; `done` is
    /// recounted from the states so it always matches the group view.
    pub fn from_snapshot(snap: Option<&ConnectionSyncSnapshot>) -> Self {
        let Some(snap) = snap else { return Self::default(); };
        let errors = snap.states.values().filter(|s| **s == SyncState::Error).count();
        let cancelled = snap.states.values().filter(|s| **s == SyncState::Cancelled).count();
        Self {
            done: snap.done(),
            total: snap.total_types,
            progress: snap.progress.clamp(0.0, 1.0),
            fully_synced: snap.fully_synced,
            errors,
            cancelled,
        }
    }

    pub fn percent(&self) -> u32 { (self.progress * 100.0).round() as u32 }
}
