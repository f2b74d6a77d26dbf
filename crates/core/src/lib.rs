//! kubesync core types: resource-type keys, per-kind sync states and the
//! per-connection snapshot everything else derives its views from.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod key;

pub use config::SyncConfig;
pub use error::{ConfigError, UnknownState};
pub use key::{KeyParts, ResourceTypeKey};

pub mod prelude {
    pub use super::{
        ConnectionKey, ConnectionSyncSnapshot, EmptySnapshotPolicy, FullSyncPolicy, KeyParts, ResourceTypeKey, SyncConfig, SyncState,
    };
}

/// Sync state of one resource type's watch.
///
/// `Synced`, `Error` and `Cancelled` are terminal until an explicit retry;
/// `Pending` and `Syncing` are in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    Pending,
    Syncing,
    Synced,
    Error,
    Cancelled,
}

impl SyncState {
    pub fn is_terminal(self) -> bool { matches!(self, SyncState::Synced | SyncState::Error | SyncState::Cancelled) }
    pub fn is_in_flight(self) -> bool { !self.is_terminal() }
    /// Only failed watches get a retry affordance; cancelled ones were skipped on purpose.
    pub fn is_retryable(self) -> bool { self == SyncState::Error }
    pub fn is_deemphasized(self) -> bool { self == SyncState::Cancelled }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncState::Pending => "Pending",
            SyncState::Syncing => "Syncing",
            SyncState::Synced => "Synced",
            SyncState::Error => "Error",
            SyncState::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.pad(self.as_str()) }
}

impl FromStr for SyncState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(SyncState::Pending),
            "Syncing" => Ok(SyncState::Syncing),
            "Synced" => Ok(SyncState::Synced),
            "Error" => Ok(SyncState::Error),
            "Cancelled" => Ok(SyncState::Cancelled),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

/// Whether terminal failures keep a connection from counting as fully synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FullSyncPolicy {
    /// Fully synced once nothing is in flight, failures included.
    #[default]
    IgnoreFailures,
    /// Additionally require that no type is in `Error`. `Cancelled` never blocks.
    RequireClean,
}

impl FromStr for FullSyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore-failures" => Ok(FullSyncPolicy::IgnoreFailures),
            "require-clean" => Ok(FullSyncPolicy::RequireClean),
            other => Err(format!("expected ignore-failures or require-clean, got {}", other)),
        }
    }
}

/// How a snapshot that tracks no resource types at all is judged.
///
/// "Nothing in flight" holds trivially for an empty map; the default treats
/// such a connection as not yet started instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptySnapshotPolicy {
    #[default]
    NotSynced,
    Synced,
}

impl FromStr for EmptySnapshotPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not-synced" => Ok(EmptySnapshotPolicy::NotSynced),
            "synced" => Ok(EmptySnapshotPolicy::Synced),
            other => Err(format!("expected not-synced or synced, got {}", other)),
        }
    }
}

/// Identifies one cluster connection as seen by one plugin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionKey {
    pub plugin_id: String,
    pub connection_id: String,
}

impl ConnectionKey {
    pub fn new(plugin_id: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self { plugin_id: plugin_id.into(), connection_id: connection_id.into() }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}/{}", self.plugin_id, self.connection_id) }
}

/// Point-in-time read of a connection's sync progress. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConnectionSyncSnapshot {
    #[serde(default)]
    pub epoch: u64,
    pub states: BTreeMap<ResourceTypeKey, SyncState>,
    #[serde(default)]
    pub counts: BTreeMap<ResourceTypeKey, u64>,
    #[serde(default)]
    pub total_types: usize,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub fully_synced: bool,
}

impl ConnectionSyncSnapshot {
    /// Build a snapshot deriving totals, progress and the fully-synced flag from `states`.
    /// An empty map is not fully synced; see [`Self::from_states_with`].
    pub fn from_states(
        epoch: u64,
        states: BTreeMap<ResourceTypeKey, SyncState>,
        counts: BTreeMap<ResourceTypeKey, u64>,
        policy: FullSyncPolicy,
    ) -> Self {
        Self::from_states_with(epoch, states, counts, policy, EmptySnapshotPolicy::default())
    }

    pub fn from_states_with(
        epoch: u64,
        states: BTreeMap<ResourceTypeKey, SyncState>,
        counts: BTreeMap<ResourceTypeKey, u64>,
        policy: FullSyncPolicy,
        empty: EmptySnapshotPolicy,
    ) -> Self {
        let total_types = states.len();
        let terminal = states.values().filter(|s| s.is_terminal()).count();
        let progress = if total_types == 0 { 0.0 } else { terminal as f64 / total_types as f64 };
        let in_flight = terminal < total_types;
        let blocked = match policy {
            FullSyncPolicy::IgnoreFailures => false,
            FullSyncPolicy::RequireClean => states.values().any(|s| *s == SyncState::Error),
        };
        let fully_synced = if total_types == 0 {
            empty == EmptySnapshotPolicy::Synced
        } else {
            !in_flight && !blocked
        };
        Self { epoch, states, counts, total_types, progress, fully_synced }
    }

    pub fn state(&self, key: &str) -> Option<SyncState> { self.states.get(key).copied() }

    /// Item count for a type; zero when unknown.
    pub fn count(&self, key: &str) -> u64 { self.counts.get(key).copied().unwrap_or(0) }

    pub fn done(&self) -> usize { self.states.values().filter(|s| s.is_terminal()).count() }

    pub fn failed(&self) -> impl Iterator<Item = &ResourceTypeKey> + '_ {
        self.states.iter().filter(|(_, s)| s.is_retryable()).map(|(k, _)| k)
    }
}
