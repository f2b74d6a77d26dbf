//! Runtime knobs, overridable from `KUBESYNC_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::{EmptySnapshotPolicy, FullSyncPolicy};

pub const ENV_DISMISS_MS: &str = "KUBESYNC_DISMISS_MS";
pub const ENV_QUEUE_CAP: &str = "KUBESYNC_QUEUE_CAP";
pub const ENV_FLUSH_MS: &str = "KUBESYNC_FLUSH_MS";
pub const ENV_FULL_SYNC_POLICY: &str = "KUBESYNC_FULL_SYNC_POLICY";
pub const ENV_EMPTY_SNAPSHOT: &str = "KUBESYNC_EMPTY_SNAPSHOT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay between a connection becoming fully synced and the sync dialog closing itself.
    pub dismiss_after_ms: u64,
    /// Capacity of the ingest queue (and of the coalescer behind it).
    pub queue_cap: usize,
    /// How often the ingest loop folds queued updates into a new snapshot.
    pub flush_interval_ms: u64,
    pub full_sync_policy: FullSyncPolicy,
    /// Whether a connection tracking no resource types counts as fully synced.
    pub empty_snapshot: EmptySnapshotPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dismiss_after_ms: 1500,
            queue_cap: 2048,
            flush_interval_ms: 8,
            full_sync_policy: FullSyncPolicy::IgnoreFailures,
            empty_snapshot: EmptySnapshotPolicy::NotSynced,
        }
    }
}

impl SyncConfig {
    pub fn dismiss_after(&self) -> Duration { Duration::from_millis(self.dismiss_after_ms) }
    pub fn flush_interval(&self) -> Duration { Duration::from_millis(self.flush_interval_ms.max(1)) }

    /// Read overrides from the process environment, falling back to defaults
    /// (with a warning) when a variable is set but unparseable.
    pub fn from_env() -> Self {
        match Self::try_from_env() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "config: ignoring environment overrides");
                Self::default()
            }
        }
    }

    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::try_from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`Self::try_from_env`] but with an injectable lookup (tests).
    pub fn try_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(v) = lookup(ENV_DISMISS_MS) { cfg.dismiss_after_ms = parse_var(ENV_DISMISS_MS, v)?; }
        if let Some(v) = lookup(ENV_QUEUE_CAP) {
            let cap: usize = parse_var(ENV_QUEUE_CAP, v.clone())?;
            if cap == 0 {
                return Err(ConfigError::InvalidEnv { var: ENV_QUEUE_CAP, value: v, reason: "must be > 0".into() });
            }
            cfg.queue_cap = cap;
        }
        if let Some(v) = lookup(ENV_FLUSH_MS) { cfg.flush_interval_ms = parse_var(ENV_FLUSH_MS, v)?; }
        if let Some(v) = lookup(ENV_FULL_SYNC_POLICY) { cfg.full_sync_policy = parse_var(ENV_FULL_SYNC_POLICY, v)?; }
        if let Some(v) = lookup(ENV_EMPTY_SNAPSHOT) { cfg.empty_snapshot = parse_var(ENV_EMPTY_SNAPSHOT, v)?; }
        Ok(cfg)
    }
}

fn parse_var<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnv { var, value: value.clone(), reason: e.to_string() })
}
