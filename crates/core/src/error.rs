use thiserror::Error;

/// Configuration errors surfaced by [`crate::config::SyncConfig::try_from_env`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidEnv { var: &'static str, value: String, reason: String },
}

/// Unknown sync state name on the wire.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown sync state: {0}")]
pub struct UnknownState(pub String);
