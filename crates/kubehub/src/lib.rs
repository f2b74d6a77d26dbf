//! kubesync kubehub: the command boundary towards the backend sync engine.
//!
//! The only command this side issues is `EnsureInformer`: (re)start the watch
//! for one resource type on one connection. Whether it worked shows up in
//! later snapshots, never as a return value the UI acts on.

#![forbid(unsafe_code)]

use std::sync::Arc;

use kubesync_core::ResourceTypeKey;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Re-sync request for exactly one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsureInformer {
    pub connection_id: String,
    pub resource_type_key: ResourceTypeKey,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("sync engine unavailable: command channel closed")]
    Closed,
    #[error("transport: {0}")]
    Transport(String),
}

/// Command surface of the backend sync engine.
#[async_trait::async_trait]
pub trait InformerControl: Send + Sync {
    /// Fire-and-forget from the caller's view; idempotency is the engine's business.
    async fn ensure_informer(&self, connection_id: &str, key: &ResourceTypeKey) -> Result<(), DispatchError>;
}

/// Forwards commands to whichever task consumes the receiving end.
///
/// Never waits for room: a backend that stops draining turns retries into
/// `Transport` failures instead of parking them.
#[derive(Clone)]
pub struct ChannelControl {
    tx: mpsc::Sender<EnsureInformer>,
}

impl ChannelControl {
    pub fn new(cap: usize) -> (Self, mpsc::Receiver<EnsureInformer>) {
        let (tx, rx) = mpsc::channel(cap.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl InformerControl for ChannelControl {
    async fn ensure_informer(&self, connection_id: &str, key: &ResourceTypeKey) -> Result<(), DispatchError> {
        let cmd = EnsureInformer { connection_id: connection_id.to_string(), resource_type_key: key.clone() };
        self.tx.try_send(cmd).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
            mpsc::error::TrySendError::Full(_) => DispatchError::Transport("command queue full".to_string()),
        })
    }
}

/// Issues retries for failed resource types.
///
/// Holds no per-key state: concurrent retries (even of the same key) all go
/// through, and a failed dispatch leaves the displayed state untouched.
#[derive(Clone)]
pub struct RetryDispatcher {
    control: Arc<dyn InformerControl>,
}

impl RetryDispatcher {
    pub fn new(control: Arc<dyn InformerControl>) -> Self { Self { control } }

    /// Spawn the dispatch and return immediately. The handle is only there
    /// for callers that want to wait (tests, shutdown).
    pub fn retry(&self, connection_id: &str, key: &ResourceTypeKey) -> JoinHandle<()> {
        let control = Arc::clone(&self.control);
        let connection_id = connection_id.to_string();
        let key = key.clone();
        debug!(connection = %connection_id, key = %key, "retry: dispatching");
        tokio::spawn(async move {
            match control.ensure_informer(&connection_id, &key).await {
                Ok(()) => {
                    counter!("kubesync_retry_dispatched_total", 1u64);
                    info!(connection = %connection_id, key = %key, "retry: ensure informer sent");
                }
                Err(e) => {
                    counter!("kubesync_retry_failed_total", 1u64);
                    warn!(connection = %connection_id, key = %key, error = %e, "retry: dispatch failed");
                }
            }
        })
    }
}
