//! Timeline replay: scripted snapshot frames and user actions run through the
//! in-process store and a [`ConnectionView`], one render per step.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use kubesync_api::{ConnectionView, NavNode, RenderTick, ShowSyncView};
use kubesync_core::{ResourceTypeKey, SyncConfig, SyncState};
use kubesync_kubehub::{ChannelControl, EnsureInformer, RetryDispatcher};
use kubesync_store::{manual_feed, SnapshotBuilder, StateUpdate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Scripted user action, written as `show`, `close` or `retry <key>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    Show,
    Close,
    Retry(ResourceTypeKey),
}

impl TryFrom<String> for Action {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let mut words = raw.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("show"), None, _) => Ok(Action::Show),
            (Some("close"), None, _) => Ok(Action::Close),
            (Some("retry"), Some(key), None) => Ok(Action::Retry(ResourceTypeKey::from(key))),
            _ => Err(format!("unknown action {:?}; expected show, close or retry <key>", raw)),
        }
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        match a {
            Action::Show => "show".to_string(),
            Action::Close => "close".to_string(),
            Action::Retry(key) => format!("retry {}", key),
        }
    }
}

/// One scripted step. A step carrying `states` is a frame: those types are
/// folded into the connection's snapshot before the action (if any) runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    pub at_ms: u64,
    #[serde(default)]
    pub states: BTreeMap<ResourceTypeKey, SyncState>,
    #[serde(default)]
    pub counts: BTreeMap<ResourceTypeKey, u64>,
    #[serde(default)]
    pub action: Option<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    #[serde(default = "default_connection")]
    pub connection_id: String,
    #[serde(default)]
    pub nav: Vec<NavNode>,
    pub steps: Vec<Step>,
}

fn default_connection() -> String { "c1".to_string() }

#[derive(Debug, Clone, Serialize)]
pub struct ReplayStep {
    pub at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dispatched: Vec<EnsureInformer>,
    pub tick: RenderTick,
}

fn frame(step: &Step) -> Vec<StateUpdate> {
    step.states
        .iter()
        .map(|(key, state)| StateUpdate { key: key.clone(), state: *state, count: step.counts.get(key).copied() })
        .collect()
}

/// Run `script` on a virtual clock anchored at the call. Step times must not go backwards.
pub async fn run(script: &Script, cfg: &SyncConfig) -> Result<Vec<ReplayStep>> {
    let (publisher, feed) = manual_feed();
    let (control, mut commands) = ChannelControl::new(cfg.queue_cap);
    let dispatcher = RetryDispatcher::new(Arc::new(control));
    let mut view = ConnectionView::with_config(script.connection_id.clone(), feed, dispatcher, cfg).with_nav(script.nav.clone());
    let mut builder = SnapshotBuilder::new(cfg.full_sync_policy).with_empty_policy(cfg.empty_snapshot);

    let base = Instant::now();
    let mut last_ms = 0u64;
    let mut out = Vec::with_capacity(script.steps.len());
    for step in &script.steps {
        if step.at_ms < last_ms {
            bail!("step at {}ms comes after a step at {}ms", step.at_ms, last_ms);
        }
        last_ms = step.at_ms;
        let now = base + Duration::from_millis(step.at_ms);

        if !step.states.is_empty() {
            builder.apply(frame(step));
            publisher.publish(builder.freeze());
            debug!(at_ms = step.at_ms, epoch = builder.epoch(), "replay: frame published");
        }
        // frames land before actions so a same-instant show sees the data
        view.render(now);

        let mut dispatched = Vec::new();
        match &step.action {
            Some(Action::Show) => {
                let sig = ShowSyncView { connection_id: script.connection_id.clone() };
                view.on_signal(&sig);
            }
            Some(Action::Close) => view.close_dialog(),
            Some(Action::Retry(key)) => {
                view.retry(key).await?;
                while let Ok(cmd) = commands.try_recv() {
                    info!(connection = %cmd.connection_id, key = %cmd.resource_type_key, "replay: ensure informer");
                    dispatched.push(cmd);
                }
            }
            None => {}
        }
        out.push(ReplayStep { at_ms: step.at_ms, action: step.action.clone(), dispatched, tick: view.render(now) });
    }
    Ok(out)
}
