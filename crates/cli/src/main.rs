//! kubesyncctl: inspect keys, snapshots and nav-tree badges, replay sync timelines.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use kubesync_aggregate::{badge_tree, summarize_groups, BadgeNode, GroupSummary, NavNode, ProgressSummary};
use kubesync_api::RenderTick;
use kubesync_core::key::{self, to_resource_type_key};
use kubesync_core::{ConnectionSyncSnapshot, SyncConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

mod replay;

#[derive(Parser, Debug)]
#[command(name = "kubesyncctl", version, about = "kubesync CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resource-type key conversions
    Key {
        #[command(subcommand)]
        command: KeyCommand,
    },
    /// Progress and per-group summary of a snapshot file
    Summarize {
        /// Snapshot file (.json, .yaml or .yml)
        snapshot: PathBuf,
        /// Recompute totals, progress and fully_synced from `states`
        #[arg(long = "derive", action = ArgAction::SetTrue)]
        derive: bool,
    },
    /// Badge every node of a navigation tree against a snapshot
    Badges {
        /// Tree file: a list of root nodes
        tree: PathBuf,
        snapshot: PathBuf,
    },
    /// Replay a scripted timeline of snapshot frames and user actions
    Replay {
        script: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum KeyCommand {
    /// Split `group::version::Kind` into its parts
    Parse { key: String },
    /// `group_version_Kind` nav id to resource-type key
    FromNav { id: String },
    /// Resource-type key to nav id
    ToNav { key: String },
}

fn init_tracing() {
    let env = std::env::var("KUBESYNC_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries command output
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KUBESYNC_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid KUBESYNC_METRICS_ADDR; expected host:port");
        }
    }
}

/// Load JSON or YAML depending on the file extension.
fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));
    if yaml {
        serde_yaml::from_str(&raw).with_context(|| format!("parsing YAML {}", path.display()))
    } else {
        serde_json::from_str(&raw).with_context(|| format!("parsing JSON {}", path.display()))
    }
}

fn load_snapshot(path: &Path, derive: bool, cfg: &SyncConfig) -> Result<ConnectionSyncSnapshot> {
    let snap: ConnectionSyncSnapshot = load(path)?;
    if !derive {
        return Ok(snap);
    }
    Ok(ConnectionSyncSnapshot::from_states_with(snap.epoch, snap.states, snap.counts, cfg.full_sync_policy, cfg.empty_snapshot))
}

fn print_json<T: Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

fn print_progress(p: &ProgressSummary) {
    println!(
        "progress: {}/{} ({}%) fully_synced={} errors={} cancelled={}",
        p.done, p.total, p.percent(), p.fully_synced, p.errors, p.cancelled
    );
}

fn print_groups(groups: &[GroupSummary]) {
    for g in groups {
        let flag = if g.has_error { "  !" } else { "" };
        println!("{:<24} {:>3}/{:<3} {:>3}%{}", g.group_label, g.done_count, g.total_count, g.percent(), flag);
        for item in &g.items {
            println!("  {:<22} {:<10} {}", item.kind, item.state, item.count);
        }
    }
}

fn print_badges(node: &BadgeNode, depth: usize) {
    let badge = node.badge.map(|b| format!("{:?}", b)).unwrap_or_default();
    println!("{}{} {}", "  ".repeat(depth), node.id, badge);
    for c in &node.children {
        print_badges(c, depth + 1);
    }
}

fn print_tick(at_ms: u64, action: Option<&replay::Action>, tick: &RenderTick) {
    let action = action.cloned().map(String::from).unwrap_or_else(|| "-".to_string());
    let dialog = if tick.dialog_visible { "open" } else { "closed" };
    println!(
        "[{:>7}ms] {:<28} {}/{} ({}%) dialog={}",
        at_ms, action, tick.progress.done, tick.progress.total, tick.progress.percent(), dialog
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let cfg = SyncConfig::from_env();

    match cli.command {
        Commands::Key { command } => match command {
            KeyCommand::Parse { key: k } => {
                let parts = key::parse(&k);
                match cli.output {
                    Output::Human => {
                        println!("group:   {}", parts.group);
                        println!("version: {}", parts.version);
                        println!("kind:    {}", parts.kind);
                        println!("label:   {}", key::format_group_label(&parts.group));
                    }
                    Output::Json => print_json(&parts)?,
                }
            }
            KeyCommand::FromNav { id } => {
                let k = to_resource_type_key(&id);
                match cli.output {
                    Output::Human => println!("{}", k),
                    Output::Json => print_json(&serde_json::json!({ "nav_id": id, "key": k }))?,
                }
            }
            KeyCommand::ToNav { key: k } => {
                let id = key::to_nav_id(&k);
                match cli.output {
                    Output::Human => println!("{}", id),
                    Output::Json => print_json(&serde_json::json!({ "key": k, "nav_id": id }))?,
                }
            }
        },
        Commands::Summarize { snapshot, derive } => {
            let snap = load_snapshot(&snapshot, derive, &cfg)?;
            info!(types = snap.states.len(), epoch = snap.epoch, "summarize invoked");
            let progress = ProgressSummary::from_snapshot(Some(&snap));
            let groups = summarize_groups(Some(&snap));
            match cli.output {
                Output::Human => {
                    print_progress(&progress);
                    print_groups(&groups);
                }
                Output::Json => print_json(&serde_json::json!({ "progress": progress, "groups": groups }))?,
            }
        }
        Commands::Badges { tree, snapshot } => {
            let roots: Vec<NavNode> = load(&tree)?;
            let snap = load_snapshot(&snapshot, false, &cfg)?;
            info!(roots = roots.len(), "badges invoked");
            let badged: Vec<BadgeNode> = roots.iter().map(|r| badge_tree(r, &snap)).collect();
            match cli.output {
                Output::Human => {
                    for b in &badged {
                        print_badges(b, 0);
                    }
                }
                Output::Json => print_json(&badged)?,
            }
        }
        Commands::Replay { script } => {
            let script: replay::Script = load(&script)?;
            info!(connection = %script.connection_id, steps = script.steps.len(), "replay invoked");
            let steps = replay::run(&script, &cfg).await?;
            match cli.output {
                Output::Human => {
                    for s in &steps {
                        print_tick(s.at_ms, s.action.as_ref(), &s.tick);
                    }
                }
                Output::Json => print_json(&steps)?,
            }
        }
    }
    Ok(())
}
