//! kubesync dialog: decides when the blocking sync-progress view is shown.
//!
//! [`SyncDialogController`] is a plain state machine driven with explicit
//! instants. [`spawn_dialog_driver`] wraps one in a tokio task that reacts
//! to snapshot epochs, manual-open signals and its own dismissal timer.

#![forbid(unsafe_code)]

mod controller;
mod driver;
mod signals;

pub use controller::{DialogDecision, SyncDialogController};
pub use driver::{spawn_dialog_driver, DialogHandle, DialogStatus};
pub use signals::{ShowSyncView, SignalBus};
