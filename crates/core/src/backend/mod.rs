// crates/core/src/backend/mod.rs
//! Chat event sources.
//!
//! A backend runs as its own task and delivers `BackendEvent`s over a
//! bounded channel in arrival order. Two shapes exist: the live chat-server
//! connection and the line-delimited subprocess. Both are torn down through
//! the same `Backend` handle.

pub mod live;
pub mod process;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::BackendConfig;
use crate::error::ConfigError;
use crate::event::BackendEvent;

/// Handle to a running backend task. Dropping it does not stop the task;
/// call `dispose`.
#[derive(Debug)]
pub struct Backend {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    description: String,
}

impl Backend {
    /// Stop the backend. Idempotent, and safe to call from inside an event
    /// handler: the task checks the flag before every emit and timer arm, so
    /// no events follow.
    pub fn dispose(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_disposed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait for the backend task to finish after disposal or close.
    pub async fn join(self) {
        let _ = self.task.await;
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Validate the config and start the matching backend task. The receiver
/// side of the returned channel feeds the dispatcher.
pub fn spawn_backend(
    config: BackendConfig,
) -> Result<(Backend, mpsc::Receiver<BackendEvent>), ConfigError> {
    config.validate()?;

    let description = config.describe();
    let (events, receiver) = mpsc::channel(256);
    let (shutdown, shutdown_rx) = watch::channel(false);

    let task = match config {
        BackendConfig::Live(cfg) => tokio::spawn(live::run(cfg, events, shutdown_rx)),
        BackendConfig::Process(cfg) => tokio::spawn(process::run(cfg, events, shutdown_rx)),
    };

    Ok((
        Backend {
            shutdown,
            task,
            description,
        },
        receiver,
    ))
}
