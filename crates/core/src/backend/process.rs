// crates/core/src/backend/process.rs
//! Subprocess backend.
//!
//! Spawns the configured command under `sh -c` and reads one chat record
//! per stdout line, `{"author", "face", "content"}`. stderr lines are
//! forwarded verbatim as log events. Process exit is the terminal close
//! signal; disposal kills the child and emits nothing further.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::config::ProcessConfig;
use crate::event::{BackendEvent, ChatEvent};

pub(crate) async fn run(
    config: ProcessConfig,
    events: mpsc::Sender<BackendEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(&config.cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(error) => {
            warn!(cmd = %config.cmd, %error, "failed to spawn backend process");
            let _ = events
                .send(BackendEvent::Log(format!("Cannot spawn process: {error}")))
                .await;
            let _ = events.send(BackendEvent::Closed).await;
            return;
        }
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = events.send(BackendEvent::Closed).await;
        return;
    };
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut stderr_open = true;

    loop {
        tokio::select! {
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                let _ = child.kill().await;
                return;
            }
            line = out_lines.next_line() => match line {
                Ok(Some(line)) => match serde_json::from_str::<ChatEvent>(&line) {
                    Ok(chat) => {
                        if events.send(BackendEvent::Chat(chat)).await.is_err() {
                            let _ = child.kill().await;
                            return;
                        }
                    }
                    Err(error) => {
                        let _ = events
                            .send(BackendEvent::Log(format!("Cannot parse chat line: {error}")))
                            .await;
                    }
                },
                // stdout is gone: the process is finishing.
                Ok(None) | Err(_) => break,
            },
            line = err_lines.next_line(), if stderr_open => match line {
                Ok(Some(line)) => {
                    let _ = events.send(BackendEvent::Log(line)).await;
                }
                Ok(None) | Err(_) => stderr_open = false,
            },
        }
    }

    tokio::select! {
        _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
            let _ = child.kill().await;
            return;
        }
        status = child.wait() => match status {
            Ok(status) => debug!(%status, cmd = %config.cmd, "backend process exited"),
            Err(error) => warn!(%error, "failed to reap backend process"),
        }
    }

    // Whatever stderr had buffered at exit still belongs to the session log.
    while stderr_open {
        match err_lines.next_line().await {
            Ok(Some(line)) => {
                let _ = events.send(BackendEvent::Log(line)).await;
            }
            Ok(None) | Err(_) => break,
        }
    }

    if !*shutdown.borrow() {
        let _ = events.send(BackendEvent::Closed).await;
    }
}
