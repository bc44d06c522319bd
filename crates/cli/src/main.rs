// crates/cli/src/main.rs
//! Reference host for the danmacom core.
//!
//! Implements the host capability interface over a list of files named on
//! the command line and prints the core's event streams to the terminal. It
//! adds no semantics of its own; an editor integration would supply the same
//! two capabilities against its real document set.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use danmacom_core::{
    spawn_backend, BackendConfig, Comment, DispatchEvent, Dispatcher, DocumentInfo, Host,
    LiveConfig, LogLevel, ProcessConfig, Thread,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "danmacom", about = "Drive code-review threads from live chat")]
struct Args {
    /// Public live room id for the chat-server backend.
    #[arg(long, conflicts_with = "cmd")]
    live: Option<u64>,

    /// Command spawned as a subprocess backend, emitting one chat JSON
    /// object per stdout line.
    #[arg(long)]
    cmd: Option<String>,

    /// Files viewers can anchor threads to.
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
}

/// Host over a fixed set of files, read once at startup for their line
/// counts. Comments are printed rather than rendered in an editor.
struct FileHost {
    docs: Vec<DocumentInfo>,
}

impl FileHost {
    fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut docs = Vec::new();
        for path in paths {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            docs.push(DocumentInfo::new(
                path.display().to_string(),
                text.lines().count() as u32,
            ));
        }
        Ok(Self { docs })
    }
}

impl Host for FileHost {
    fn open_documents(&self) -> Vec<DocumentInfo> {
        self.docs.clone()
    }

    fn append_comment(&mut self, thread: &Thread, comment: &Comment) {
        let anchor = match thread.line {
            Some(line) => format!("{}:{}", thread.document, line + 1),
            None => thread.document.clone(),
        };
        println!(
            "\x1b[32m[/{} {}] {}: {}\x1b[0m",
            thread.ref_id, anchor, comment.author, comment.body
        );
    }
}

fn backend_config(args: &Args) -> Result<BackendConfig> {
    match (&args.live, &args.cmd) {
        (Some(live_id), None) => Ok(BackendConfig::Live(LiveConfig::new(*live_id))),
        (None, Some(cmd)) => Ok(BackendConfig::Process(ProcessConfig { cmd: cmd.clone() })),
        _ => bail!("exactly one of --live <id> or --cmd <command> is required"),
    }
}

fn print_event(event: DispatchEvent) {
    match event {
        DispatchEvent::Log { level, line } => match level {
            LogLevel::Trace => println!("{line}"),
            LogLevel::Notice => println!("\x1b[34m{line}\x1b[0m"),
            LogLevel::Error => println!("\x1b[31m{line}\x1b[0m"),
        },
        // Comments are already rendered by the host; the refresh and unread
        // signals have no surface in a line-oriented terminal.
        DispatchEvent::Comment { .. } => {}
        DispatchEvent::ThreadsChanged => {}
        DispatchEvent::Unread { .. } => {}
        DispatchEvent::Closed => println!("[Stopping]"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = backend_config(&args)?;
    let host = FileHost::load(&args.files)?;

    let (backend, backend_events) = spawn_backend(config)?;
    println!("[Starting: {}]", backend.description());

    let (events_tx, mut events_rx) = mpsc::channel(256);
    let mut dispatcher = Dispatcher::new(host, events_tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_event(event);
        }
    });

    tokio::select! {
        _ = dispatcher.run(backend_events) => {}
        _ = tokio::signal::ctrl_c() => {
            backend.dispose();
            println!("[Stopping]");
        }
    }

    drop(dispatcher);
    let _ = printer.await;
    Ok(())
}
