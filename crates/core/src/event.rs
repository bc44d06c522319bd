// crates/core/src/event.rs
//! Event shapes flowing between backends, the dispatcher, and the host.

use serde::{Deserialize, Serialize};

use crate::registry::ThreadId;

/// One chat message as produced by either backend. Immutable once emitted.
///
/// This is also the subprocess line format: one JSON object per stdout line,
/// `{"author": string, "face": string|null, "content": string}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub author: String,
    /// Avatar URL, if one could be resolved.
    #[serde(default)]
    pub face: Option<String>,
    pub content: String,
}

/// What a backend delivers to the dispatcher, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Diagnostic line from the backend (connection notices, stderr output,
    /// decode failures). Rendered by the host, never parsed as chat.
    Log(String),
    Chat(ChatEvent),
    /// Terminal close. Only the process backend emits this; the live backend
    /// reconnects until disposed.
    Closed,
}

/// Severity of a user-visible session log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Notice,
    Error,
}

/// What the dispatcher emits to the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Session log line (chat echo, command errors, backend notices).
    Log { level: LogLevel, line: String },
    /// A chat-derived comment landed in a thread.
    Comment {
        thread: ThreadId,
        document: String,
        /// Zero-based anchor line; `None` for a file-level thread.
        line: Option<u32>,
        author: String,
        body: String,
    },
    /// Generic registry-changed signal, coalesced to one per dispatch step.
    /// Dependent views (comment counts, line markers) refresh on it.
    ThreadsChanged,
    /// Running count of messages since the host last reset its counter.
    Unread { count: u64 },
    /// The session is over: backend closed or the connection was disposed.
    Closed,
}
