// crates/core/src/error.rs
use thiserror::Error;

/// Errors that make a session impossible to start. Surfaced once by the
/// host; no backend is spawned afterwards.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required backend setting: {0}")]
    Missing(&'static str),

    #[error("invalid backend configuration: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Errors that can occur when decoding wire frames or chat lines.
///
/// Decode errors are logged and the offending frame/line is dropped; they
/// never tear down a connection.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame too short: {len} bytes, need at least {need}")]
    Truncated { len: usize, need: usize },

    #[error("header length {header_len} exceeds frame length {len}")]
    HeaderOverrun { header_len: usize, len: usize },

    #[error("inflate failed: {0}")]
    Inflate(#[source] std::io::Error),

    #[error("malformed payload JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the HTTP collaborators (room-id resolution, avatar lookup).
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected lookup response: missing {0}")]
    MissingField(&'static str),
}

/// User-visible command failures. Logged as an error line, no state is
/// mutated, and dispatch continues with the next event.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No such thread {0}")]
    ThreadNotFound(u64),

    #[error("{0:?} not found")]
    FileNotFound(String),

    #[error("{pattern:?} is ambiguous: {}", .paths.join(", "))]
    FileAmbiguous { pattern: String, paths: Vec<String> },

    /// Carries the one-based line number as the user typed it.
    #[error("Line number {0} out of range")]
    LineOutOfRange(i64),
}
