// crates/core/src/dispatch.rs
//! The dispatch loop.
//!
//! Consumes backend events in arrival order, classifies chat through the
//! command grammar, and turns thread commands into registry mutations and
//! host comment appends. Command failures become user-visible error lines;
//! nothing short of backend close or disposal stops the loop.

use chrono::{DateTime, Local, Utc};
use tokio::sync::mpsc;

use crate::command::{self, Command};
use crate::document::{find_document, DocumentInfo, FindResult};
use crate::error::CommandError;
use crate::event::{BackendEvent, ChatEvent, DispatchEvent, LogLevel};
use crate::registry::{Comment, Thread, ThreadId, ThreadRegistry};

/// Capabilities the host editor supplies to the core. The core never reads
/// or writes files itself; it sees documents only through this interface.
pub trait Host {
    /// Currently open documents, in the host's own iteration order.
    fn open_documents(&self) -> Vec<DocumentInfo>;

    /// A comment was appended to a thread; render it.
    fn append_comment(&mut self, thread: &Thread, comment: &Comment);
}

pub struct Dispatcher<H: Host> {
    host: H,
    registry: ThreadRegistry,
    events: mpsc::Sender<DispatchEvent>,
    unread: u64,
}

impl<H: Host> Dispatcher<H> {
    pub fn new(host: H, events: mpsc::Sender<DispatchEvent>) -> Self {
        Self {
            host,
            registry: ThreadRegistry::new(),
            events,
            unread: 0,
        }
    }

    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    /// Drive the loop until the backend closes or its channel is dropped by
    /// disposal. Emits exactly one `Closed` at the end either way.
    pub async fn run(&mut self, mut backend: mpsc::Receiver<BackendEvent>) {
        while let Some(event) = backend.recv().await {
            match event {
                BackendEvent::Log(line) => {
                    self.log(LogLevel::Notice, line).await;
                }
                BackendEvent::Chat(chat) => self.handle_chat(chat).await,
                BackendEvent::Closed => break,
            }
        }
        self.emit(DispatchEvent::Closed).await;
    }

    /// Host-driven comment deletion, cascading to the thread when the last
    /// comment goes.
    pub async fn remove_comment(&mut self, thread: ThreadId, index: usize) {
        self.registry.remove_comment(thread, index);
        self.flush_registry_changes().await;
    }

    /// Host-driven thread deletion.
    pub async fn remove_thread(&mut self, thread: ThreadId) {
        self.registry.remove_thread(thread);
        self.flush_registry_changes().await;
    }

    async fn handle_chat(&mut self, chat: ChatEvent) {
        let now = Utc::now();
        self.log(
            LogLevel::Trace,
            format!(
                "[{}] {}: {}",
                Local::now().format("%H:%M:%S"),
                chat.author,
                chat.content
            ),
        )
        .await;

        match command::parse(&chat.content) {
            Command::Normal => {}
            Command::Reply { thread, body } => {
                if self.registry.get(thread).is_some() {
                    self.append(thread, &chat, &body, now).await;
                } else {
                    self.command_error(CommandError::ThreadNotFound(thread))
                        .await;
                }
            }
            Command::OpenThread {
                mode,
                pattern,
                line,
                body,
            } => {
                let docs = self.host.open_documents();
                match find_document(&docs, mode, &pattern) {
                    FindResult::NotFound => {
                        self.command_error(CommandError::FileNotFound(pattern)).await;
                    }
                    FindResult::Ambiguous(paths) => {
                        self.command_error(CommandError::FileAmbiguous { pattern, paths })
                            .await;
                    }
                    FindResult::Found(doc) => match validate_line(line, doc.line_count) {
                        Err(err) => self.command_error(err).await,
                        Ok(line) => {
                            let ref_id = self.registry.get_or_create(&doc.key, line);
                            self.append(ref_id, &chat, &body, now).await;
                            self.log(
                                LogLevel::Trace,
                                format!(
                                    "  -> Thread id is {ref_id}, reply using '/{ref_id} comment'"
                                ),
                            )
                            .await;
                        }
                    },
                }
            }
        }

        // One coalesced refresh signal and one unread tick per event, on
        // error branches too.
        self.registry.take_changed();
        self.emit(DispatchEvent::ThreadsChanged).await;
        self.unread += 1;
        self.emit(DispatchEvent::Unread { count: self.unread }).await;
    }

    async fn append(
        &mut self,
        ref_id: ThreadId,
        chat: &ChatEvent,
        body: &str,
        created_at: DateTime<Utc>,
    ) {
        if self
            .registry
            .add_comment(ref_id, &chat.author, chat.face.clone(), body, created_at)
            .is_none()
        {
            return;
        }
        let Some(thread) = self.registry.get(ref_id) else {
            return;
        };
        let Some(comment) = thread.comments.last() else {
            return;
        };
        self.host.append_comment(thread, comment);
        let event = DispatchEvent::Comment {
            thread: ref_id,
            document: thread.document.clone(),
            line: thread.line,
            author: comment.author.clone(),
            body: comment.body.clone(),
        };
        self.emit(event).await;
    }

    async fn flush_registry_changes(&mut self) {
        if self.registry.take_changed() {
            self.emit(DispatchEvent::ThreadsChanged).await;
        }
    }

    async fn command_error(&self, error: CommandError) {
        self.log(LogLevel::Error, format!("  -> Error: {error}")).await;
    }

    async fn log(&self, level: LogLevel, line: String) {
        self.emit(DispatchEvent::Log { level, line }).await;
    }

    async fn emit(&self, event: DispatchEvent) {
        // A dropped receiver means the host is gone; nothing left to notify.
        let _ = self.events.send(event).await;
    }
}

fn validate_line(line: Option<i64>, line_count: u32) -> Result<Option<u32>, CommandError> {
    match line {
        None => Ok(None),
        Some(line) if line < 0 || line >= i64::from(line_count) => {
            Err(CommandError::LineOutOfRange(line + 1))
        }
        Some(line) => Ok(Some(line as u32)),
    }
}
