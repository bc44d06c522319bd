// crates/core/src/registry.rs
//! Thread registry.
//!
//! An arena of threads indexed by ref id, with a location index from
//! document key to line (or the file-level slot) to ref id. Ref ids start at
//! 1 and are never reused, so a viewer-visible `/N` keeps meaning the same
//! discussion for the whole session. All mutation happens from the single
//! dispatch context.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Viewer-visible thread identity. Monotonic from 1 for the registry's
/// lifetime.
pub type ThreadId = u64;

/// One comment. Holds a back-reference to its owning thread, never the
/// thread itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub thread: ThreadId,
    pub author: String,
    pub face: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A discussion anchored to a document, either to one line or to the file
/// as a whole (`line == None`). Owned exclusively by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub ref_id: ThreadId,
    pub document: String,
    /// Zero-based anchor line; `None` is the file-level thread.
    pub line: Option<u32>,
    /// Comments in arrival order.
    pub comments: Vec<Comment>,
}

#[derive(Debug, Default)]
pub struct ThreadRegistry {
    next_ref_id: ThreadId,
    threads: HashMap<ThreadId, Thread>,
    /// document key → anchor (line or file-level) → ref id. At most one
    /// thread per anchor.
    locations: HashMap<String, HashMap<Option<u32>, ThreadId>>,
    changed: bool,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Thread for the given anchor, allocating a fresh ref id if none exists
    /// there yet. A deleted anchor gets a new, larger id next time.
    pub fn get_or_create(&mut self, document: &str, line: Option<u32>) -> ThreadId {
        let anchors = self.locations.entry(document.to_string()).or_default();
        if let Some(&existing) = anchors.get(&line) {
            return existing;
        }

        self.next_ref_id += 1;
        let ref_id = self.next_ref_id;
        anchors.insert(line, ref_id);
        self.threads.insert(
            ref_id,
            Thread {
                ref_id,
                document: document.to_string(),
                line,
                comments: Vec::new(),
            },
        );
        self.changed = true;
        ref_id
    }

    pub fn get(&self, ref_id: ThreadId) -> Option<&Thread> {
        self.threads.get(&ref_id)
    }

    /// Threads anchored in one document, ordered by ref id. Feeds per-file
    /// views like comment-count markers.
    pub fn threads_for(&self, document: &str) -> Vec<&Thread> {
        let mut threads: Vec<&Thread> = self
            .locations
            .get(document)
            .into_iter()
            .flat_map(|anchors| anchors.values())
            .filter_map(|ref_id| self.threads.get(ref_id))
            .collect();
        threads.sort_by_key(|thread| thread.ref_id);
        threads
    }

    /// Append a comment in arrival order. Returns the stored comment, or
    /// `None` if the thread does not exist.
    pub fn add_comment(
        &mut self,
        ref_id: ThreadId,
        author: &str,
        face: Option<String>,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> Option<&Comment> {
        let thread = self.threads.get_mut(&ref_id)?;
        thread.comments.push(Comment {
            thread: ref_id,
            author: author.to_string(),
            face,
            body: body.to_string(),
            created_at,
        });
        self.changed = true;
        thread.comments.last()
    }

    /// Remove one comment by position. Removing the last comment removes the
    /// thread itself. Returns false if the thread or index does not exist.
    pub fn remove_comment(&mut self, ref_id: ThreadId, index: usize) -> bool {
        let Some(thread) = self.threads.get_mut(&ref_id) else {
            return false;
        };
        if index >= thread.comments.len() {
            return false;
        }
        thread.comments.remove(index);
        self.changed = true;
        if thread.comments.is_empty() {
            self.remove_thread(ref_id);
        }
        true
    }

    /// Delete a thread and its location entry; the document entry goes too
    /// once its last thread is gone. Safe to call on an already-removed
    /// thread: a logical no-op that still raises the change flag.
    pub fn remove_thread(&mut self, ref_id: ThreadId) {
        if let Some(thread) = self.threads.remove(&ref_id) {
            if let Some(anchors) = self.locations.get_mut(&thread.document) {
                anchors.remove(&thread.line);
                if anchors.is_empty() {
                    self.locations.remove(&thread.document);
                }
            }
        }
        self.changed = true;
    }

    /// Drain the coalesced change flag. The dispatcher turns any number of
    /// mutations in one dispatch step into a single registry-changed
    /// notification.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn add(registry: &mut ThreadRegistry, ref_id: ThreadId, author: &str, body: &str) {
        registry
            .add_comment(ref_id, author, None, body, Utc::now())
            .expect("thread exists");
    }

    #[test]
    fn get_or_create_is_idempotent_per_anchor() {
        let mut registry = ThreadRegistry::new();
        let first = registry.get_or_create("doc", Some(5));
        let second = registry.get_or_create("doc", Some(5));
        assert_eq!(first, 1);
        assert_eq!(first, second);

        let other_line = registry.get_or_create("doc", Some(6));
        let other_doc = registry.get_or_create("other", Some(5));
        assert_eq!(other_line, 2);
        assert_eq!(other_doc, 3);
    }

    #[test]
    fn file_level_thread_is_its_own_anchor() {
        let mut registry = ThreadRegistry::new();
        let file_level = registry.get_or_create("doc", None);
        let line_zero = registry.get_or_create("doc", Some(0));
        assert_ne!(file_level, line_zero);
        assert_eq!(registry.get_or_create("doc", None), file_level);
        assert_eq!(registry.get(file_level).unwrap().line, None);
    }

    #[test]
    fn removed_anchor_gets_a_new_larger_id() {
        let mut registry = ThreadRegistry::new();
        let first = registry.get_or_create("doc", Some(5));
        registry.remove_thread(first);
        assert!(registry.get(first).is_none());

        let second = registry.get_or_create("doc", Some(5));
        assert!(second > first);
    }

    #[test]
    fn remove_thread_twice_is_safe_and_still_flags_a_change() {
        let mut registry = ThreadRegistry::new();
        let id = registry.get_or_create("doc", Some(1));
        registry.remove_thread(id);
        assert!(registry.take_changed());
        registry.remove_thread(id);
        assert!(registry.take_changed());
    }

    #[test]
    fn removing_last_comment_removes_the_thread() {
        let mut registry = ThreadRegistry::new();
        let id = registry.get_or_create("doc", Some(2));
        add(&mut registry, id, "alice", "first");
        add(&mut registry, id, "bob", "second");

        assert!(registry.remove_comment(id, 0));
        assert_eq!(registry.get(id).unwrap().comments.len(), 1);
        assert_eq!(registry.get(id).unwrap().comments[0].author, "bob");

        assert!(registry.remove_comment(id, 0));
        assert!(registry.get(id).is_none());
        assert!(registry.threads_for("doc").is_empty());
    }

    #[test]
    fn remove_comment_out_of_range_is_a_no_op() {
        let mut registry = ThreadRegistry::new();
        let id = registry.get_or_create("doc", Some(2));
        add(&mut registry, id, "alice", "only");
        registry.take_changed();

        assert!(!registry.remove_comment(id, 5));
        assert!(!registry.remove_comment(id + 100, 0));
        assert!(!registry.take_changed());
    }

    #[test]
    fn comments_keep_arrival_order_and_back_reference() {
        let mut registry = ThreadRegistry::new();
        let id = registry.get_or_create("doc", None);
        add(&mut registry, id, "alice", "one");
        add(&mut registry, id, "bob", "two");

        let thread = registry.get(id).unwrap();
        let bodies: Vec<&str> = thread.comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, ["one", "two"]);
        assert!(thread.comments.iter().all(|c| c.thread == id));
    }

    #[test]
    fn threads_for_lists_by_ref_id() {
        let mut registry = ThreadRegistry::new();
        let late = registry.get_or_create("other", Some(1));
        let a = registry.get_or_create("doc", Some(9));
        let b = registry.get_or_create("doc", None);
        let c = registry.get_or_create("doc", Some(3));

        let listed: Vec<ThreadId> = registry
            .threads_for("doc")
            .iter()
            .map(|t| t.ref_id)
            .collect();
        assert_eq!(listed, [a, b, c]);
        assert!(!listed.contains(&late));
    }

    #[test]
    fn change_flag_coalesces_mutations() {
        let mut registry = ThreadRegistry::new();
        assert!(!registry.take_changed());

        let id = registry.get_or_create("doc", Some(1));
        add(&mut registry, id, "alice", "hi");
        assert!(registry.take_changed());
        assert!(!registry.take_changed());
    }
}
