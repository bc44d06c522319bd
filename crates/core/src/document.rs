// crates/core/src/document.rs
//! Fuzzy file resolution against the host's open-document set.

use crate::command::MatchMode;

/// One open document as reported by the host: a stable workspace-relative
/// key plus its current line count. The core never reads the file itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub key: String,
    pub line_count: u32,
}

impl DocumentInfo {
    pub fn new(key: impl Into<String>, line_count: u32) -> Self {
        Self {
            key: key.into(),
            line_count,
        }
    }
}

/// Outcome of resolving a file selector. `Ambiguous` carries every matching
/// path in iteration order, quoted verbatim in the user-facing error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindResult {
    Found(DocumentInfo),
    NotFound,
    Ambiguous(Vec<String>),
}

/// Resolve a pattern against the open documents. Comparison is always
/// case-insensitive, for the exact mode too.
pub fn find_document(docs: &[DocumentInfo], mode: MatchMode, pattern: &str) -> FindResult {
    let pattern = pattern.to_lowercase();
    let mut matches: Vec<&DocumentInfo> = docs
        .iter()
        .filter(|doc| {
            let path = doc.key.to_lowercase();
            match mode {
                MatchMode::Contains => path.contains(&pattern),
                MatchMode::Prefix => path.starts_with(&pattern),
                MatchMode::Suffix => path.ends_with(&pattern),
                MatchMode::Exact => path == pattern,
            }
        })
        .collect();

    match matches.len() {
        0 => FindResult::NotFound,
        1 => FindResult::Found(matches.remove(0).clone()),
        _ => FindResult::Ambiguous(matches.into_iter().map(|doc| doc.key.clone()).collect()),
    }
}
