// crates/core/src/command.rs
//! Chat command grammar.
//!
//! Reclassifies one chat message into a typed intent: a plain message, a
//! reply to an existing thread (`/42 looks good`), or a request to open a
//! thread on a file (`/main.go:10 check this`). A leader character selects
//! how the file pattern matches: `/` contains, `^` prefix, `$` suffix,
//! `=` exact.

use std::sync::OnceLock;

use regex_lite::Regex;

/// How a file pattern is compared against open document paths. Decided once
/// at parse time from the leader character; the full and final set of modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Contains,
    Prefix,
    Suffix,
    Exact,
}

/// Typed intent of one chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Not a thread command. Rendered as ordinary chat, never touches a
    /// thread.
    Normal,
    /// Reply to an existing thread by its numeric id.
    Reply { thread: u64, body: String },
    /// Open (or reuse) a thread on a file, optionally anchored to a line.
    OpenThread {
        mode: MatchMode,
        pattern: String,
        /// Zero-based anchor line; user input is one-based, so `:10` parses
        /// to 9 and `:0` to -1, which fails range validation downstream with
        /// the one-based number in the message. `None` means file-level.
        line: Option<i64>,
        body: String,
    },
}

fn reply_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/(\d+)\s+").expect("reply regex"))
}

fn file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([=/^$])([^\s:]+)(?::(\d+))?\s+").expect("file regex"))
}

/// Parse one message into a command.
///
/// Rules are checked in order: thread reply, then file open, else `Normal`.
/// A regex that does not match from the start of the string never fires
/// partially; the whole content is `Normal`. Digits too large for their
/// integer type also demote the message to `Normal`.
pub fn parse(content: &str) -> Command {
    if let Some(caps) = reply_regex().captures(content) {
        let matched = caps.get(0).expect("whole match");
        if let Ok(thread) = caps[1].parse::<u64>() {
            return Command::Reply {
                thread,
                body: content[matched.end()..].to_string(),
            };
        }
        return Command::Normal;
    }

    if let Some(caps) = file_regex().captures(content) {
        let matched = caps.get(0).expect("whole match");
        let mode = match &caps[1] {
            "/" => MatchMode::Contains,
            "^" => MatchMode::Prefix,
            "$" => MatchMode::Suffix,
            "=" => MatchMode::Exact,
            other => unreachable!("leader {other} outside the regex class"),
        };
        let line = match caps.get(3) {
            Some(digits) => match digits.as_str().parse::<i64>() {
                Ok(one_based) => Some(one_based - 1),
                Err(_) => return Command::Normal,
            },
            None => None,
        };
        return Command::OpenThread {
            mode,
            pattern: caps[2].to_string(),
            line,
            body: content[matched.end()..].to_string(),
        };
    }

    Command::Normal
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn open(mode: MatchMode, pattern: &str, line: Option<i64>, body: &str) -> Command {
        Command::OpenThread {
            mode,
            pattern: pattern.to_string(),
            line,
            body: body.to_string(),
        }
    }

    #[test]
    fn reply_command() {
        assert_eq!(
            parse("/42 fix this"),
            Command::Reply {
                thread: 42,
                body: "fix this".to_string()
            }
        );
    }

    #[test]
    fn open_with_line_is_contains_and_zero_based() {
        assert_eq!(
            parse("/main.go:10 check"),
            open(MatchMode::Contains, "main.go", Some(9), "check")
        );
    }

    #[test]
    fn open_without_line_is_file_level() {
        assert_eq!(
            parse("=exact.go please"),
            open(MatchMode::Exact, "exact.go", None, "please")
        );
        assert_eq!(
            parse("^src/main rename?"),
            open(MatchMode::Prefix, "src/main", None, "rename?")
        );
        assert_eq!(
            parse("$.rs tail call"),
            open(MatchMode::Suffix, ".rs", None, "tail call")
        );
    }

    #[test]
    fn plain_chat_is_normal() {
        assert_eq!(parse("hello"), Command::Normal);
        assert_eq!(parse(""), Command::Normal);
    }

    #[test]
    fn reply_beats_file_open_for_numeric_selectors() {
        // "/42" could read as a contains-pattern too; the reply rule wins.
        assert_eq!(
            parse("/42 hi"),
            Command::Reply {
                thread: 42,
                body: "hi".to_string()
            }
        );
        // A line suffix breaks the digits-then-space shape, so this one is a
        // file open on the pattern "42".
        assert_eq!(
            parse("/42:7 hi"),
            open(MatchMode::Contains, "42", Some(6), "hi")
        );
    }

    #[test]
    fn no_partial_matches() {
        // Missing the trailing whitespace: not a command.
        assert_eq!(parse("/42"), Command::Normal);
        assert_eq!(parse("=exact.go"), Command::Normal);
        // Not anchored at the start: not a command.
        assert_eq!(parse(" /42 hi"), Command::Normal);
        // Colon with no digits: the pattern token may not contain ':'.
        assert_eq!(parse("/a.go: hi"), Command::Normal);
    }

    #[test]
    fn line_zero_parses_to_minus_one() {
        assert_eq!(
            parse("/a.go:0 first"),
            open(MatchMode::Contains, "a.go", Some(-1), "first")
        );
    }

    #[test]
    fn oversized_digits_demote_to_normal() {
        assert_eq!(parse("/99999999999999999999999999 hi"), Command::Normal);
        assert_eq!(
            parse("/a.go:99999999999999999999999999 hi"),
            Command::Normal
        );
    }

    #[test]
    fn pattern_case_is_preserved() {
        assert_eq!(
            parse("/Main.GO:3 case"),
            open(MatchMode::Contains, "Main.GO", Some(2), "case")
        );
    }

    #[test]
    fn body_keeps_everything_after_the_match() {
        assert_eq!(
            parse("/7 one two  three"),
            Command::Reply {
                thread: 7,
                body: "one two  three".to_string()
            }
        );
    }
}
