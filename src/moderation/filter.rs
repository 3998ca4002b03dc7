//! Word-list filtering with regex patterns.
//!
//! Messages are checked against three lists: banned words get the author
//! banned, warned words raise an alert unless a false-positive pattern
//! also matches.

use fancy_regex::Regex;
use tracing::warn;

use crate::config::types::CensorshipLists;

/// Outcome of checking a message against the word lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing matched.
    Clean,
    /// A banned-list entry matched.
    Banned,
    /// A warned-list entry matched and no false-positive entry did.
    Warned,
}

/// Word filter that checks messages against the censorship lists.
#[derive(Debug, Clone)]
pub struct WordFilter {
    banned: Vec<CompiledPattern>,
    warned: Vec<CompiledPattern>,
    false_positive: Vec<CompiledPattern>,
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl WordFilter {
    /// Build a filter from the loaded lists.
    ///
    /// Invalid regex patterns are logged and skipped.
    pub fn new(lists: &CensorshipLists) -> Self {
        Self {
            banned: compile_patterns(&lists.banned),
            warned: compile_patterns(&lists.warned),
            false_positive: compile_patterns(&lists.false_positive),
        }
    }

    /// Returns true if the message matches any banned-list entry.
    pub fn is_banned(&self, message: &str) -> bool {
        !message.is_empty() && matches_any(&self.banned, message)
    }

    /// Returns true if the message matches a warned-list entry and no false-positive entry.
    pub fn is_warned(&self, message: &str) -> bool {
        if message.is_empty() || matches_any(&self.false_positive, message) {
            return false;
        }
        matches_any(&self.warned, message)
    }

    /// Classify a message. The body is lowercased before matching.
    pub fn check(&self, message: &str) -> Verdict {
        let lowered = message.to_lowercase();
        if self.is_banned(&lowered) {
            Verdict::Banned
        } else if self.is_warned(&lowered) {
            Verdict::Warned
        } else {
            Verdict::Clean
        }
    }

    /// Number of usable patterns per list: (banned, warned, false-positive).
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.banned.len(), self.warned.len(), self.false_positive.len())
    }
}

fn matches_any(patterns: &[CompiledPattern], message: &str) -> bool {
    patterns.iter().any(|p| {
        p.regex.is_match(message).unwrap_or_else(|e| {
            warn!("Regex match error for pattern '{}': {}", p.original, e);
            false
        })
    })
}

/// Compile a list of regex pattern strings, skipping invalid ones.
fn compile_patterns(patterns: &[String]) -> Vec<CompiledPattern> {
    patterns
        .iter()
        .filter(|pattern| !pattern.is_empty())
        .filter_map(|pattern| match Regex::new(&format!("(?i){}", pattern)) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern.clone(),
                regex,
            }),
            Err(e) => {
                warn!("Invalid censorship pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}
