//! Insertion rules: a capture pattern plus the text inserted after each match.
//!
//! A rule's pattern must define two capture groups. Group 1 (the *head*) is the
//! declaration the insertion follows, group 2 (the *tail*) is the text that
//! closes the enclosing block. Every match is rewritten as
//! `head + separator + insertion + tail`; anything the pattern matched between
//! the two groups is dropped.
//!
//! Matching is purely textual. A rule depends on the target's exact whitespace
//! layout, and a formatting change in the target silently yields zero matches.
//! A match that spans a `\r\n` line break gets its inserted text and tail
//! written with `\r\n` too, so CRLF files stay CRLF.

use crate::edit::{Edit, EditVerification};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Default target of the built-in rule, relative to the workspace root.
pub const DEFAULT_TARGET: &str = "src/strategy/atomic_execution.rs";

/// A mock `backend_name` returning `"mock"` or `"MockBackend"`, directly
/// followed by the closing brace of its impl block.
pub const QUANTITY_STEP_PATTERN: &str =
    r#"(fn backend_name\(&self\) -> &str \{\s+(?:"mock"|"MockBackend")\s+\})\s*(\n\s*\})"#;

/// Stub `get_quantity_step` inserted into each matched mock backend.
pub const QUANTITY_STEP_METHOD: &str = "            async fn get_quantity_step(&self, _exchange: &str, _symbol: &str) -> Result<f64, Box<dyn Error + Send + Sync>> {\n                Ok(0.001)\n            }";

pub const QUANTITY_STEP_GUARD: &str = "fn get_quantity_step";

pub const QUANTITY_STEP_MESSAGE: &str =
    "Added get_quantity_step method to all MockBackend implementations";

/// Text placed between the head capture and the insertion.
pub const DEFAULT_SEPARATOR: &str = "\n\n";

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("pattern must define 2 capture groups (head, tail), found {found}")]
    MissingCaptures { found: usize },
}

/// A compiled pattern and the text inserted after each of its matches.
#[derive(Debug, Clone)]
pub struct InsertionRule {
    pattern: Regex,
    insertion: String,
    separator: String,
    guard: Option<String>,
}

impl InsertionRule {
    /// Compile a rule. The pattern must define at least two capture groups.
    pub fn new(pattern: &str, insertion: impl Into<String>) -> Result<Self, RuleError> {
        let pattern = Regex::new(pattern)?;

        // captures_len() counts the implicit whole-match group
        let found = pattern.captures_len() - 1;
        if found < 2 {
            return Err(RuleError::MissingCaptures { found });
        }

        Ok(Self {
            pattern,
            insertion: insertion.into(),
            separator: DEFAULT_SEPARATOR.to_string(),
            guard: None,
        })
    }

    /// The built-in rule: add `get_quantity_step` to every mock backend.
    pub fn quantity_step() -> Self {
        Self::new(QUANTITY_STEP_PATTERN, QUANTITY_STEP_METHOD)
            .expect("built-in quantity step pattern compiles with two groups")
            .with_guard(QUANTITY_STEP_GUARD)
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Text whose presence in a match's impl block marks the insertion as
    /// already made. Only consulted when `apply` is asked to skip existing.
    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn guard(&self) -> Option<&str> {
        self.guard.as_deref()
    }

    /// Build the replacement for one match.
    pub fn replacement(&self, head: &str, tail: &str) -> String {
        let mut out = String::with_capacity(
            head.len() + self.separator.len() + self.insertion.len() + tail.len(),
        );
        out.push_str(head);
        out.push_str(&self.separator);
        out.push_str(&self.insertion);
        out.push_str(tail);
        out
    }

    /// Rewrite every non-overlapping match in `source`, left to right.
    ///
    /// With `skip_existing`, matches whose impl block already contains the
    /// guard text are recorded but left untouched.
    pub fn apply(&self, source: &str, skip_existing: bool) -> Transform {
        let mut content = String::with_capacity(source.len());
        let mut matches = Vec::new();
        let mut replacements = Vec::new();

        let mut copied_to = 0;
        let mut line = 1;
        let mut line_cursor = 0;

        for caps in self.pattern.captures_iter(source) {
            let whole = caps.get(0).expect("group 0 always participates in a match");
            let head = caps.get(1).map_or("", |m| m.as_str());
            let tail = caps.get(2).map_or("", |m| m.as_str());

            line += source[line_cursor..whole.start()].matches('\n').count();
            line_cursor = whole.start();

            let skipped = skip_existing
                && self
                    .guard
                    .as_deref()
                    .is_some_and(|guard| block_contains(source, whole.start(), whole.end(), guard));

            content.push_str(&source[copied_to..whole.start()]);
            if skipped {
                debug!(line, "guard present, skipping match");
                content.push_str(whole.as_str());
            } else {
                debug!(line, "inserting after match");
                let mut replacement = self.replacement(head, tail);
                if whole.as_str().contains("\r\n") {
                    // Keep a CRLF target CRLF; head is source text and already is
                    replacement = format!("{head}{}", to_crlf(&replacement[head.len()..]));
                }
                content.push_str(&replacement);
                replacements.push(Replacement {
                    byte_start: whole.start(),
                    byte_end: whole.end(),
                    original: whole.as_str().to_string(),
                    replacement,
                });
            }
            copied_to = whole.end();

            matches.push(MatchSpan {
                byte_start: whole.start(),
                byte_end: whole.end(),
                line,
                head: head.to_string(),
                tail: tail.to_string(),
                skipped,
            });
        }
        content.push_str(&source[copied_to..]);

        Transform {
            content,
            matches,
            replacements,
        }
    }
}

/// One located match of a rule's pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub byte_start: usize,
    pub byte_end: usize,
    /// 1-based line of `byte_start`
    pub line: usize,
    pub head: String,
    pub tail: String,
    /// Guard text was found in the enclosing impl block
    pub skipped: bool,
}

/// A single span rewrite produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub byte_start: usize,
    pub byte_end: usize,
    /// Matched text, checked against the file before writing
    pub original: String,
    pub replacement: String,
}

impl Replacement {
    pub fn to_edit(&self) -> Edit {
        Edit::with_verification(
            self.byte_start,
            self.byte_end,
            self.replacement.clone(),
            EditVerification::from_text(&self.original),
        )
    }
}

/// Result of applying a rule to a source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    pub content: String,
    pub matches: Vec<MatchSpan>,
    pub replacements: Vec<Replacement>,
}

impl Transform {
    pub fn inserted(&self) -> usize {
        self.replacements.len()
    }

    pub fn skipped(&self) -> usize {
        self.matches.iter().filter(|m| m.skipped).count()
    }

    pub fn is_unchanged(&self) -> bool {
        self.replacements.is_empty()
    }
}

/// Rewrite every line break in `text` as `\r\n`.
fn to_crlf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

/// Check whether the line starting at the front of `rest` opens an impl.
fn is_impl_opener(rest: &str) -> bool {
    let line = rest.split('\n').next().unwrap_or("").trim_start();
    line.starts_with("impl ") || line.starts_with("impl<")
}

/// Byte offsets at which each line of `text` starts, offset by `base`.
fn line_starts(text: &str, base: usize) -> impl DoubleEndedIterator<Item = usize> + '_ {
    std::iter::once(base).chain(text.match_indices('\n').map(move |(i, _)| base + i + 1))
}

/// Check for `needle` in the impl block around `[start, end)`.
///
/// The block runs from the nearest line at or before `start` that opens an
/// `impl` to the next such line after `end` (or the ends of the source).
fn block_contains(source: &str, start: usize, end: usize, needle: &str) -> bool {
    let block_start = line_starts(&source[..start], 0)
        .rev()
        .find(|&at| is_impl_opener(&source[at..]))
        .unwrap_or(0);

    let block_end = line_starts(&source[end..], end)
        .skip(1)
        .find(|&at| is_impl_opener(&source[at..]))
        .unwrap_or(source.len());

    source[block_start..block_end].contains(needle)
}
