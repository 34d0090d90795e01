//! Translation catalog model, lookup, and quality reports.
//!
//! # Invariants
//!
//! 1. **Lookup key**: within a context, `(source, comment)` is the effective
//!    key. Files produced mid-merge can violate uniqueness; lookup resolves
//!    to the first occurrence and `duplicate_keys()` reports the rest.
//!
//! 2. **Unfinished means no payload**: an unfinished message carries no
//!    translation text. Consumers fall back to the source string.
//!
//! 3. **Order is preserved**: context and message order is not semantically
//!    meaningful but survives a parse/serialize round trip so diffs stay
//!    minimal.
//!
//! 4. **Thread safety**: `Catalog` is `Send + Sync` (immutable after
//!    construction).
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Missing key | No such `(source, comment)` in context | `lookup` returns `None` |
//! | Missing context | No context with that name | `lookup` returns `None` |
//! | Duplicate key | Upstream merge artifact | Warning via `duplicate_keys()`, never fatal |
//! | Placeholder drift | `%N` sets differ between source and translation | Reported by `placeholder_mismatches()` |

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::slice;

/// Errors from parsing or serializing a TS document.
///
/// Malformed input is rejected outright: these files are machine-regenerated
/// and hand-merged, so a silent partial parse would corrupt translator work.
#[derive(Debug, Clone)]
pub enum FormatError {
    /// The markup is not well-formed, or an element appears where the TS
    /// structure does not allow one. `pos` is a byte offset into the input.
    Xml {
        /// Byte offset where the problem was detected.
        pos: usize,
        /// Human-readable description from the underlying reader.
        message: String,
    },
    /// A `<context>` block ended without a `<name>` child.
    MissingContextName {
        /// Byte offset of the closing tag.
        pos: usize,
    },
    /// A `<message>` block ended without a `<source>` child.
    MissingSource {
        /// Name of the enclosing context.
        context: String,
        /// Byte offset of the closing tag.
        pos: usize,
    },
    /// The serializer failed to emit output.
    Write(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xml { pos, message } => write!(f, "malformed TS markup at byte {pos}: {message}"),
            Self::MissingContextName { pos } => {
                write!(f, "context without a <name> (ends at byte {pos})")
            }
            Self::MissingSource { context, pos } => {
                write!(
                    f,
                    "message without a <source> in context '{context}' (ends at byte {pos})"
                )
            }
            Self::Write(message) => write!(f, "failed to serialize TS markup: {message}"),
        }
    }
}

impl std::error::Error for FormatError {}

/// Translation state of a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// A literal translation, possibly identical to the source text.
    Finished(String),
    /// Explicitly marked as not yet translated; no payload.
    Unfinished,
}

impl Translation {
    /// Whether the message has a translation payload.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    /// The translation text, or `None` when unfinished.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Finished(text) => Some(text),
            Self::Unfinished => None,
        }
    }
}

/// A single translatable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Untranslated text. May contain `%1`-style placeholders, embedded
    /// newlines, and markup entities.
    pub source: String,
    /// Disambiguation comment: distinguishes messages sharing identical
    /// source text within one context. Part of the lookup key.
    pub comment: Option<String>,
    /// Extra developer commentary for translators. Not part of the key.
    pub extracomment: Option<String>,
    /// Translation state.
    pub translation: Translation,
}

impl Message {
    /// A finished message with no disambiguation.
    #[must_use]
    pub fn finished(source: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            comment: None,
            extracomment: None,
            translation: Translation::Finished(translation.into()),
        }
    }

    /// An unfinished message with no disambiguation.
    #[must_use]
    pub fn unfinished(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            comment: None,
            extracomment: None,
            translation: Translation::Unfinished,
        }
    }
}

/// A named grouping of messages from one originating UI component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// Component name, e.g. `"QFileDialog"`.
    pub name: String,
    /// Messages in document order.
    pub messages: Vec<Message>,
}

impl Context {
    /// An empty context.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Vec::new(),
        }
    }
}

/// A whole TS document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    /// Target language tag from the root element, e.g. `"ka_GE"`.
    pub language: Option<String>,
    /// Format version from the root element, e.g. `"2.1"`.
    pub version: Option<String>,
    /// Free-form header metadata (top-level non-context elements). The
    /// mapping is order-irrelevant; serialization orders it by key.
    pub headers: std::collections::BTreeMap<String, String>,
    /// Contexts in document order.
    pub contexts: Vec<Context>,
}

impl Catalog {
    /// Deserialize a TS document.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] on malformed markup, a context without a
    /// name, or a message without source text. Duplicate keys are logged as
    /// warnings, not rejected.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        crate::reader::parse(bytes)
    }

    /// Serialize into canonical byte-stable form.
    ///
    /// The same logical catalog always yields byte-identical output, and
    /// `Catalog::parse` of the result reproduces this catalog exactly.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Write`] if the underlying writer fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        crate::writer::serialize(self)
    }

    /// Exact-key lookup: the message with this source text and
    /// disambiguation comment inside the named context.
    ///
    /// First occurrence wins when duplicates exist.
    #[must_use]
    pub fn lookup(&self, context: &str, source: &str, comment: Option<&str>) -> Option<&Message> {
        self.contexts
            .iter()
            .find(|c| c.name == context)?
            .messages
            .iter()
            .find(|m| m.source == source && m.comment.as_deref() == comment)
    }

    /// Lazy iterator over `(context name, source text)` for every message
    /// whose translation is unfinished, and only those. Restartable: each
    /// call returns a fresh iterator.
    #[must_use]
    pub fn unfinished(&self) -> Unfinished<'_> {
        Unfinished {
            contexts: self.contexts.iter(),
            current: None,
        }
    }

    /// Every `(context, source, comment)` key occurring more than once
    /// within its context, with the total occurrence count.
    ///
    /// Upstream extraction tools can legitimately produce duplicates
    /// mid-merge, so this is a quality warning rather than a parse error.
    #[must_use]
    pub fn duplicate_keys(&self) -> Vec<DuplicateKey> {
        let mut out = Vec::new();
        for context in &self.contexts {
            let mut counts: HashMap<(&str, Option<&str>), usize> = HashMap::new();
            for message in &context.messages {
                *counts
                    .entry((&message.source, message.comment.as_deref()))
                    .or_insert(0) += 1;
            }
            let mut dups: Vec<_> = counts.into_iter().filter(|&(_, n)| n > 1).collect();
            dups.sort_unstable();
            for ((source, comment), count) in dups {
                out.push(DuplicateKey {
                    context: context.name.clone(),
                    source: source.to_string(),
                    comment: comment.map(str::to_string),
                    count,
                });
            }
        }
        out
    }

    /// Context names appearing more than once in the catalog.
    #[must_use]
    pub fn duplicate_contexts(&self) -> Vec<DuplicateContext> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for context in &self.contexts {
            *counts.entry(&context.name).or_insert(0) += 1;
        }
        let mut dups: Vec<_> = counts.into_iter().filter(|&(_, n)| n > 1).collect();
        dups.sort_unstable();
        dups.into_iter()
            .map(|(name, count)| DuplicateContext {
                name: name.to_string(),
                count,
            })
            .collect()
    }

    /// Finished messages whose translation uses a different set of `%N`
    /// placeholders than the source text.
    ///
    /// The format does not enforce placeholder consistency; this surfaces
    /// the quality invariant for tooling users.
    #[must_use]
    pub fn placeholder_mismatches(&self) -> Vec<PlaceholderMismatch> {
        let mut out = Vec::new();
        for context in &self.contexts {
            for message in &context.messages {
                let Translation::Finished(translated) = &message.translation else {
                    continue;
                };
                let expected = placeholder_indices(&message.source);
                let actual = placeholder_indices(translated);
                if expected == actual {
                    continue;
                }
                out.push(PlaceholderMismatch {
                    context: context.name.clone(),
                    source: message.source.clone(),
                    comment: message.comment.clone(),
                    missing: expected.difference(&actual).copied().collect(),
                    extra: actual.difference(&expected).copied().collect(),
                });
            }
        }
        out
    }

    /// Per-context and overall translation coverage.
    #[must_use]
    pub fn coverage(&self) -> CoverageReport {
        let contexts: Vec<ContextCoverage> = self
            .contexts
            .iter()
            .map(|context| {
                let total = context.messages.len();
                let finished = context
                    .messages
                    .iter()
                    .filter(|m| m.translation.is_finished())
                    .count();
                ContextCoverage {
                    name: context.name.clone(),
                    total,
                    finished,
                    unfinished: total - finished,
                    percent: percent(finished, total),
                }
            })
            .collect();

        let total = contexts.iter().map(|c| c.total).sum();
        let finished = contexts.iter().map(|c| c.finished).sum();
        CoverageReport {
            total,
            finished,
            unfinished: total - finished,
            percent: percent(finished, total),
            contexts,
        }
    }
}

/// Iterator behind [`Catalog::unfinished`].
#[derive(Debug, Clone)]
pub struct Unfinished<'a> {
    contexts: slice::Iter<'a, Context>,
    current: Option<(&'a str, slice::Iter<'a, Message>)>,
}

impl<'a> Iterator for Unfinished<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((name, messages)) = &mut self.current {
                for message in messages.by_ref() {
                    if !message.translation.is_finished() {
                        return Some((name, &message.source));
                    }
                }
            }
            let context = self.contexts.next()?;
            self.current = Some((&context.name, context.messages.iter()));
        }
    }
}

/// A `(source, comment)` key occurring more than once within one context.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DuplicateKey {
    /// Enclosing context name.
    pub context: String,
    /// Duplicated source text.
    pub source: String,
    /// Disambiguation comment of the duplicated key.
    pub comment: Option<String>,
    /// Total occurrences (always >= 2).
    pub count: usize,
}

/// A context name appearing more than once in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DuplicateContext {
    /// Duplicated context name.
    pub name: String,
    /// Total occurrences (always >= 2).
    pub count: usize,
}

/// A finished message whose `%N` placeholder set drifted from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PlaceholderMismatch {
    /// Enclosing context name.
    pub context: String,
    /// Source text of the affected message.
    pub source: String,
    /// Disambiguation comment of the affected message.
    pub comment: Option<String>,
    /// Placeholders present in the source but absent from the translation.
    pub missing: Vec<u32>,
    /// Placeholders present in the translation but absent from the source.
    pub extra: Vec<u32>,
}

/// Translation coverage for one context.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContextCoverage {
    /// Context name.
    pub name: String,
    /// Message count.
    pub total: usize,
    /// Finished messages.
    pub finished: usize,
    /// Unfinished messages.
    pub unfinished: usize,
    /// Finished as a percentage (0.0–100.0; empty contexts count as 100).
    pub percent: f32,
}

/// Catalog-wide translation coverage.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CoverageReport {
    /// Total messages across all contexts.
    pub total: usize,
    /// Finished messages.
    pub finished: usize,
    /// Unfinished messages.
    pub unfinished: usize,
    /// Finished as a percentage (0.0–100.0; an empty catalog counts as 100).
    pub percent: f32,
    /// Per-context breakdown in document order.
    pub contexts: Vec<ContextCoverage>,
}

fn percent(finished: usize, total: usize) -> f32 {
    if total == 0 {
        100.0
    } else {
        (finished as f32 / total as f32) * 100.0
    }
}

/// Collect the numbered `%N` placeholders of a string.
///
/// Recognizes `%1`..`%99` and the locale-aware `%L1` form. A `%` not
/// followed by a digit is literal text.
fn placeholder_indices(text: &str) -> BTreeSet<u32> {
    let mut out = BTreeSet::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        if j < bytes.len() && bytes[j] == b'L' {
            j += 1;
        }
        let mut value: u32 = 0;
        let mut digits = 0;
        while j < bytes.len() && digits < 2 && bytes[j].is_ascii_digit() {
            value = value * 10 + u32::from(bytes[j] - b'0');
            digits += 1;
            j += 1;
        }
        if digits > 0 {
            out.insert(value);
            i = j;
        } else {
            i += 1;
        }
    }
    out
}
