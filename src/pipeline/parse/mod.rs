//! Parsing of loosely structured model answers into typed fields.
//!
//! Every prompt asks for `MARKER: value` sections. Models follow the layout
//! most of the time but vary case, add Markdown, or drop sections, so each
//! parser has a defined fallback instead of failing.

pub mod correction;
pub mod detection;
pub mod extraction;
pub mod mapping;
pub mod qac;

pub use correction::*;
pub use detection::*;
pub use extraction::*;
pub use mapping::*;
pub use qac::*;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No JSON object found in model response")]
    NoJson,

    #[error("Invalid JSON in model response: {0}")]
    InvalidJson(String),
}

/// Text after the first `start` match, up to the first `end` match (or the
/// end of input), trimmed. `None` when `start` does not occur.
pub(crate) fn section<'a>(response: &'a str, start: &Regex, end: Option<&Regex>) -> Option<&'a str> {
    let m = start.find(response)?;
    let rest = &response[m.end()..];
    let stop = end
        .and_then(|re| re.find(rest))
        .map(|e| e.start())
        .unwrap_or(rest.len());
    Some(rest[..stop].trim())
}

/// Non-empty lines of a section, trimmed.
pub(crate) fn non_empty_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Whether a section body is an explicit "nothing here" answer.
pub(crate) fn is_none_marker(content: &str) -> bool {
    let trimmed = content.trim().trim_matches('"');
    trimmed.eq_ignore_ascii_case("none") || trimmed.eq_ignore_ascii_case("[none]")
}
