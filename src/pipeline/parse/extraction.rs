use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{is_none_marker, non_empty_lines, section};

pub const NO_TEXT_EXTRACTED: &str = "No text could be extracted from the image.";

/// Lowest confidence reported for a parsed model answer.
pub const CONFIDENCE_FLOOR: u8 = 80;

/// Confidence assumed when the answer has no `CONFIDENCE:` line.
pub const DEFAULT_CONFIDENCE: u8 = 90;

static TEXT_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)TEXT:\s*").unwrap());
static TEXT_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)MATH:|CONFIDENCE:").unwrap());
static MATH_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)MATH:\s*").unwrap());
static MATH_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)CONFIDENCE:").unwrap());
static CONFIDENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CONFIDENCE:\s*(\d+)").unwrap());

/// Typed result of an OCR answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionFields {
    pub text: String,
    pub math_equations: Vec<String>,
    pub confidence: u8,
}

/// Parse a `TEXT:` / `MATH:` / `CONFIDENCE:` answer.
///
/// - `TEXT:` runs to `MATH:`, `CONFIDENCE:` or the end.
/// - `MATH:` lines are kept unless the section says there are none.
/// - Without a usable `TEXT:` section the whole answer becomes the text
///   and any math lines are dropped.
/// - Confidence defaults to 90, is raised to at least 80 and capped at 100.
pub fn parse_extraction_response(response: &str) -> ExtractionFields {
    let mut text = section(response, &TEXT_START, Some(&TEXT_END))
        .unwrap_or_default()
        .to_string();

    let mut math_equations: Vec<String> = match section(response, &MATH_START, Some(&MATH_END)) {
        Some(content) if !content.is_empty() && !is_no_math(content) => {
            non_empty_lines(content).map(str::to_string).collect()
        }
        _ => Vec::new(),
    };

    let confidence = CONFIDENCE
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
        .unwrap_or(DEFAULT_CONFIDENCE as u64);

    if text.is_empty() && !response.is_empty() {
        text = response.to_string();
        math_equations.clear();
    }

    if text.trim().is_empty() {
        text = NO_TEXT_EXTRACTED.to_string();
    }

    ExtractionFields {
        text,
        math_equations,
        confidence: confidence.clamp(CONFIDENCE_FLOOR as u64, 100) as u8,
    }
}

fn is_no_math(content: &str) -> bool {
    is_none_marker(content) || content.eq_ignore_ascii_case("No mathematical equations found")
}
