use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{is_none_marker, non_empty_lines, section};

static CORRECTED_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CORRECTED_TEXT:\s*").unwrap());
static FIXES_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)FIXES:\s*").unwrap());
static FIXES_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)FIXES:").unwrap());

/// One correction reported by the quality assurance pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QacFix {
    pub original: String,
    pub corrected: String,
    #[serde(rename = "type")]
    pub fix_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QacResult {
    pub corrected_text: String,
    pub fixes: Vec<QacFix>,
}

/// Parse a `CORRECTED_TEXT:` / `FIXES:` answer.
///
/// Fix lines are `ORIGINAL|CORRECTED|TYPE|DESCRIPTION`; lines with fewer
/// than four fields are skipped, extra `|` stay in the description.
/// Without a `CORRECTED_TEXT:` section the whole answer is the corrected text.
pub fn parse_qac_response(response: &str) -> QacResult {
    let corrected = section(response, &CORRECTED_START, Some(&FIXES_MARKER)).unwrap_or_default();

    let fixes = match section(response, &FIXES_START, None) {
        Some(content) if !content.is_empty() && !is_none_marker(content) => {
            non_empty_lines(content).filter_map(parse_fix_line).collect()
        }
        _ => Vec::new(),
    };

    QacResult {
        corrected_text: if corrected.is_empty() {
            response.to_string()
        } else {
            corrected.to_string()
        },
        fixes,
    }
}

fn parse_fix_line(line: &str) -> Option<QacFix> {
    let line = line.trim_start_matches(['-', '*', '•']).trim().trim_matches('"');
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 4 {
        return None;
    }
    Some(QacFix {
        original: parts[0].trim().to_string(),
        corrected: parts[1].trim().to_string(),
        fix_type: parts[2].trim().to_string(),
        description: parts[3..].join("|").trim().to_string(),
    })
}
