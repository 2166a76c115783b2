use serde::{Deserialize, Serialize};

use super::ParseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionEntry {
    pub original: String,
    pub corrected: String,
}

/// Result of the structured correction flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionSummary {
    pub corrected_text: String,
    #[serde(default)]
    pub corrections_summary: Vec<CorrectionEntry>,
}

/// Parse the JSON object of a correction answer.
///
/// Models often wrap JSON in a Markdown code fence or add a sentence
/// around it, so the outermost `{ ... }` span is parsed.
pub fn parse_correction_json(response: &str) -> Result<CorrectionSummary, ParseError> {
    let start = response.find('{').ok_or(ParseError::NoJson)?;
    let end = response.rfind('}').ok_or(ParseError::NoJson)?;
    if end < start {
        return Err(ParseError::NoJson);
    }
    serde_json::from_str(&response[start..=end]).map_err(|e| ParseError::InvalidJson(e.to_string()))
}
