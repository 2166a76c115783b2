use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::section;

static DESCRIPTION_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ENHANCED_DESCRIPTION:\s*").unwrap());
static NOTES_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)IMPROVEMENT_NOTES:\s*").unwrap());
static STYLE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ARTISTIC_STYLE:\s*").unwrap());
static ANY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ENHANCED_DESCRIPTION:|IMPROVEMENT_NOTES:|ARTISTIC_STYLE:").unwrap()
});

/// Structured answer to the image mapping prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMapping {
    pub enhanced_description: String,
    pub improvement_notes: String,
    pub artistic_style: String,
}

/// Each section runs to the next known marker. When none of the markers are
/// present the trimmed answer becomes the description.
pub fn parse_mapping_response(response: &str) -> ImageMapping {
    let grab = |start: &Regex| {
        section(response, start, Some(&ANY_MARKER))
            .unwrap_or_default()
            .to_string()
    };

    let mapping = ImageMapping {
        enhanced_description: grab(&DESCRIPTION_START),
        improvement_notes: grab(&NOTES_START),
        artistic_style: grab(&STYLE_START),
    };

    if mapping == ImageMapping::default() {
        ImageMapping {
            enhanced_description: response.trim().to_string(),
            ..ImageMapping::default()
        }
    } else {
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_sections() {
        let response = "ENHANCED_DESCRIPTION: A crisp line drawing of a bridge.\nIMPROVEMENT_NOTES: Sharper edges, balanced contrast.\nARTISTIC_STYLE: Technical illustration";
        let mapping = parse_mapping_response(response);
        assert_eq!(mapping.enhanced_description, "A crisp line drawing of a bridge.");
        assert_eq!(mapping.improvement_notes, "Sharper edges, balanced contrast.");
        assert_eq!(mapping.artistic_style, "Technical illustration");
    }

    #[test]
    fn sections_in_any_order() {
        let response = "artistic_style: watercolor\nenhanced_description: a lake";
        let mapping = parse_mapping_response(response);
        assert_eq!(mapping.artistic_style, "watercolor");
        assert_eq!(mapping.enhanced_description, "a lake");
        assert!(mapping.improvement_notes.is_empty());
    }

    #[test]
    fn unstructured_answer_becomes_description() {
        let mapping = parse_mapping_response("  A cleaner version would use bolder lines. ");
        assert_eq!(mapping.enhanced_description, "A cleaner version would use bolder lines.");
        assert!(mapping.artistic_style.is_empty());
    }
}
