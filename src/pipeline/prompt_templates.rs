//! Instruction strings sent to the vision model.
//!
//! Each prompt pins down a response layout (`TEXT:` / `CONFIDENCE:`,
//! `VISUAL_ELEMENTS_FOUND:` / `COORDINATES:`, ...) that the parsers in
//! `pipeline::parse` read back.

use super::gemini::ResponseModality;
use super::render::FileKind;

/// Default extraction prompt, specialised for a PDF page or an image.
pub fn ocr_prompt(kind: Option<FileKind>) -> String {
    let noun = kind.map(|k| k.prompt_noun()).unwrap_or("image");
    format!(
        "You are an expert OCR system. Extract ALL visible text from this {noun} with maximum accuracy.

CRITICAL INSTRUCTIONS:
1. Extract EVERY piece of text visible in the image, no matter how small
2. Maintain exact formatting, spacing, and line breaks as they appear
3. Support multiple languages: English, Bengali/Bangla
4. Identify mathematical equations, formulas, symbols, and special characters
5. **Vector Notation**: Recognize vector arrows above characters (e.g., AB, AC). Represent them by placing a combining overline character (U+0305) over EACH character in the vector to form a single continuous line (e.g., A\u{0305}B\u{0305}, A\u{0305}C\u{0305}).
6. Pay special attention to small text, footnotes, and captions
7. Preserve table structures and bullet points if present
8. Return clean, readable text without adding commentary
9. Extract text systematically from top to bottom, left to right

Format your response as:
TEXT: [all extracted text here, maintaining original structure]
CONFIDENCE: [your confidence percentage 85-98]"
    )
}

pub const DETECTION_PROMPT: &str = "Analyze this image and identify ONLY non-text visual elements. I want to find:

INCLUDE THESE:
- Photographs, pictures, illustrations
- Diagrams, flowcharts, technical drawings
- Charts, graphs, plots
- Maps, architectural drawings
- Logos, symbols, icons (non-text)
- Hand-drawn sketches or artwork
- Scientific diagrams, molecular structures
- Engineering blueprints
- Geometric shapes and patterns
- Any visual content that is NOT readable text

EXCLUDE THESE:
- Plain text paragraphs
- Headings and titles
- Numbers and mathematical equations (unless they're part of a diagram)
- Tables with text content
- Text-based lists or bullet points

For each NON-TEXT visual element found, provide the bounding box coordinates as percentages.

Respond in this exact format:
VISUAL_ELEMENTS_FOUND: [number]
COORDINATES: [for each visual element: \"x_percent,y_percent,width_percent,height_percent,description\" one per line, or \"None\" if no visual elements]

Example:
VISUAL_ELEMENTS_FOUND: 2
COORDINATES:
15,25,40,30,photograph of a building exterior
60,10,35,45,flowchart diagram showing process steps";

/// Second-pass correction prompt embedding the previously extracted text.
pub fn qac_prompt(text: &str) -> String {
    format!(
        "You are an expert text correction specialist. Analyze the following OCR-extracted text and perform comprehensive quality assurance:

**CRITICAL INSTRUCTIONS FOR TEXT CORRECTION:**
1. Fix spelling mistakes, grammar errors, punctuation issues
2. Correct word spacing problems and character recognition errors
3. Fix formatting inconsistencies and language-specific errors
4. Maintain original meaning and structure - don't change correct text
5. Preserve the same language (don't translate)

Original Text to Correct:
{text}

Please respond in this exact format:
CORRECTED_TEXT: [the fully corrected text]
FIXES: [list each fix in format: \"ORIGINAL|CORRECTED|ERROR_TYPE|DESCRIPTION\" one per line, or \"None\" if no fixes needed]"
    )
}

/// Structured correction prompt; the answer must be a JSON object.
pub fn correction_prompt(text: &str) -> String {
    format!(
        "You are an AI expert in correcting text and identifying errors. Your primary goal is to fix mistakes while preserving the original structure and formatting of the text as closely as possible.

You will receive extracted text that may contain spelling mistakes, grammatical errors, or other inaccuracies. Your task is to:

1.  Correct any errors in the extracted text to produce a clean, accurate version.
2.  **Crucially, maintain the original line breaks, indentation, and general formatting of the text.** Do not combine paragraphs or alter the layout unless it's essential for correcting a grammatical error.
3.  Identify the specific corrections you made.
4.  Summarize these corrections in a structured format, showing the original and corrected text for each change.

Extracted Text: {text}

Respond with a single JSON object and nothing else, using exactly this shape:
{{\"correctedText\": \"...\", \"correctionsSummary\": [{{\"original\": \"...\", \"corrected\": \"...\"}}]}}

Make sure that the outputted JSON is parseable.

If the extracted text contains no errors, then the correctedText should be the same as the extracted text, and correctionsSummary should be an empty array."
    )
}

pub const MAPPING_PROMPT: &str = "Create an enhanced, improved version of this image. Analyze the visual content and recreate it with:

1. **Better clarity and sharpness**
2. **Enhanced colors and contrast**
3. **Improved composition and layout**
4. **Professional artistic quality**
5. **Clean, refined details**

Generate a detailed description that can be used to create a superior version of this image.

Format your response as:
ENHANCED_DESCRIPTION: [detailed description for creating enhanced version]
IMPROVEMENT_NOTES: [specific enhancements made]
ARTISTIC_STYLE: [recommended artistic approach]";

const REDRAW_PROMPT: &str = "Recreate this image exactly as shown, maintaining all details. Keep transparent background if present. Do not add, remove, or modify any elements including text. Make it cleaner and higher quality while preserving everything exactly.";

const COLORIZE_PROMPT: &str = "Recreate this image exactly as shown, maintaining all details, and add natural, realistic colors. Do not add, remove, or modify any elements including text. Keep the layout, shapes and proportions identical. Make it cleaner and higher quality while preserving everything exactly.";

const REDRAW_FALLBACK_PROMPT: &str = "Generate a clean, high-quality copy of this image with identical content and layout.";

const COLORIZE_FALLBACK_PROMPT: &str = "Generate a clean, high-quality, naturally colored copy of this image with identical content and layout.";

/// One attempt in the enhance fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnhanceVariant {
    pub name: &'static str,
    pub prompt: &'static str,
    pub modalities: &'static [ResponseModality],
}

const IMAGE_ONLY: &[ResponseModality] = &[ResponseModality::Image];
const IMAGE_AND_TEXT: &[ResponseModality] = &[ResponseModality::Image, ResponseModality::Text];

/// Ordered redraw attempts: image-only answer first, then image plus
/// text, then a shorter instruction.
pub fn enhance_variants(colorize: bool) -> [EnhanceVariant; 3] {
    let (primary, fallback) = if colorize {
        (COLORIZE_PROMPT, COLORIZE_FALLBACK_PROMPT)
    } else {
        (REDRAW_PROMPT, REDRAW_FALLBACK_PROMPT)
    };
    [
        EnhanceVariant {
            name: "primary",
            prompt: primary,
            modalities: IMAGE_ONLY,
        },
        EnhanceVariant {
            name: "primary_with_text",
            prompt: primary,
            modalities: IMAGE_AND_TEXT,
        },
        EnhanceVariant {
            name: "simplified",
            prompt: fallback,
            modalities: IMAGE_AND_TEXT,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_prompt_names_document_kind() {
        assert!(ocr_prompt(Some(FileKind::Pdf)).contains("from this PDF page with"));
        assert!(ocr_prompt(Some(FileKind::Image)).contains("from this image with"));
        assert!(ocr_prompt(None).contains("from this image with"));
    }

    #[test]
    fn ocr_prompt_requests_markers() {
        let prompt = ocr_prompt(Some(FileKind::Pdf));
        assert!(prompt.contains("TEXT: ["));
        assert!(prompt.contains("CONFIDENCE: ["));
        assert!(prompt.contains("Bengali/Bangla"));
        assert!(prompt.contains("A\u{0305}B\u{0305}"));
    }

    #[test]
    fn detection_prompt_has_format() {
        assert!(DETECTION_PROMPT.contains("VISUAL_ELEMENTS_FOUND: [number]"));
        assert!(DETECTION_PROMPT.contains("COORDINATES:"));
    }

    #[test]
    fn qac_prompt_embeds_text() {
        let prompt = qac_prompt("Helo wrld");
        assert!(prompt.contains("Original Text to Correct:\nHelo wrld\n"));
        assert!(prompt.contains("CORRECTED_TEXT:"));
        assert!(prompt.contains("ORIGINAL|CORRECTED|ERROR_TYPE|DESCRIPTION"));
    }

    #[test]
    fn correction_prompt_asks_for_json() {
        let prompt = correction_prompt("teh cat");
        assert!(prompt.contains("Extracted Text: teh cat"));
        assert!(prompt.contains("\"correctionsSummary\""));
    }

    #[test]
    fn mapping_prompt_sections() {
        for marker in ["ENHANCED_DESCRIPTION:", "IMPROVEMENT_NOTES:", "ARTISTIC_STYLE:"] {
            assert!(MAPPING_PROMPT.contains(marker), "missing {marker}");
        }
    }

    #[test]
    fn enhance_variants_are_ordered() {
        let variants = enhance_variants(false);
        assert_eq!(variants[0].modalities, &[ResponseModality::Image]);
        assert_eq!(variants[1].prompt, variants[0].prompt);
        assert_eq!(variants[1].modalities.len(), 2);
        assert_ne!(variants[2].prompt, variants[0].prompt);
        assert!(variants[0].prompt.starts_with("Recreate this image exactly as shown"));
    }

    #[test]
    fn colorize_variants_mention_color() {
        for variant in enhance_variants(true) {
            assert!(variant.prompt.contains("color"), "{} lacks color", variant.name);
        }
    }
}
