//! Text extraction and visual-element detection on a canvas.
//!
//! `perform_advanced_ocr` is the full extraction pass: gateway call with
//! the default OCR prompt, response parsing, then detection of non-text
//! visual elements on the same canvas. Neither step fails the pass: text
//! extraction falls back to a static message, detection to an empty list.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::gateway::{fallback_method, run_gateway, FALLBACK_RESPONSE};
use super::progress::ProgressSink;
use crate::pipeline::gemini::{preview, VisionClient};
use crate::pipeline::parse::{
    parse_detection_response, parse_extraction_response, DetectedRegion, ExtractionFields,
};
use crate::pipeline::prompt_templates::DETECTION_PROMPT;
use crate::pipeline::render::{crop_region_on_white, FileKind, PageBitmap};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// A non-text visual element cropped out of a canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedImage {
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub description: String,
    pub colorize: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    pub is_processing: bool,
    #[serde(skip)]
    pub bitmap: PageBitmap,
}

impl DetectedImage {
    fn from_region(region: DetectedRegion, bitmap: PageBitmap, stamp: i64) -> Self {
        Self {
            id: format!("visual_{}_{}", region.index, stamp),
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            description: region.description,
            colorize: false,
            enhanced_image_url: None,
            base64: None,
            is_processing: false,
            bitmap,
        }
    }
}

/// Everything one extraction pass produced.
#[derive(Debug, Clone)]
pub struct OcrOutcome {
    pub fields: ExtractionFields,
    pub extraction_method: String,
    pub detected_images: Vec<DetectedImage>,
    /// True when the model gave no usable answer and the static text was used.
    pub used_fallback: bool,
}

// ═══════════════════════════════════════════════════════════
// Extraction
// ═══════════════════════════════════════════════════════════

/// Extract text from `canvas`, then detect visual elements on it.
///
/// `ocr` receives the extraction milestones, `images` the detection ones.
pub fn perform_advanced_ocr(
    client: &dyn VisionClient,
    canvas: &PageBitmap,
    kind: FileKind,
    ocr: &dyn ProgressSink,
    images: &dyn ProgressSink,
) -> OcrOutcome {
    let start = std::time::Instant::now();
    ocr.report(0, "Initializing AI-powered text extraction...");
    ocr.report(20, "Preprocessing image...");

    ocr.report(30, "Connecting to Google Gemini AI...");
    let file_type = kind.to_string();
    let gateway = run_gateway(client, Some(&canvas.to_base64()), Some(&file_type), None);
    ocr.report(60, "Processing Gemini AI response...");

    let (fields, extraction_method, used_fallback) = match gateway.answer() {
        Some(answer) => {
            debug!(preview = %preview(answer), "OCR answer");
            let fields = parse_extraction_response(answer);
            let method = gateway.method.clone().unwrap_or_default();
            ocr.report(80, "Gemini AI extraction successful!");
            (fields, method, false)
        }
        None => {
            ocr.report(50, "OCR processing completed with limited results...");
            let fields = ExtractionFields {
                text: FALLBACK_RESPONSE.to_string(),
                math_equations: Vec::new(),
                confidence: 0,
            };
            (fields, fallback_method(Some(&file_type)), true)
        }
    };

    ocr.report(85, "Detecting non-text images...");
    let detected_images = detect_images(client, canvas, images);

    ocr.report(
        100,
        &format!("Text extraction completed using {extraction_method}!"),
    );
    info!(
        kind = %kind,
        method = %extraction_method,
        used_fallback,
        confidence = fields.confidence,
        math = fields.math_equations.len(),
        visual_elements = detected_images.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Extraction pass complete"
    );

    OcrOutcome {
        fields,
        extraction_method,
        detected_images,
        used_fallback,
    }
}

// ═══════════════════════════════════════════════════════════
// Detection
// ═══════════════════════════════════════════════════════════

/// Ask the model for non-text visual elements and crop each one.
///
/// Any failure yields an empty list.
pub fn detect_images(
    client: &dyn VisionClient,
    canvas: &PageBitmap,
    progress: &dyn ProgressSink,
) -> Vec<DetectedImage> {
    progress.report(20, "Analyzing for non-text visual elements...");
    let gateway = run_gateway(client, Some(&canvas.to_base64()), None, Some(DETECTION_PROMPT));
    progress.report(60, "Processing visual element detection...");

    let Some(answer) = gateway.answer() else {
        warn!("Visual element detection got no answer");
        progress.report(100, "Visual element detection failed");
        return Vec::new();
    };
    debug!(preview = %preview(answer), "Detection answer");

    let stamp = chrono::Utc::now().timestamp_millis();
    let mut found = Vec::new();
    for region in parse_detection_response(answer, canvas.width, canvas.height) {
        match crop_region_on_white(canvas, region.rect()) {
            Ok(bitmap) => {
                debug!(
                    description = %region.description,
                    x = region.x,
                    y = region.y,
                    width = region.width,
                    height = region.height,
                    "Detected visual element"
                );
                found.push(DetectedImage::from_region(region, bitmap, stamp));
            }
            Err(e) => {
                warn!(error = %e, "Visual element crop failed");
                progress.report(100, "Visual element detection failed");
                return Vec::new();
            }
        }
    }

    progress.report(
        100,
        &format!("Found {} non-text visual elements", found.len()),
    );
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gemini::{GeminiError, MockVisionClient};
    use crate::pipeline::ocr::progress::{NoopProgress, RecordingProgress};
    use crate::pipeline::render::crop::solid_canvas;

    const OCR_ANSWER: &str = "TEXT: Hello world\nMATH: E = mc^2\nCONFIDENCE: 95";
    const DETECTION_ANSWER: &str =
        "VISUAL_ELEMENTS_FOUND: 2\nCOORDINATES:\n10,10,50,20,bar chart, quarterly\n90,90,20,20,off canvas";

    #[test]
    fn successful_pass_parses_and_detects() {
        let canvas = solid_canvas(800, 1000, [255, 255, 255]);
        let mock = MockVisionClient::new("VISUAL_ELEMENTS_FOUND: 0")
            .with_replies(vec![Ok(OCR_ANSWER.into()), Ok(DETECTION_ANSWER.into())]);
        let ocr = RecordingProgress::new();
        let images = RecordingProgress::new();

        let outcome = perform_advanced_ocr(&mock, &canvas, FileKind::Pdf, &ocr, &images);

        assert!(!outcome.used_fallback);
        assert_eq!(outcome.fields.text, "Hello world");
        assert_eq!(outcome.fields.math_equations, vec!["E = mc^2"]);
        assert_eq!(outcome.fields.confidence, 95);
        assert_eq!(outcome.extraction_method, "Google Gemini AI (PDF)");

        assert_eq!(outcome.detected_images.len(), 1);
        let image = &outcome.detected_images[0];
        assert_eq!((image.x, image.y, image.width, image.height), (80, 100, 400, 200));
        assert_eq!(image.description, "bar chart, quarterly");
        assert!(image.id.starts_with("visual_0_"));
        assert_eq!((image.bitmap.width, image.bitmap.height), (400, 200));

        assert_eq!(ocr.percents(), vec![0, 20, 30, 60, 80, 85, 100]);
        assert_eq!(
            ocr.last_status().as_deref(),
            Some("Text extraction completed using Google Gemini AI (PDF)!")
        );
        assert_eq!(
            images.last_status().as_deref(),
            Some("Found 1 non-text visual elements")
        );
    }

    #[test]
    fn failed_model_uses_static_fallback() {
        let canvas = solid_canvas(100, 100, [255, 255, 255]);
        let mock = MockVisionClient::failing(GeminiError::Timeout(120));
        let ocr = RecordingProgress::new();
        let images = RecordingProgress::new();

        let outcome = perform_advanced_ocr(&mock, &canvas, FileKind::Image, &ocr, &images);

        assert!(outcome.used_fallback);
        assert_eq!(outcome.fields.text, FALLBACK_RESPONSE);
        assert_eq!(outcome.fields.confidence, 0);
        assert!(outcome.fields.math_equations.is_empty());
        assert_eq!(outcome.extraction_method, "Local Processing (IMAGE)");
        assert!(outcome.detected_images.is_empty());
        assert_eq!(ocr.percents(), vec![0, 20, 30, 60, 50, 85, 100]);
        assert_eq!(
            images.last_status().as_deref(),
            Some("Visual element detection failed")
        );
    }

    #[test]
    fn extraction_sends_canvas_with_default_prompt() {
        let canvas = solid_canvas(100, 100, [255, 255, 255]);
        let mock = MockVisionClient::new(OCR_ANSWER);
        perform_advanced_ocr(&mock, &canvas, FileKind::Pdf, &NoopProgress, &NoopProgress);

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].prompt.contains("PDF page"));
        assert!(calls[0].had_image);
        assert_eq!(calls[1].prompt, DETECTION_PROMPT);
        assert_eq!(calls[1].max_output_tokens, Some(6000));
    }

    #[test]
    fn detection_with_no_elements() {
        let canvas = solid_canvas(300, 300, [255, 255, 255]);
        let mock = MockVisionClient::new("VISUAL_ELEMENTS_FOUND: 0\nCOORDINATES: None");
        let progress = RecordingProgress::new();
        assert!(detect_images(&mock, &canvas, &progress).is_empty());
        assert_eq!(progress.percents(), vec![20, 60, 100]);
        assert_eq!(
            progress.last_status().as_deref(),
            Some("Found 0 non-text visual elements")
        );
    }

    #[test]
    fn detected_image_serializes_without_bitmap() {
        let canvas = solid_canvas(800, 1000, [255, 255, 255]);
        let mock = MockVisionClient::new(DETECTION_ANSWER);
        let found = detect_images(&mock, &canvas, &NoopProgress);
        let json = serde_json::to_value(&found[0]).unwrap();
        assert_eq!(json["description"], "bar chart, quarterly");
        assert_eq!(json["colorize"], false);
        assert_eq!(json["isProcessing"], false);
        assert!(json.get("bitmap").is_none());
        assert!(json.get("enhancedImageUrl").is_none());
    }
}
