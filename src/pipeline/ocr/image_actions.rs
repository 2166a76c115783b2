//! Actions on a single image: redraw/colorize, base64 export and the
//! descriptive "enhanced drawing" mapping.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::gateway::run_gateway;
use super::progress::ProgressSink;
use super::PipelineError;
use crate::pipeline::gemini::{preview, GeminiError, InlineImage, VisionClient};
use crate::pipeline::parse::{parse_mapping_response, ImageMapping};
use crate::pipeline::prompt_templates::{enhance_variants, MAPPING_PROMPT};
use crate::pipeline::render::PageBitmap;

/// Answer of the mapping action: parsed sections plus the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingOutcome {
    pub mapping: ImageMapping,
    pub raw_response: String,
}

/// Redraw `bitmap` through the image model, optionally colorized.
///
/// Prompt variants are tried in order until one returns an image. Errors
/// that another prompt cannot fix (missing key, transport) end the chain.
/// Returns the redrawn image as a data URI.
pub fn enhance_image(
    client: &dyn VisionClient,
    bitmap: &PageBitmap,
    colorize: bool,
    progress: &dyn ProgressSink,
) -> Result<String, PipelineError> {
    progress.report(30, "Submitting to AI for enhancement...");
    let source = InlineImage::png(bitmap.to_base64());
    let variants = enhance_variants(colorize);

    let mut attempts = 0;
    let mut last_error = GeminiError::EmptyResponse;
    for variant in &variants {
        attempts += 1;
        match client.generate_image(variant.prompt, &source, variant.modalities) {
            Ok(image) => {
                info!(
                    variant = variant.name,
                    attempts,
                    colorize,
                    mime = %image.mime_type,
                    "Image enhancement succeeded"
                );
                progress.report(100, "Image enhancement completed!");
                return Ok(image.to_data_uri());
            }
            Err(e) => {
                warn!(variant = variant.name, error = %e, "Enhance attempt failed");
                let retryable = e.is_retryable_with_other_prompt();
                last_error = e;
                if !retryable {
                    break;
                }
            }
        }
    }

    progress.report(100, "Image enhancement failed");
    Err(PipelineError::EnhanceFailed {
        attempts,
        reason: last_error.to_string(),
    })
}

/// PNG data URI of `bitmap`.
pub fn image_base64(bitmap: &PageBitmap, progress: &dyn ProgressSink) -> String {
    progress.report(50, "Converting to Base64...");
    let uri = bitmap.to_data_uri();
    progress.report(100, "Base64 conversion completed!");
    uri
}

/// Ask the text model for an enhanced-drawing description of `bitmap`.
pub fn map_image(
    client: &dyn VisionClient,
    bitmap: &PageBitmap,
    progress: &dyn ProgressSink,
) -> Result<MappingOutcome, PipelineError> {
    progress.report(40, "Creating AI-powered enhanced drawing...");
    let gateway = run_gateway(client, Some(&bitmap.to_base64()), None, Some(MAPPING_PROMPT));
    progress.report(80, "Processing AI drawing...");

    let Some(answer) = gateway.answer() else {
        progress.report(100, "Enhanced drawing mapping failed");
        return Err(PipelineError::MappingFailed(
            gateway.error.unwrap_or_else(|| "no answer".to_string()),
        ));
    };
    debug!(preview = %preview(answer), "Mapping answer");

    progress.report(100, "Enhanced image mapping completed!");
    Ok(MappingOutcome {
        mapping: parse_mapping_response(answer),
        raw_response: answer.to_string(),
    })
}
