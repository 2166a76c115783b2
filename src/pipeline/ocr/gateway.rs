//! The OCR gateway: one prompt plus one canvas in, one free-text answer out.
//!
//! Model failures never surface as errors here. They produce the
//! `Local Processing (...)` fallback answer so callers can decide what to
//! show.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pipeline::gemini::{
    preview, VisionClient, CUSTOM_PROMPT_MAX_OUTPUT_TOKENS, DEFAULT_MAX_OUTPUT_TOKENS,
};
use crate::pipeline::prompt_templates::ocr_prompt;
use crate::pipeline::render::{split_data_uri, FileKind};

pub const FALLBACK_RESPONSE: &str =
    "No text could be extracted from this image. Please try with a clearer image or different file.";
pub const FALLBACK_ERROR: &str = "AI service unavailable";
pub const GATEWAY_FAILURE: &str = "OCR processing failed";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    /// Bare base64 PNG; a full data URI is accepted too.
    #[serde(default)]
    pub image_base64: Option<String>,
    /// `"pdf"` or `"image"`; other values are echoed into the method label.
    #[serde(default)]
    pub file_type: Option<String>,
    /// Custom instruction replacing the default OCR prompt.
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayResponse {
    /// Body of a 500 from the gateway endpoint.
    pub fn failure() -> Self {
        Self {
            success: false,
            method: None,
            response: None,
            error: Some(GATEWAY_FAILURE.to_string()),
        }
    }

    /// Model answer when the call succeeded with non-empty text.
    pub fn answer(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.response.as_deref().filter(|r| !r.trim().is_empty())
    }
}

/// `"PDF"`, `"IMAGE"` (or any other file type uppercased); `"Image"` when absent.
pub fn method_label(file_type: Option<&str>) -> String {
    match file_type.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.to_uppercase(),
        None => "Image".to_string(),
    }
}

pub fn success_method(file_type: Option<&str>) -> String {
    format!("Google Gemini AI ({})", method_label(file_type))
}

pub fn fallback_method(file_type: Option<&str>) -> String {
    format!("Local Processing ({})", method_label(file_type))
}

/// Send one prompt (default OCR prompt when `prompt` is empty) with an
/// optional canvas.
pub fn run_gateway(
    client: &dyn VisionClient,
    image_base64: Option<&str>,
    file_type: Option<&str>,
    prompt: Option<&str>,
) -> GatewayResponse {
    let custom = prompt.map(str::trim).filter(|p| !p.is_empty());
    let (prompt_text, max_tokens) = match custom {
        Some(p) => (p.to_string(), CUSTOM_PROMPT_MAX_OUTPUT_TOKENS),
        None => {
            let kind = file_type.and_then(parse_file_type);
            (ocr_prompt(kind), DEFAULT_MAX_OUTPUT_TOKENS)
        }
    };

    let payload = image_base64.map(|img| split_data_uri(img).1);
    let start = std::time::Instant::now();

    match client.generate_text(&prompt_text, payload, max_tokens) {
        Ok(text) if !text.trim().is_empty() => {
            info!(
                custom_prompt = custom.is_some(),
                chars = text.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Gateway call succeeded"
            );
            GatewayResponse {
                success: true,
                method: Some(success_method(file_type)),
                response: Some(text),
                error: None,
            }
        }
        Ok(text) => {
            warn!(preview = %preview(&text), "Gateway received blank answer, using fallback");
            fallback(file_type)
        }
        Err(e) => {
            warn!(error = %e, "Gateway call failed, using fallback");
            fallback(file_type)
        }
    }
}

/// Handle a raw gateway request.
///
/// Returns `None` when no image data was supplied.
pub fn handle_gateway_request(
    client: &dyn VisionClient,
    request: &GatewayRequest,
) -> Option<GatewayResponse> {
    let image = request
        .image_base64
        .as_deref()
        .filter(|img| !split_data_uri(img).1.is_empty())?;
    Some(run_gateway(
        client,
        Some(image),
        request.file_type.as_deref(),
        request.prompt.as_deref(),
    ))
}

fn fallback(file_type: Option<&str>) -> GatewayResponse {
    GatewayResponse {
        success: false,
        method: Some(fallback_method(file_type)),
        response: Some(FALLBACK_RESPONSE.to_string()),
        error: Some(FALLBACK_ERROR.to_string()),
    }
}

fn parse_file_type(file_type: &str) -> Option<FileKind> {
    match file_type.trim().to_ascii_lowercase().as_str() {
        "pdf" => Some(FileKind::Pdf),
        "image" => Some(FileKind::Image),
        _ => None,
    }
}
