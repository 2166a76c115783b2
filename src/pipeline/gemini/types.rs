//! Wire types for the hosted `generateContent` endpoint.
//!
//! Requests are written with snake_case `inline_data` / `mime_type` keys,
//! which the API accepts; responses come back camelCase, so the
//! deserializers accept both spellings.

use serde::{Deserialize, Serialize};

use super::GeminiError;
use crate::pipeline::render::encode_base64;

// ──────────────────────────────────────────────
// Generation parameters
// ──────────────────────────────────────────────

pub const TEMPERATURE: f32 = 0.1;
pub const TOP_P: f32 = 0.8;
pub const TOP_K: u32 = 40;

/// Output budget for the built-in OCR prompt.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Output budget when the caller supplies its own prompt (QAC, detection, mapping).
pub const CUSTOM_PROMPT_MAX_OUTPUT_TOKENS: u32 = 6000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<ResponseModality>>,
}

impl GenerationConfig {
    /// Low-temperature config used for every text call.
    pub fn text(max_output_tokens: u32) -> Self {
        Self {
            temperature: Some(TEMPERATURE),
            max_output_tokens: Some(max_output_tokens),
            top_p: Some(TOP_P),
            top_k: Some(TOP_K),
            response_modalities: None,
        }
    }

    /// Config for image generation: only the response modalities are set.
    pub fn image(modalities: &[ResponseModality]) -> Self {
        Self {
            temperature: None,
            max_output_tokens: None,
            top_p: None,
            top_k: None,
            response_modalities: Some(modalities.to_vec()),
        }
    }
}

// ──────────────────────────────────────────────
// Request
// ──────────────────────────────────────────────

/// Base64 image payload plus MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    #[serde(alias = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn png(base64_data: impl Into<String>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            data: base64_data.into(),
        }
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Build from raw bytes.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: encode_base64(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineImage },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestContent {
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// Prompt first, then the optional PNG.
    pub fn text(prompt: &str, image_base64: Option<&str>, max_output_tokens: u32) -> Self {
        let mut parts = vec![RequestPart::Text {
            text: prompt.to_string(),
        }];
        if let Some(data) = image_base64 {
            parts.push(RequestPart::InlineData {
                inline_data: InlineImage::png(data),
            });
        }
        Self {
            contents: vec![RequestContent { parts }],
            generation_config: GenerationConfig::text(max_output_tokens),
        }
    }

    /// Source image first, then the redraw instruction.
    pub fn image(prompt: &str, image: &InlineImage, modalities: &[ResponseModality]) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: image.clone(),
                    },
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig::image(modalities),
        }
    }
}

// ──────────────────────────────────────────────
// Response
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<ResponseContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
    #[serde(alias = "inlineData")]
    pub inline_data: Option<InlineImage>,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Text of the first part of the first candidate.
    ///
    /// Missing or whitespace-only text is `EmptyResponse`.
    pub fn first_text(&self) -> Result<String, GeminiError> {
        match self.first_parts().first().and_then(|p| p.text.as_deref()) {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ => Err(GeminiError::EmptyResponse),
        }
    }

    /// First inline image in the first candidate.
    pub fn first_image(&self) -> Result<InlineImage, GeminiError> {
        self.first_parts()
            .iter()
            .find_map(|p| p.inline_data.clone())
            .filter(|img| !img.data.is_empty())
            .ok_or(GeminiError::EmptyResponse)
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first().and_then(|c| c.finish_reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_request_body_shape() {
        let req = GenerateContentRequest::text("Extract", Some("AAAA"), DEFAULT_MAX_OUTPUT_TOKENS);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Extract");
        assert_eq!(
            body["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["data"], "AAAA");
        let config = &body["generationConfig"];
        assert_eq!(config["maxOutputTokens"], 4096);
        assert_eq!(config["topK"], 40);
        assert!((config["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert!((config["topP"].as_f64().unwrap() - 0.8).abs() < 1e-6);
        assert!(config.get("responseModalities").is_none());
    }

    #[test]
    fn text_request_without_image_has_one_part() {
        let req = GenerateContentRequest::text("Fix this", None, CUSTOM_PROMPT_MAX_OUTPUT_TOKENS);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 6000);
    }

    #[test]
    fn image_request_sets_modalities_only() {
        let req = GenerateContentRequest::image(
            "Redraw",
            &InlineImage::png("BBBB"),
            &[ResponseModality::Image],
        );
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["inline_data"]["data"], "BBBB");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "Redraw");
        assert_eq!(body["generationConfig"], json!({"responseModalities": ["IMAGE"]}));
    }

    #[test]
    fn parses_first_text() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "TEXT: hello"}, {"text": "ignored"}], "role": "model"},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(resp.first_text().unwrap(), "TEXT: hello");
        assert_eq!(resp.finish_reason(), Some("STOP"));
    }

    #[test]
    fn whitespace_text_is_empty() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "  \n "}]}}]
        }))
        .unwrap();
        assert!(matches!(resp.first_text(), Err(GeminiError::EmptyResponse)));
    }

    #[test]
    fn no_candidates_is_empty() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(resp.first_text(), Err(GeminiError::EmptyResponse)));
        assert!(matches!(resp.first_image(), Err(GeminiError::EmptyResponse)));
    }

    #[test]
    fn parses_camel_case_inline_image() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"text": "Here is your image"},
                {"inlineData": {"mimeType": "image/png", "data": "iVBORw0K"}}
            ]}}]
        }))
        .unwrap();
        let img = resp.first_image().unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.to_data_uri(), "data:image/png;base64,iVBORw0K");
    }

    #[test]
    fn inline_image_from_bytes() {
        let img = InlineImage::from_bytes("image/jpeg", b"abc");
        assert_eq!(img.data, "YWJj");
        assert_eq!(img.to_data_uri(), "data:image/jpeg;base64,YWJj");
    }
}
