use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::types::{
    GenerateContentRequest, GenerateContentResponse, InlineImage, ResponseModality,
};
use super::GeminiError;
use crate::config::AppConfig;

/// Longest slice of a raw model response written to debug logs.
const LOG_PREVIEW_CHARS: usize = 300;

/// Connection establishment budget, separate from the full request timeout.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Hosted vision-language model access.
///
/// Synchronous by design of the callers: handlers run these inside
/// `spawn_blocking`.
pub trait VisionClient: Send + Sync {
    /// Prompt (plus optional base64 PNG) to free text.
    fn generate_text(
        &self,
        prompt: &str,
        image_base64: Option<&str>,
        max_output_tokens: u32,
    ) -> Result<String, GeminiError>;

    /// Image-to-image generation. Returns the first inline image of the answer.
    fn generate_image(
        &self,
        prompt: &str,
        image: &InlineImage,
        modalities: &[ResponseModality],
    ) -> Result<InlineImage, GeminiError>;
}

/// First `LOG_PREVIEW_CHARS` characters of a response, for logging.
pub fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    if text.chars().count() > LOG_PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

// ──────────────────────────────────────────────
// GeminiClient
// ──────────────────────────────────────────────

/// Blocking HTTP client for `models/{model}:generateContent`.
pub struct GeminiClient {
    api_base: String,
    api_key: String,
    text_model: String,
    image_model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(
        api_base: &str,
        api_key: &str,
        text_model: &str,
        image_model: &str,
        timeout_secs: u64,
    ) -> Result<Self, GeminiError> {
        if api_key.trim().is_empty() {
            return Err(GeminiError::MissingApiKey);
        }
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GeminiError::HttpClient(e.to_string()))?;

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            text_model: text_model.to_string(),
            image_model: image_model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GeminiError> {
        let api_key = config.api_key.as_deref().ok_or(GeminiError::MissingApiKey)?;
        Self::new(
            &config.api_base,
            api_key,
            &config.text_model,
            &config.image_model,
            config.timeout_secs,
        )
    }

    /// Endpoint URL without the key query parameter.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    fn post(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = self.endpoint(model);
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GeminiError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    GeminiError::NotReachable(self.api_base.clone())
                } else {
                    GeminiError::HttpClient(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(
                model,
                status = status.as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Generation API returned error status"
            );
            return Err(GeminiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| GeminiError::MalformedResponse(e.without_url().to_string()))?;

        debug!(
            model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            candidates = parsed.candidates.len(),
            finish_reason = parsed.finish_reason().unwrap_or("-"),
            "Generation API call completed"
        );

        Ok(parsed)
    }
}

impl VisionClient for GeminiClient {
    fn generate_text(
        &self,
        prompt: &str,
        image_base64: Option<&str>,
        max_output_tokens: u32,
    ) -> Result<String, GeminiError> {
        let body = GenerateContentRequest::text(prompt, image_base64, max_output_tokens);
        let response = self.post(&self.text_model, &body)?;
        let text = response.first_text()?;
        debug!(chars = text.len(), preview = %preview(&text), "Model text response");
        Ok(text)
    }

    fn generate_image(
        &self,
        prompt: &str,
        image: &InlineImage,
        modalities: &[ResponseModality],
    ) -> Result<InlineImage, GeminiError> {
        let body = GenerateContentRequest::image(prompt, image, modalities);
        let response = self.post(&self.image_model, &body)?;
        response.first_image()
    }
}

// ──────────────────────────────────────────────
// UnavailableClient
// ──────────────────────────────────────────────

/// Stands in when no real client can be built (e.g. missing API key), so
/// pipelines take their usual fallback paths.
pub struct UnavailableClient {
    reason: GeminiError,
}

impl UnavailableClient {
    pub fn new(reason: GeminiError) -> Self {
        Self { reason }
    }
}

impl VisionClient for UnavailableClient {
    fn generate_text(
        &self,
        _prompt: &str,
        _image_base64: Option<&str>,
        _max_output_tokens: u32,
    ) -> Result<String, GeminiError> {
        Err(self.reason.clone())
    }

    fn generate_image(
        &self,
        _prompt: &str,
        _image: &InlineImage,
        _modalities: &[ResponseModality],
    ) -> Result<InlineImage, GeminiError> {
        Err(self.reason.clone())
    }
}

// ──────────────────────────────────────────────
// Mock
// ──────────────────────────────────────────────

/// A prompt the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prompt: String,
    pub had_image: bool,
    pub max_output_tokens: Option<u32>,
    pub modalities: Vec<ResponseModality>,
}

/// Mock vision client for testing.
///
/// Text calls pop queued replies first and then fall back to the default
/// reply. Image calls fail `image_failures` times before succeeding.
pub struct MockVisionClient {
    default_text: Result<String, GeminiError>,
    queued_text: Mutex<VecDeque<Result<String, GeminiError>>>,
    image: Result<InlineImage, GeminiError>,
    image_failures: Mutex<usize>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockVisionClient {
    pub fn new(response: &str) -> Self {
        Self {
            default_text: Ok(response.to_string()),
            queued_text: Mutex::new(VecDeque::new()),
            image: Ok(InlineImage::png("iVBORw0KGgo=")),
            image_failures: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `error`.
    pub fn failing(error: GeminiError) -> Self {
        Self {
            default_text: Err(error.clone()),
            image: Err(error),
            ..Self::new("")
        }
    }

    /// Replies returned, in order, before the default reply.
    pub fn with_replies(self, replies: Vec<Result<String, GeminiError>>) -> Self {
        if let Ok(mut queue) = self.queued_text.lock() {
            queue.extend(replies);
        }
        self
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.image = Ok(image);
        self
    }

    /// First `count` image calls return `EmptyResponse`.
    pub fn with_image_failures(self, count: usize) -> Self {
        if let Ok(mut failures) = self.image_failures.lock() {
            *failures = count;
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: RecordedCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl VisionClient for MockVisionClient {
    fn generate_text(
        &self,
        prompt: &str,
        image_base64: Option<&str>,
        max_output_tokens: u32,
    ) -> Result<String, GeminiError> {
        self.record(RecordedCall {
            prompt: prompt.to_string(),
            had_image: image_base64.is_some(),
            max_output_tokens: Some(max_output_tokens),
            modalities: Vec::new(),
        });
        let queued = self.queued_text.lock().ok().and_then(|mut q| q.pop_front());
        queued.unwrap_or_else(|| self.default_text.clone())
    }

    fn generate_image(
        &self,
        prompt: &str,
        _image: &InlineImage,
        modalities: &[ResponseModality],
    ) -> Result<InlineImage, GeminiError> {
        self.record(RecordedCall {
            prompt: prompt.to_string(),
            had_image: true,
            max_output_tokens: None,
            modalities: modalities.to_vec(),
        });
        if let Ok(mut failures) = self.image_failures.lock() {
            if *failures > 0 {
                *failures -= 1;
                return Err(GeminiError::EmptyResponse);
            }
        }
        self.image.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_api_key() {
        let err = GeminiClient::new("https://example.test/v1beta", "  ", "m", "i", 30)
            .err()
            .unwrap();
        assert_eq!(err, GeminiError::MissingApiKey);
    }

    #[test]
    fn from_config_without_key_fails() {
        let config = AppConfig::default();
        assert!(matches!(
            GeminiClient::from_config(&config),
            Err(GeminiError::MissingApiKey)
        ));
    }

    #[test]
    fn endpoint_uses_model_and_trims_base() {
        let client =
            GeminiClient::new("https://example.test/v1beta/", "k", "gemini-2.5-flash", "img", 30)
                .unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(client.timeout_secs, 30);
    }

    #[test]
    fn unreachable_host_maps_to_transport_error() {
        // Port 9 on localhost is reserved (discard) and normally closed
        let client = GeminiClient::new("http://127.0.0.1:9/v1beta", "k", "m", "i", 5).unwrap();
        let err = client.generate_text("hi", None, 10).unwrap_err();
        assert!(
            matches!(
                err,
                GeminiError::NotReachable(_) | GeminiError::HttpClient(_) | GeminiError::Timeout(_)
            ),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "a".repeat(500);
        let p = preview(&long);
        assert_eq!(p.chars().count(), LOG_PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn mock_returns_queued_then_default() {
        let mock = MockVisionClient::new("default").with_replies(vec![
            Ok("first".into()),
            Err(GeminiError::EmptyResponse),
        ]);
        assert_eq!(mock.generate_text("p", None, 1).unwrap(), "first");
        assert!(mock.generate_text("p", None, 1).is_err());
        assert_eq!(mock.generate_text("p", Some("AAAA"), 1).unwrap(), "default");

        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[2].had_image);
    }

    #[test]
    fn mock_image_failures_then_success() {
        let mock = MockVisionClient::new("").with_image_failures(2);
        let img = InlineImage::png("AAAA");
        assert!(mock.generate_image("a", &img, &[ResponseModality::Image]).is_err());
        assert!(mock.generate_image("b", &img, &[ResponseModality::Image]).is_err());
        assert!(mock.generate_image("c", &img, &[ResponseModality::Image]).is_ok());
        assert_eq!(mock.calls().len(), 3);
    }

    #[test]
    fn unavailable_client_returns_reason() {
        let client = UnavailableClient::new(GeminiError::MissingApiKey);
        assert_eq!(client.generate_text("p", None, 1), Err(GeminiError::MissingApiKey));
    }

    #[test]
    fn failing_mock_fails_everything() {
        let mock = MockVisionClient::failing(GeminiError::MissingApiKey);
        assert_eq!(mock.generate_text("p", None, 1), Err(GeminiError::MissingApiKey));
        assert_eq!(
            mock.generate_image("p", &InlineImage::png("A"), &[ResponseModality::Image]),
            Err(GeminiError::MissingApiKey)
        );
    }
}
