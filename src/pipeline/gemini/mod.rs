pub mod client;
pub mod types;

pub use client::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeminiError {
    #[error("GOOGLE_API_KEY is not configured")]
    MissingApiKey,

    #[error("Generation API is not reachable at {0}")]
    NotReachable(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Generation API returned error (status {status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl GeminiError {
    /// Whether a different prompt or modality could plausibly succeed.
    ///
    /// Configuration and transport failures will fail the same way again.
    pub fn is_retryable_with_other_prompt(&self) -> bool {
        matches!(
            self,
            Self::EmptyResponse | Self::MalformedResponse(_) | Self::ApiError { status: 400, .. }
        )
    }
}
