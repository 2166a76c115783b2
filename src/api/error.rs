//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::ocr::PipelineError;
use crate::pipeline::render::RenderError;
use crate::workspace::WorkspaceError;

/// Structured error response body for browser clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
    /// The hosted model failed. The message is shown to the user as is.
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Unavailable: {0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "BUSY", detail.clone()),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
            ),
            ApiError::Unprocessable(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE",
                detail.clone(),
            ),
            ApiError::Upstream(detail) => {
                tracing::warn!(detail, "Model request failed");
                (StatusCode::BAD_GATEWAY, "AI_UNAVAILABLE", detail.clone())
            }
            ApiError::Unavailable(detail) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                detail.clone(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<WorkspaceError> for ApiError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::Busy(_) => ApiError::Conflict(err.to_string()),
            WorkspaceError::NoExtraction | WorkspaceError::EmptyDocument => {
                ApiError::BadRequest(err.to_string())
            }
            WorkspaceError::NotFound(_) | WorkspaceError::ImageNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            WorkspaceError::TooMany(_) => ApiError::Unavailable(err.to_string()),
            WorkspaceError::Export(_) | WorkspaceError::LockPoisoned => {
                ApiError::Internal(err.to_string())
            }
            WorkspaceError::Render(e) => e.into(),
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::UnsupportedFormat(_)
            | RenderError::InvalidData(_)
            | RenderError::InvalidCrop(_)
            | RenderError::PdfEncrypted => ApiError::BadRequest(err.to_string()),
            RenderError::PdfRendering { .. } => {
                tracing::warn!(error = %err, "PDF rendering failed");
                ApiError::Unprocessable("Error rendering PDF page. Please try again.".into())
            }
            RenderError::ImageProcessing(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::EmptyText | PipelineError::MissingImage => {
                ApiError::BadRequest(err.to_string())
            }
            PipelineError::CorrectionFailed => ApiError::Upstream(err.to_string()),
            PipelineError::EnhanceFailed { .. } => ApiError::Upstream(
                "Failed to enhance image with AI. Please try again.".into(),
            ),
            PipelineError::MappingFailed(_) => ApiError::Upstream(
                "Failed to create AI-enhanced drawing. Please try again.".into(),
            ),
            PipelineError::Render(e) => e.into(),
            PipelineError::Model(_) => ApiError::Upstream("AI service unavailable".into()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {err}"))
    }
}
