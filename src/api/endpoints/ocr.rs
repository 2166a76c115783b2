//! Text endpoints: the raw OCR gateway and structured correction.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CorrectRequest};
use crate::model_service::OperationKind;
use crate::pipeline::ocr::{
    correct_and_summarize, handle_gateway_request, GatewayRequest, GatewayResponse, PipelineError,
};
use crate::pipeline::parse::CorrectionSummary;

/// `POST /api/ocr`: one prompt plus one image to the text model.
///
/// Keeps the gateway's own body shape on every path: a model failure is a
/// 200 with the local fallback, a missing image is a 400, anything else a
/// 500 with `success: false`.
pub async fn gateway(
    State(ctx): State<ApiContext>,
    payload: Result<Json<GatewayRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Unreadable gateway request");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(GatewayResponse::failure()))
                .into_response();
        }
    };

    let core = ctx.core.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _op = core.models().begin(OperationKind::DocumentOcr);
        let client = core.models().client_or_unavailable();
        handle_gateway_request(client.as_ref(), &request)
    })
    .await;

    match result {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => {
            let body = GatewayResponse {
                success: false,
                method: None,
                response: None,
                error: Some(PipelineError::MissingImage.to_string()),
            };
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(GatewayResponse::failure())).into_response()
        }
    }
}

/// `POST /api/correct`: corrected text plus an original/corrected summary.
pub async fn correct(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CorrectRequest>,
) -> Result<Json<CorrectionSummary>, ApiError> {
    if payload.text.is_empty() {
        return Err(PipelineError::EmptyText.into());
    }

    let core = ctx.core.clone();
    let summary = blocking(move || {
        let _op = core.models().begin(OperationKind::TextCorrection);
        let client = core.models().client_or_unavailable();
        Ok(correct_and_summarize(client.as_ref(), &payload.text)?)
    })
    .await?;

    Ok(Json(summary))
}
