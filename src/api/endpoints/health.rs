//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::config::{APP_NAME, APP_VERSION};
use crate::model_service::ActiveOperation;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub api_key_configured: bool,
    pub text_model: String,
    pub image_model: String,
    pub active_operations: Vec<ActiveOperation>,
    pub workspaces: usize,
    pub uptime_secs: u64,
}

/// `GET /api/health`: connection check for the browser client.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let models = ctx.core.models();

    Ok(Json(HealthResponse {
        status: "ok",
        name: APP_NAME,
        version: APP_VERSION,
        api_key_configured: models.api_key_configured(),
        text_model: models.text_model().to_string(),
        image_model: models.image_model().to_string(),
        active_operations: models.active_operations(),
        workspaces: ctx.core.workspaces().len(),
        uptime_secs: ctx.core.uptime_secs(),
    }))
}
