//! Standalone image processor: enhance, base64 and mapping on an uploaded
//! image, without a workspace.

use axum::extract::State;
use axum::Json;

use super::blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Base64Response, EnhancedImageResponse, ImageRequest};
use crate::model_service::OperationKind;
use crate::pipeline::ocr::{enhance_image, image_base64, map_image, MappingOutcome, NoopProgress, PipelineError};
use crate::pipeline::render::{decode_data_uri, load_image_canvas, PageBitmap};

fn decode_canvas(image: &str) -> Result<PageBitmap, ApiError> {
    if image.trim().is_empty() {
        return Err(PipelineError::MissingImage.into());
    }
    let bytes = decode_data_uri(image)?;
    Ok(load_image_canvas(&bytes)?)
}

/// `POST /api/images/enhance`
pub async fn enhance(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ImageRequest>,
) -> Result<Json<EnhancedImageResponse>, ApiError> {
    let core = ctx.core.clone();
    let enhanced_image_url = blocking(move || {
        let bitmap = decode_canvas(&payload.image)?;
        let _op = core.models().begin(OperationKind::ImageEnhance);
        let client = core.models().client_or_unavailable();
        Ok(enhance_image(client.as_ref(), &bitmap, payload.colorize, &NoopProgress)?)
    })
    .await?;

    Ok(Json(EnhancedImageResponse { enhanced_image_url }))
}

/// `POST /api/images/base64`
pub async fn base64(Json(payload): Json<ImageRequest>) -> Result<Json<Base64Response>, ApiError> {
    let base64 = blocking(move || {
        let bitmap = decode_canvas(&payload.image)?;
        Ok(image_base64(&bitmap, &NoopProgress))
    })
    .await?;

    Ok(Json(Base64Response { base64 }))
}

/// `POST /api/images/map`
pub async fn map(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ImageRequest>,
) -> Result<Json<MappingOutcome>, ApiError> {
    let core = ctx.core.clone();
    let outcome = blocking(move || {
        let bitmap = decode_canvas(&payload.image)?;
        let _op = core.models().begin(OperationKind::ImageMapping);
        let client = core.models().client_or_unavailable();
        Ok(map_image(client.as_ref(), &bitmap, &NoopProgress)?)
    })
    .await?;

    Ok(Json(outcome))
}
