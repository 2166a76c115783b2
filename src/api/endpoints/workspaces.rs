//! Workspace endpoints: upload, view state, extraction, QAC and the
//! per-image actions on detected visual elements.
//!
//! Model work runs on the blocking pool while holding an
//! `OperationPermit` for the workspace activity, so a second request for
//! the same activity is answered with 409 instead of queueing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::{blocking, parse_id, workspace};
use crate::api::error::ApiError;
use crate::api::types::{
    ApiContext, CanvasResponse, ColorizeRequest, ExportResponse, PageRequest, ReportResponse,
    UploadRequest, ZoomRequest,
};
use crate::model_service::OperationKind;
use crate::pipeline::ocr::{enhance_image, image_base64, perform_advanced_ocr, perform_qac, DetectedImage};
use crate::pipeline::render::{decode_data_uri, CropRect};
use crate::workspace::{Activity, ExtractedContent, WorkspaceError, WorkspaceSummary};

/// Largest accepted document after base64 decoding (25 MB).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// ═══════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════

/// `POST /api/workspaces`: load a PDF or image and render its first page.
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(payload): Json<UploadRequest>,
) -> Result<(StatusCode, Json<WorkspaceSummary>), ApiError> {
    let file_name = payload.file_name.trim().to_string();
    if file_name.is_empty() {
        return Err(ApiError::BadRequest("fileName is required".into()));
    }
    if payload.data.trim().is_empty() {
        return Err(ApiError::BadRequest("File data is required".into()));
    }

    let core = ctx.core.clone();
    let summary = blocking(move || {
        let bytes = decode_data_uri(&payload.data)?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::BadRequest(format!(
                "File exceeds {} MB limit",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }
        let entry = core.workspaces().create(&file_name, bytes)?;
        Ok(entry.summary()?)
    })
    .await?;

    tracing::info!(id = %summary.id, file_name = %summary.file_name, "Workspace created");
    Ok((StatusCode::CREATED, Json(summary)))
}

/// `GET /api/workspaces/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<WorkspaceSummary>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    Ok(Json(entry.summary()?))
}

/// `DELETE /api/workspaces/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    ctx.core.workspaces().remove(&id)?;
    tracing::info!(%id, "Workspace removed");
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════════════════════
// View state
// ═══════════════════════════════════════════════════════════

/// `GET /api/workspaces/:id/canvas`: the current canvas as a PNG data URI.
pub async fn canvas(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<CanvasResponse>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let ws = entry.read()?;
    let canvas = ws.canvas();
    Ok(Json(CanvasResponse {
        data_uri: canvas.to_data_uri(),
        width: canvas.width,
        height: canvas.height,
        is_cropped: ws.is_cropped(),
    }))
}

/// `POST /api/workspaces/:id/page`: out-of-range pages are ignored.
pub async fn change_page(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(payload): Json<PageRequest>,
) -> Result<Json<WorkspaceSummary>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let summary = blocking(move || {
        let mut ws = entry.write()?;
        if !ws.change_page(payload.page)? {
            tracing::debug!(page = payload.page, "Page change ignored");
        }
        Ok(ws.summary(entry.gate()))
    })
    .await?;
    Ok(Json(summary))
}

/// `POST /api/workspaces/:id/zoom`: clamped to 25..=300.
pub async fn change_zoom(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(payload): Json<ZoomRequest>,
) -> Result<Json<WorkspaceSummary>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let summary = blocking(move || {
        let mut ws = entry.write()?;
        ws.set_zoom(payload.zoom)?;
        Ok(ws.summary(entry.gate()))
    })
    .await?;
    Ok(Json(summary))
}

/// `POST /api/workspaces/:id/crop`
pub async fn crop(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(rect): Json<CropRect>,
) -> Result<Json<WorkspaceSummary>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let summary = blocking(move || {
        let mut ws = entry.write()?;
        ws.crop(rect)?;
        Ok(ws.summary(entry.gate()))
    })
    .await?;
    Ok(Json(summary))
}

/// `POST /api/workspaces/:id/restore`
pub async fn restore(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<WorkspaceSummary>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let mut ws = entry.write()?;
    ws.restore_original();
    Ok(Json(ws.summary(entry.gate())))
}

// ═══════════════════════════════════════════════════════════
// Extraction & QAC
// ═══════════════════════════════════════════════════════════

/// `POST /api/workspaces/:id/extract`: OCR plus visual element detection
/// on the current canvas.
pub async fn extract(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<ExtractedContent>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let permit = entry.gate().try_begin(Activity::Ocr)?;
    let core = ctx.core.clone();

    let content = blocking(move || {
        let (canvas, kind, page) = {
            let ws = entry.read()?;
            (ws.canvas().clone(), ws.kind(), ws.current_page())
        };
        let images = entry.gate().sink(Activity::Image);

        let outcome = {
            let _op = core.models().begin(OperationKind::DocumentOcr);
            let client = core.models().client_or_unavailable();
            perform_advanced_ocr(client.as_ref(), &canvas, kind, &permit, &images)
        };

        let mut ws = entry.write()?;
        Ok(ws.record_extraction(outcome, page).clone())
    })
    .await?;

    Ok(Json(content))
}

/// `POST /api/workspaces/:id/qac`: quality assurance pass on the current
/// extraction.
pub async fn qac(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<ExtractedContent>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let permit = entry.gate().try_begin(Activity::Qac)?;
    let core = ctx.core.clone();

    let content = blocking(move || {
        let (target, canvas) = {
            let ws = entry.read()?;
            (ws.qac_source()?, ws.canvas().clone())
        };

        let result = {
            let _op = core.models().begin(OperationKind::QualityCheck);
            let client = core.models().client_or_unavailable();
            perform_qac(client.as_ref(), &target.text, Some(&canvas), &permit)?
        };

        let mut ws = entry.write()?;
        Ok(ws.apply_qac(&target, result)?)
    })
    .await?;

    Ok(Json(content))
}

/// `GET /api/workspaces/:id/extractions`: history, oldest first.
pub async fn extractions(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ExtractedContent>>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let ws = entry.read()?;
    Ok(Json(ws.extractions().to_vec()))
}

/// `GET /api/workspaces/:id/report`
pub async fn report(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<ReportResponse>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let ws = entry.read()?;
    let current = ws.current_extraction().ok_or(WorkspaceError::NoExtraction)?;
    Ok(Json(ReportResponse {
        file_name: current.export_file_name(),
        report: current.report(),
    }))
}

/// `POST /api/workspaces/:id/export`: write the report under the exports
/// directory.
pub async fn export(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<ExportResponse>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let dir = ctx.core.config.exports_dir.clone();

    let path = blocking(move || {
        let ws = entry.read()?;
        let path = ws.export_to(&dir)?;
        Ok(path)
    })
    .await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Json(ExportResponse {
        file_name,
        path: path.display().to_string(),
    }))
}

// ═══════════════════════════════════════════════════════════
// Detected images
// ═══════════════════════════════════════════════════════════

/// `POST /api/workspaces/:id/images/:image_id/colorize`
pub async fn colorize(
    State(ctx): State<ApiContext>,
    Path((id, image_id)): Path<(String, String)>,
    Json(payload): Json<ColorizeRequest>,
) -> Result<Json<DetectedImage>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let mut ws = entry.write()?;
    Ok(Json(ws.set_colorize(&image_id, payload.checked)?))
}

/// `POST /api/workspaces/:id/images/:image_id/enhance`
pub async fn enhance(
    State(ctx): State<ApiContext>,
    Path((id, image_id)): Path<(String, String)>,
) -> Result<Json<DetectedImage>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let permit = entry.gate().try_begin(Activity::Image)?;
    let core = ctx.core.clone();

    let image = blocking(move || {
        let marked = entry
            .write()?
            .update_detected_image(&image_id, |img| img.is_processing = true)?;

        let result = {
            let _op = core.models().begin(OperationKind::ImageEnhance);
            let client = core.models().client_or_unavailable();
            enhance_image(client.as_ref(), &marked.bitmap, marked.colorize, &permit)
        };

        let mut ws = entry.write()?;
        match result {
            Ok(url) => Ok(ws.update_detected_image(&image_id, |img| {
                img.enhanced_image_url = Some(url.clone());
                img.is_processing = false;
            })?),
            Err(e) => {
                ws.update_detected_image(&image_id, |img| img.is_processing = false)?;
                Err(e.into())
            }
        }
    })
    .await?;

    Ok(Json(image))
}

/// `POST /api/workspaces/:id/images/:image_id/base64`
pub async fn base64(
    State(ctx): State<ApiContext>,
    Path((id, image_id)): Path<(String, String)>,
) -> Result<Json<DetectedImage>, ApiError> {
    let entry = workspace(&ctx, &id)?;
    let permit = entry.gate().try_begin(Activity::Image)?;

    let image = blocking(move || {
        let bitmap = entry.read()?.detected_image(&image_id)?.bitmap.clone();
        let uri = image_base64(&bitmap, &permit);
        let mut ws = entry.write()?;
        let updated = ws.update_detected_image(&image_id, |img| img.base64 = Some(uri.clone()))?;
        Ok(updated)
    })
    .await?;

    Ok(Json(image))
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_is_25_mb() {
        assert_eq!(MAX_UPLOAD_BYTES, 26_214_400);
    }
}
