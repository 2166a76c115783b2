//! API endpoint handlers.
//!
//! Handlers stay thin: they resolve the workspace, claim its activity,
//! and run model work on the blocking pool.

pub mod health;
pub mod images;
pub mod ocr;
pub mod workspaces;

use std::sync::Arc;

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::workspace::WorkspaceEntry;

/// Run `f` on the blocking pool. Model calls and rendering are synchronous.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid workspace ID format".into()))
}

pub(crate) fn workspace(ctx: &ApiContext, raw_id: &str) -> Result<Arc<WorkspaceEntry>, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(ctx.core.workspaces().get(&id)?)
}
