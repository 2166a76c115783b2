//! Audit logging middleware.
//!
//! Logs every API request with client, method, path, status and latency.
//! Runs innermost, after the rate limiter.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::middleware::rate::client_key;
use crate::api::types::ApiContext;

/// Log API access for the audit trail.
/// Accesses `ApiContext` from request extensions.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let client = client_key(&req);
    let ctx = req.extensions().get::<ApiContext>().cloned();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        tracing::warn!(%client, %method, %path, status, elapsed_ms, "API request failed");
    } else {
        tracing::info!(%client, %method, %path, status, elapsed_ms, "API request");
    }

    if let Some(ctx) = ctx {
        ctx.core
            .log_access(&client, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
