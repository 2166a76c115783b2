//! Per-client rate limiting middleware.
//!
//! Applies sliding-window rate limits per client address:
//! - 100 requests per minute
//! - 1000 requests per hour

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

/// Rate-limit key: the peer address. `X-Forwarded-For` is ignored since no
/// proxy sits in front of the loopback listener.
pub(crate) fn client_key(req: &Request<axum::body::Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Per-client rate limiting. Returns 429 if exceeded.
/// Accesses `ApiContext` from request extensions.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let key = client_key(&req);

    // MutexGuard is !Send, drop before .await
    {
        let mut limiter = ctx
            .rate_limiter
            .lock()
            .map_err(|_| ApiError::Internal("rate limiter lock".into()))?;

        limiter.check(&key).map_err(|retry_after| {
            tracing::warn!(client = %key, retry_after, "Rate limit exceeded");
            ApiError::RateLimited { retry_after }
        })?;
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn key_ignores_forwarded_for() {
        let mut req = Request::builder()
            .header("X-Forwarded-For", "10.0.0.7, 192.168.1.1")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_key(&req), "127.0.0.1");
    }

    #[test]
    fn key_uses_peer_address() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        let addr: SocketAddr = "192.168.1.20:5000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_key(&req), "192.168.1.20");
    }

    #[test]
    fn key_falls_back_to_anonymous() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&req), "anonymous");
    }
}
