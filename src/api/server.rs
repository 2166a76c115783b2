//! API server lifecycle: starts and stops the axum HTTP server.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::api::router::api_router;
use crate::core_state::CoreState;

// ═══════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════

/// Session metadata for a running API server.
#[derive(Debug, Clone, Serialize)]
pub struct ApiSession {
    pub session_id: String,
    pub server_addr: String,
    pub port: u16,
    pub started_at: String,
}

/// Handle to a running API server.
pub struct ApiServer {
    pub session: ApiSession,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ApiServer {
    /// Shut down the server gracefully.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish.
    pub async fn wait(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("API server task failed: {e}");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Server lifecycle
// ═══════════════════════════════════════════════════════════

/// Start the API server on `addr` (port 0 picks an ephemeral port).
///
/// Builds the full `api_router` with middleware stack and spawns the
/// axum server in a background tokio task.
pub async fn start_api_server(core: Arc<CoreState>, addr: SocketAddr) -> Result<ApiServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind API server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = api_router(core);

    let session = ApiSession {
        session_id: Uuid::new_v4().to_string(),
        server_addr: addr.to_string(),
        port: addr.port(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        // ConnectInfo gives the rate limiter a per-peer key
        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        session,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::model_service::ModelService;
    use crate::pipeline::gemini::MockVisionClient;
    use crate::pipeline::render::MockPdfPageRenderer;

    fn test_core() -> Arc<CoreState> {
        let config = AppConfig::default();
        let models = Arc::new(ModelService::with_client(
            &config,
            Arc::new(MockVisionClient::new("ok")),
        ));
        Arc::new(CoreState::with_parts(
            config,
            models,
            Arc::new(MockPdfPageRenderer::new(1)),
        ))
    }

    fn localhost() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let core = test_core();
        let mut server = start_api_server(core.clone(), localhost())
            .await
            .expect("server should start");

        assert!(!server.session.session_id.is_empty());
        assert!(server.session.port > 0);

        let url = format!("http://127.0.0.1:{}/api/health", server.session.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        // Audit entry keyed by the peer address
        assert_eq!(core.audit_entries()[0].client, "127.0.0.1");

        server.shutdown();
        server.wait().await;
    }

    #[tokio::test]
    async fn server_session_has_valid_metadata() {
        let mut server = start_api_server(test_core(), localhost())
            .await
            .expect("server should start");

        assert!(!server.session.started_at.is_empty());
        assert!(server.session.server_addr.starts_with("127.0.0.1:"));

        server.shutdown();
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let mut first = start_api_server(test_core(), localhost()).await.unwrap();
        let taken = SocketAddr::from(([127, 0, 0, 1], first.session.port));
        let err = start_api_server(test_core(), taken).await.err().unwrap();
        assert!(err.contains("Failed to bind"));
        first.shutdown();
    }
}
