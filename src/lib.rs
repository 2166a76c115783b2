pub mod api; // Local HTTP API for the browser UI
pub mod config;
pub mod core_state; // Shared state: config, models, workspaces, audit
pub mod model_service;
pub mod pipeline;
pub mod workspace; // Per-document view state and extraction history

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Start the service and block until Ctrl+C.
pub async fn run() -> Result<(), String> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::AppConfig::from_env();
    if !config.has_api_key() {
        tracing::warn!("GOOGLE_API_KEY not set, model calls will use local fallbacks");
    }
    let bind_addr = config.bind_addr;
    let core = Arc::new(core_state::CoreState::new(config));

    let mut server = api::start_api_server(core, bind_addr).await?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
    }
    server.shutdown();
    server.wait().await;
    Ok(())
}
