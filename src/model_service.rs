//! Centralized access to the hosted vision model.
//!
//! - `ModelService` lives in `CoreState` (shared via `Arc`)
//! - `begin()` registers a running operation and returns an RAII guard
//! - `active_operations()` provides observability (what kind, which model, since when)
//! - `client()` is the single factory for configured `VisionClient` instances
//!
//! The hosted API serves concurrent requests, so unlike a local inference
//! server there is no global exclusive lock here. Per-workspace exclusivity
//! lives in `workspace::OperationGate`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

use crate::config::AppConfig;
use crate::pipeline::gemini::{GeminiClient, GeminiError, UnavailableClient, VisionClient};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// What kind of model operation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Text extraction through the `/api/ocr` gateway prompt
    DocumentOcr,
    /// Second-pass quality assurance check on extracted text
    QualityCheck,
    /// Structured JSON correction with a corrections summary
    TextCorrection,
    /// Image redraw / colorize
    ImageEnhance,
    /// Descriptive "enhanced drawing" mapping of an image
    ImageMapping,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentOcr => write!(f, "Document OCR"),
            Self::QualityCheck => write!(f, "Quality assurance check"),
            Self::TextCorrection => write!(f, "Text correction"),
            Self::ImageEnhance => write!(f, "Image enhancement"),
            Self::ImageMapping => write!(f, "Image mapping"),
        }
    }
}

/// Snapshot of a running model operation.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveOperation {
    #[serde(skip)]
    id: u64,
    pub kind: OperationKind,
    pub model: String,
    /// When the operation started (ISO 8601).
    pub started_at: String,
}

/// Builds a vision client for one operation.
pub type ClientFactory =
    Arc<dyn Fn() -> Result<Arc<dyn VisionClient>, GeminiError> + Send + Sync>;

// ═══════════════════════════════════════════════════════════
// ModelService
// ═══════════════════════════════════════════════════════════

pub struct ModelService {
    text_model: String,
    image_model: String,
    api_key_configured: bool,
    factory: ClientFactory,
    active: Mutex<Vec<ActiveOperation>>,
    next_id: AtomicU64,
}

impl ModelService {
    /// Service backed by `GeminiClient` built from `config`.
    pub fn new(config: &AppConfig) -> Self {
        let owned = config.clone();
        let factory: ClientFactory = Arc::new(move || -> Result<Arc<dyn VisionClient>, GeminiError> {
            let client = GeminiClient::from_config(&owned)?;
            Ok(Arc::new(client) as Arc<dyn VisionClient>)
        });
        Self::with_factory(config, factory)
    }

    /// Service with a custom client factory (tests, alternative backends).
    pub fn with_factory(config: &AppConfig, factory: ClientFactory) -> Self {
        Self {
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            api_key_configured: config.has_api_key(),
            factory,
            active: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Service that always hands out the given client.
    pub fn with_client(config: &AppConfig, client: Arc<dyn VisionClient>) -> Self {
        let mut service = Self::with_factory(config, Arc::new(move || {
            Ok::<_, GeminiError>(Arc::clone(&client))
        }));
        service.api_key_configured = true;
        service
    }

    /// Create a configured client.
    ///
    /// The Gemini client wraps a blocking reqwest client: call this from
    /// inside `spawn_blocking`, never directly on the async runtime.
    pub fn client(&self) -> Result<Arc<dyn VisionClient>, GeminiError> {
        (self.factory)()
    }

    /// Like `client()`, but falls back to a client that fails every call,
    /// letting pipelines take their fallback paths.
    pub fn client_or_unavailable(&self) -> Arc<dyn VisionClient> {
        self.client().unwrap_or_else(|e| {
            warn!(error = %e, "Vision client unavailable, using fallbacks");
            Arc::new(UnavailableClient::new(e)) as Arc<dyn VisionClient>
        })
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    pub fn api_key_configured(&self) -> bool {
        self.api_key_configured
    }

    /// Register a running operation. Dropping the guard unregisters it.
    pub fn begin(self: &Arc<Self>, kind: OperationKind) -> ModelOpGuard {
        let model = match kind {
            OperationKind::ImageEnhance => self.image_model.clone(),
            _ => self.text_model.clone(),
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut active) = self.active.lock() {
            active.push(ActiveOperation {
                id,
                kind,
                model,
                started_at: chrono::Utc::now().to_rfc3339(),
            });
        }
        ModelOpGuard {
            service: Arc::clone(self),
            id,
        }
    }

    /// Operations currently in flight, oldest first.
    pub fn active_operations(&self) -> Vec<ActiveOperation> {
        self.active.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn is_busy(&self) -> bool {
        !self.active_operations().is_empty()
    }

    fn finish(&self, id: u64) {
        if let Ok(mut active) = self.active.lock() {
            active.retain(|op| op.id != id);
        }
    }
}

// ═══════════════════════════════════════════════════════════
// ModelOpGuard: RAII operation registration
// ═══════════════════════════════════════════════════════════

pub struct ModelOpGuard {
    service: Arc<ModelService>,
    id: u64,
}

impl Drop for ModelOpGuard {
    fn drop(&mut self) {
        self.service.finish(self.id);
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
