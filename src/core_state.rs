//! Shared application state for the HTTP service.
//!
//! `CoreState` is built once at startup and shared via `Arc` by every
//! handler and middleware. It owns the configuration, the model service,
//! the workspace registry and a bounded in-memory audit buffer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::warn;

use crate::config::AppConfig;
use crate::model_service::ModelService;
use crate::pipeline::render::{PdfPageRenderer, PdfiumRenderer};
use crate::workspace::WorkspaceRegistry;

/// Audit entries kept in memory; older entries are dropped.
const AUDIT_BUFFER_CAPACITY: usize = 500;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    models: Arc<ModelService>,
    workspaces: WorkspaceRegistry,
    audit: AuditLogger,
    started_at: Instant,
}

impl CoreState {
    /// State backed by the hosted model and PDFium.
    ///
    /// A missing PDFium library is not fatal: images still work and PDF
    /// uploads fail with a render error.
    pub fn new(config: AppConfig) -> Self {
        if let Err(e) = PdfiumRenderer::new() {
            warn!(error = %e, "PDFium unavailable, PDF uploads will fail");
        }
        let models = Arc::new(ModelService::new(&config));
        Self::with_parts(config, models, Arc::new(PdfiumRenderer))
    }

    /// State with explicit model service and renderer (tests, embedding).
    pub fn with_parts(
        config: AppConfig,
        models: Arc<ModelService>,
        renderer: Arc<dyn PdfPageRenderer>,
    ) -> Self {
        Self {
            config,
            models,
            workspaces: WorkspaceRegistry::new(renderer),
            audit: AuditLogger::new(),
            started_at: Instant::now(),
        }
    }

    pub fn models(&self) -> &Arc<ModelService> {
        &self.models
    }

    pub fn workspaces(&self) -> &WorkspaceRegistry {
        &self.workspaces
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Record a handled request.
    pub fn log_access(&self, client: &str, action: &str, outcome: &str) {
        self.audit.log(client, action, outcome);
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub client: String,
    pub action: String,
    pub outcome: String,
}

/// Bounded in-memory audit buffer.
pub struct AuditLogger {
    buffer: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::with_capacity(AUDIT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn log(&self, client: &str, action: &str, outcome: &str) {
        if let Ok(mut buf) = self.buffer.lock() {
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(AuditEntry {
                timestamp: chrono::Utc::now(),
                client: client.to_string(),
                action: action.to_string(),
                outcome: outcome.to_string(),
            });
        }
    }

    /// Buffered entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
