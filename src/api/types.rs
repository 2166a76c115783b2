//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core_state::CoreState;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific caches.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self::with_rate_limiter(core, RateLimiter::new())
    }

    pub fn with_rate_limiter(core: Arc<CoreState>, limiter: RateLimiter) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(limiter)),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-client sliding window
// ═══════════════════════════════════════════════════════════

/// Per-client rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// Check if a client is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, client: &str) -> Result<(), u64> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&mut self, client: &str, now: Instant) -> Result<(), u64> {
        // Clean entries older than 1 hour, forgetting idle clients
        self.windows.retain(|_, entries| {
            entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(3600));
            !entries.is_empty()
        });

        let entries = self.windows.entry(client.to_string()).or_default();

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    /// Number of clients with requests inside the hourly window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Request bodies
// ═══════════════════════════════════════════════════════════

/// Document upload. `data` is a data URI or bare base64.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub page: i64,
}

#[derive(Debug, Deserialize)]
pub struct ZoomRequest {
    pub zoom: i64,
}

#[derive(Debug, Deserialize)]
pub struct ColorizeRequest {
    pub checked: bool,
}

#[derive(Debug, Deserialize)]
pub struct CorrectRequest {
    #[serde(default)]
    pub text: String,
}

/// Standalone image processor input.
#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub image: String,
    #[serde(default)]
    pub colorize: bool,
}

// ═══════════════════════════════════════════════════════════
// Response bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasResponse {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    pub is_cropped: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub file_name: String,
    pub report: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub file_name: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedImageResponse {
    pub enhanced_image_url: String,
}

#[derive(Debug, Serialize)]
pub struct Base64Response {
    pub base64: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_under_limit() {
        let mut limiter = RateLimiter::new();
        for _ in 0..50 {
            assert!(limiter.check("127.0.0.1").is_ok());
        }
    }

    #[test]
    fn rate_limiter_rejects_over_per_minute() {
        let mut limiter = RateLimiter::with_limits(2, 1000);
        assert!(limiter.check("client-1").is_ok());
        assert!(limiter.check("client-1").is_ok());
        assert_eq!(limiter.check("client-1"), Err(60));
    }

    #[test]
    fn rate_limiter_rejects_over_per_hour() {
        let mut limiter = RateLimiter::with_limits(10, 3);
        for _ in 0..3 {
            assert!(limiter.check("client-1").is_ok());
        }
        assert_eq!(limiter.check("client-1"), Err(3600));
    }

    #[test]
    fn rate_limiter_isolates_clients() {
        let mut limiter = RateLimiter::with_limits(1, 1000);
        assert!(limiter.check("client-1").is_ok());
        assert!(limiter.check("client-2").is_ok());
        assert!(limiter.check("client-1").is_err());
    }

    #[test]
    fn rate_limiter_forgets_idle_clients() {
        let mut limiter = RateLimiter::with_limits(5, 100);
        let start = Instant::now();
        for i in 0..20 {
            assert!(limiter.check_at(&format!("10.0.0.{i}"), start).is_ok());
        }
        assert_eq!(limiter.tracked_clients(), 20);

        let later = start + Duration::from_secs(3601);
        assert!(limiter.check_at("10.0.0.99", later).is_ok());
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn rate_limiter_rejected_requests_leave_no_entry() {
        let mut limiter = RateLimiter::with_limits(0, 100);
        assert_eq!(limiter.check("client-1"), Err(60));
        assert_eq!(limiter.check("client-2"), Err(60));
        assert_eq!(limiter.check("client-3"), Err(60));
        // Only the caller's own empty window survives a sweep
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn upload_request_uses_camel_case() {
        let req: UploadRequest =
            serde_json::from_str(r#"{"fileName":"scan.png","data":"QUJD"}"#).unwrap();
        assert_eq!(req.file_name, "scan.png");
        assert_eq!(req.data, "QUJD");
    }

    #[test]
    fn image_request_colorize_defaults_off() {
        let req: ImageRequest = serde_json::from_str(r#"{"image":"data:image/png;base64,QUJD"}"#).unwrap();
        assert!(!req.colorize);
    }
}
