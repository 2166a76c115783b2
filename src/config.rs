use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "OCR Studio";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hosted generation API root (Google Generative Language, v1beta).
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for text extraction, detection, QAC and mapping.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";

/// Model used for image redraw (must support IMAGE response modality).
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.0-flash-exp";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "ocr_studio_lib=info,ocr_studio=info,tower_http=warn"
}

/// Get the application data directory.
/// Falls back to the working directory when no platform data dir exists.
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocr-studio")
}

/// Directory where exported text reports are written.
pub fn exports_dir() -> PathBuf {
    app_data_dir().join("exports")
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` means every model call falls back to local processing.
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub bind_addr: SocketAddr,
    pub timeout_secs: u64,
    pub exports_dir: PathBuf,
}

impl AppConfig {
    /// Load `.env` (if present) and read configuration from the environment.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Failed to read .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match non_empty("OCR_STUDIO_BIND") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid OCR_STUDIO_BIND, using default");
                default_bind_addr()
            }),
            None => default_bind_addr(),
        };

        let timeout_secs = non_empty("OCR_STUDIO_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            api_key: non_empty("GOOGLE_API_KEY"),
            api_base: non_empty("OCR_STUDIO_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            text_model: non_empty("OCR_STUDIO_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            image_model: non_empty("OCR_STUDIO_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            bind_addr,
            timeout_secs,
            exports_dir: non_empty("OCR_STUDIO_EXPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(exports_dir),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn default_bind_addr() -> SocketAddr {
    DEFAULT_BIND_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8787)))
}
