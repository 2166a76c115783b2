//! Model-backed operations on canvases and text.
//!
//! All functions here are synchronous and take a `&dyn VisionClient`;
//! the API layer runs them inside `spawn_blocking`.

pub mod gateway;
pub mod image_actions;
pub mod orchestrator;
pub mod progress;
pub mod qac;

pub use gateway::*;
pub use image_actions::*;
pub use orchestrator::*;
pub use progress::*;
pub use qac::*;

use thiserror::Error;

use super::gemini::GeminiError;
use super::render::RenderError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input text cannot be empty.")]
    EmptyText,

    #[error("Image data is required")]
    MissingImage,

    #[error("Failed to correct text with AI.")]
    CorrectionFailed,

    #[error("Failed to enhance image with AI after {attempts} attempts: {reason}")]
    EnhanceFailed { attempts: usize, reason: String },

    #[error("Failed to create AI-enhanced drawing: {0}")]
    MappingFailed(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Model error: {0}")]
    Model(#[from] GeminiError),
}
