pub mod render; // Canvas plumbing: image decode, PDF raster, crop, data URIs
pub mod gemini; // Hosted vision model client
pub mod prompt_templates;
pub mod parse; // Free-text answer parsing
pub mod ocr; // Model-backed operations on canvases and text
