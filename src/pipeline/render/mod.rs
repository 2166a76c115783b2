//! Document rasterization: turns uploaded PDFs and images into the PNG
//! "canvas" bitmaps that are sent to the vision model.

pub mod codec;
pub mod crop;
pub mod image_loader;
pub mod pdfium;

pub use codec::*;
pub use crop::*;
pub use image_loader::*;
pub use pdfium::*;

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image data: {0}")]
    InvalidData(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("PDF is password-protected")]
    PdfEncrypted,

    #[error("Invalid crop rectangle: {0}")]
    InvalidCrop(String),
}

/// Kind of uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
}

impl FileKind {
    /// Uppercase label used in extraction method strings ("PDF" / "IMAGE").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Image => "IMAGE",
        }
    }

    /// Noun used inside the default OCR prompt.
    pub fn prompt_noun(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF page",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// A rasterized page: PNG bytes plus pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBitmap {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PageBitmap {
    /// Encode a decoded image as PNG.
    pub fn from_image(image: &DynamicImage) -> Result<Self, RenderError> {
        let (width, height) = image.dimensions();
        let mut cursor = Cursor::new(Vec::new());
        image
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| RenderError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
        Ok(Self {
            png: cursor.into_inner(),
            width,
            height,
        })
    }

    /// Decode the PNG back into an image for pixel work.
    pub fn decode(&self) -> Result<DynamicImage, RenderError> {
        image::load_from_memory(&self.png)
            .map_err(|e| RenderError::ImageProcessing(format!("PNG decoding failed: {e}")))
    }

    /// `data:image/png;base64,...` form of this bitmap.
    pub fn to_data_uri(&self) -> String {
        codec::encode_png_data_uri(&self.png)
    }

    /// Bare base64 payload, as posted to the model.
    pub fn to_base64(&self) -> String {
        codec::encode_base64(&self.png)
    }
}

/// Pixel rectangle on a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle lies fully inside a `width` x `height` canvas.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        right <= width as u64 && bottom <= height as u64
    }
}
