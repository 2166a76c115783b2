//! PDF page rendering via Google PDFium.
//!
//! `PdfiumRenderer` is stateless (`Send + Sync`). Each operation creates
//! a fresh `Pdfium` instance because the upstream type is `!Send`.
//! The OS caches `dlopen`/`LoadLibrary` calls, so repeat loads are near-free.

use image::{DynamicImage, Rgb, RgbImage};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::{PageBitmap, RenderError};

/// Maximum dimension (width or height) for rendered page images.
const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

pub const DEFAULT_ZOOM: u32 = 100;
pub const MIN_ZOOM: u32 = 25;
pub const MAX_ZOOM: u32 = 300;

/// Rasterizes PDF pages. Page indices are zero-based.
pub trait PdfPageRenderer: Send + Sync {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, RenderError>;

    /// Render one page at `zoom` percent (100 = one pixel per PDF point).
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        zoom: u32,
    ) -> Result<PageBitmap, RenderError>;
}

/// Rendering DPI for a zoom percentage.
pub fn dpi_for_zoom(zoom: u32) -> f32 {
    POINTS_PER_INCH * zoom as f32 / 100.0
}

/// Renders PDF pages to PNG canvases using Google PDFium.
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Create a new renderer, verifying the PDFium library is loadable.
    ///
    /// Discovery order:
    /// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to library file)
    /// 2. Alongside the running executable, or its `pdfium/` subdirectory
    /// 3. System library search paths
    pub fn new() -> Result<Self, RenderError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

fn load_pdfium() -> Result<Pdfium, RenderError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| RenderError::PdfRendering {
            page: 0,
            reason: format!("Failed to load PDFium from {path}: {e}"),
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidates = [
                exe_dir.to_path_buf(),
                exe_dir.join("pdfium").join("lib"),
                exe_dir.join("pdfium").join("bin"),
            ];

            for dir in &candidates {
                let lib_path =
                    Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium from candidate directory");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| RenderError::PdfRendering {
        page: 0,
        reason: format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ),
    })?;
    Ok(Pdfium::new(bindings))
}

fn map_load_error(e: PdfiumError) -> RenderError {
    let lower = e.to_string().to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        RenderError::PdfEncrypted
    } else {
        RenderError::PdfRendering {
            page: 0,
            reason: format!("Failed to load PDF: {e}"),
        }
    }
}

/// Pixel dimensions for a page at `zoom` percent, clamped to
/// `[1, MAX_DIMENSION_PX]` with aspect ratio preserved when capping.
pub(crate) fn compute_render_dimensions(width_points: f32, height_points: f32, zoom: u32) -> (u32, u32) {
    let scale = dpi_for_zoom(zoom) / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, RenderError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        zoom: u32,
    ) -> Result<PageBitmap, RenderError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let pages = document.pages();

        let index = u16::try_from(page_index).map_err(|_| RenderError::PdfRendering {
            page: page_index,
            reason: format!("Page index {page_index} exceeds u16 maximum"),
        })?;

        let page = pages.get(index).map_err(|_| RenderError::PdfRendering {
            page: page_index,
            reason: format!(
                "Page {page_index} out of range (document has {} pages)",
                pages.len()
            ),
        })?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, zoom);

        let scale = zoom as f32 / 100.0;
        let uncapped_w = (width_points * scale) as u32;
        let uncapped_h = (height_points * scale) as u32;
        if target_w != uncapped_w || target_h != uncapped_h {
            warn!(
                page = page_index,
                raw_width = uncapped_w,
                raw_height = uncapped_h,
                capped_width = target_w,
                capped_height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| RenderError::PdfRendering {
                page: page_index,
                reason: format!("Rendering failed: {e}"),
            })?;

        let rendered = bitmap.as_image();
        let canvas = PageBitmap::from_image(&rendered)?;

        debug!(
            page = page_index,
            zoom,
            width = canvas.width,
            height = canvas.height,
            png_size = canvas.png.len(),
            "Rendered PDF page"
        );

        Ok(canvas)
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock renderer producing blank white pages of a fixed point size.
///
/// Used by workspace and API tests that need a `PdfPageRenderer` without
/// the PDFium binary.
pub struct MockPdfPageRenderer {
    page_count: usize,
    width_points: f32,
    height_points: f32,
}

impl MockPdfPageRenderer {
    /// Pages sized like a small card (200 x 300 pt) to keep test PNGs tiny.
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            width_points: 200.0,
            height_points: 300.0,
        }
    }

    pub fn with_page_size(mut self, width_points: f32, height_points: f32) -> Self {
        self.width_points = width_points;
        self.height_points = height_points;
        self
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, RenderError> {
        Ok(self.page_count)
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        zoom: u32,
    ) -> Result<PageBitmap, RenderError> {
        if page_index >= self.page_count {
            return Err(RenderError::PdfRendering {
                page: page_index,
                reason: format!(
                    "Page {page_index} out of range (mock has {} pages)",
                    self.page_count
                ),
            });
        }
        let (w, h) = compute_render_dimensions(self.width_points, self.height_points, zoom);
        let page = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])));
        PageBitmap::from_image(&page)
    }
}
