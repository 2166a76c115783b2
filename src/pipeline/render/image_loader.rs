//! Raster image loading for the workspace canvas.
//!
//! Uploaded photos and scans are decoded, rotated per EXIF, flattened onto
//! white and fitted inside `MAX_CANVAS_WIDTH` x `MAX_CANVAS_HEIGHT` before
//! being encoded as the canvas PNG.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use tracing::debug;

use super::{PageBitmap, RenderError};

pub const MAX_CANVAS_WIDTH: u32 = 800;
pub const MAX_CANVAS_HEIGHT: u32 = 1000;

/// Largest source image accepted, in pixels (about 50 megapixels).
pub const MAX_SOURCE_PIXELS: u64 = 50_000_000;

/// Decode an image upload into a canvas bitmap.
pub fn load_image_canvas(bytes: &[u8]) -> Result<PageBitmap, RenderError> {
    check_source_dimensions(bytes, MAX_SOURCE_PIXELS)?;

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| RenderError::InvalidData(format!("Cannot decode image: {e}")))?;

    let orientation = read_exif_orientation(bytes);
    let oriented = apply_orientation(decoded, orientation);
    let flattened = flatten_onto_white(&oriented);

    let (src_w, src_h) = flattened.dimensions();
    let (target_w, target_h) = fit_dimensions(src_w, src_h, MAX_CANVAS_WIDTH, MAX_CANVAS_HEIGHT);

    let canvas = if (target_w, target_h) == (src_w, src_h) {
        DynamicImage::ImageRgb8(flattened)
    } else {
        DynamicImage::ImageRgb8(flattened).resize_exact(target_w, target_h, FilterType::CatmullRom)
    };

    debug!(
        orientation,
        source_width = src_w,
        source_height = src_h,
        width = target_w,
        height = target_h,
        "Loaded image canvas"
    );

    PageBitmap::from_image(&canvas)
}

/// Read the header dimensions and reject images above `max_pixels` before
/// any pixel data is decoded.
pub fn check_source_dimensions(bytes: &[u8], max_pixels: u64) -> Result<(u32, u32), RenderError> {
    let (width, height) = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| RenderError::InvalidData(format!("Cannot read image header: {e}")))?
        .into_dimensions()
        .map_err(|e| RenderError::InvalidData(format!("Cannot decode image: {e}")))?;

    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(RenderError::InvalidData(format!(
            "Image is too large: {width}x{height} exceeds {max_pixels} pixels"
        )));
    }
    Ok((width, height))
}

/// Fit `width` x `height` inside the given box, keeping aspect ratio.
///
/// The width cap is applied first, then the height cap, and the result is
/// truncated to whole pixels (minimum 1). Images already inside the box are
/// never upscaled.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let mut w = width as f64;
    let mut h = height as f64;

    if w > max_width as f64 {
        h *= max_width as f64 / w;
        w = max_width as f64;
    }
    if h > max_height as f64 {
        w *= max_height as f64 / h;
        h = max_height as f64;
    }

    ((w as u32).max(1), (h as u32).max(1))
}

/// Composite any alpha channel onto an opaque white background.
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut out = RgbImage::new(w, h);
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Read the EXIF orientation tag (1-8). Returns 1 when absent or unreadable.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
