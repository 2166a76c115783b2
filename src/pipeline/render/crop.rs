use image::{imageops, DynamicImage, GenericImageView, Rgb, RgbImage};

use super::{flatten_onto_white, CropRect, PageBitmap, RenderError};

/// Copy `rect` out of a canvas into a new canvas.
pub fn crop_bitmap(canvas: &PageBitmap, rect: CropRect) -> Result<PageBitmap, RenderError> {
    validate_rect(canvas, rect)?;
    let source = canvas.decode()?;
    let region = imageops::crop_imm(&source, rect.x, rect.y, rect.width, rect.height).to_image();
    PageBitmap::from_image(&DynamicImage::ImageRgba8(region))
}

/// Copy `rect` onto a fresh white background of the same size.
///
/// Used for detected visual elements so the crop is always opaque.
pub fn crop_region_on_white(canvas: &PageBitmap, rect: CropRect) -> Result<PageBitmap, RenderError> {
    validate_rect(canvas, rect)?;
    let source = canvas.decode()?;
    let region = DynamicImage::ImageRgba8(
        imageops::crop_imm(&source, rect.x, rect.y, rect.width, rect.height).to_image(),
    );

    let mut background = RgbImage::from_pixel(rect.width, rect.height, Rgb([255, 255, 255]));
    imageops::overlay(&mut background, &flatten_onto_white(&region), 0, 0);
    PageBitmap::from_image(&DynamicImage::ImageRgb8(background))
}

fn validate_rect(canvas: &PageBitmap, rect: CropRect) -> Result<(), RenderError> {
    if rect.is_empty() {
        return Err(RenderError::InvalidCrop("crop area is empty".into()));
    }
    if !rect.fits_within(canvas.width, canvas.height) {
        return Err(RenderError::InvalidCrop(format!(
            "{}x{} at ({}, {}) exceeds canvas {}x{}",
            rect.width, rect.height, rect.x, rect.y, canvas.width, canvas.height
        )));
    }
    Ok(())
}

/// Single-colour canvas for tests.
#[cfg(test)]
pub(crate) fn solid_canvas(width: u32, height: u32, rgb: [u8; 3]) -> PageBitmap {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)));
    PageBitmap::from_image(&img).unwrap()
}
