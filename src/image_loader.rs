//! Decoding of cached thumbnail files for display.

use crate::config::{PLACEHOLDER_RGB, THUMBNAIL_MAX_HEIGHT, THUMBNAIL_MAX_WIDTH};
use crate::error::Result;
use log::warn;
use std::path::Path;

/// Decodes an image file into RGB8 pixels. Returns `(data, width, height)`.
pub fn load_image_blocking(path: &Path) -> Result<(Vec<u8>, u32, u32)> {
    let image = image::ImageReader::open(path)
        .map_err(|e| crate::error::AppError::cache(path, e))?
        .with_guessed_format()
        .map_err(|e| crate::error::AppError::cache(path, e))?
        .decode()?;

    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok((rgb.into_raw(), width, height))
}

/// Decodes a thumbnail, falling back to a solid placeholder-coloured
/// buffer when the file is missing or not a valid image.
pub fn load_thumbnail_or_placeholder(path: &Path) -> (Vec<u8>, u32, u32) {
    match load_image_blocking(path) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Failed to load thumbnail {}: {}", path.display(), e);
            placeholder_pixels()
        }
    }
}

fn placeholder_pixels() -> (Vec<u8>, u32, u32) {
    let pixel_count = (THUMBNAIL_MAX_WIDTH * THUMBNAIL_MAX_HEIGHT) as usize;
    let data = PLACEHOLDER_RGB.repeat(pixel_count);
    (data, THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT)
}
