//! Live preview rendering
//!
//! Raw 8-bit grayscale frames are downscaled to a fixed preview size and
//! JPEG-encoded into a `data:` URL for the `live_preview` event.

use crate::capability::FrameSize;
use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::GrayImage;
use thiserror::Error;

pub const PREVIEW_WIDTH: u32 = 400;
pub const PREVIEW_HEIGHT: u32 = 375;

const JPEG_QUALITY: u8 = 75;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },

    #[error("JPEG encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Downscale `pixels` and return `data:image/jpeg;base64,...`
pub fn render_data_url(pixels: &[u8], size: FrameSize) -> Result<String, PreviewError> {
    let expected = size.pixel_count();
    let frame = pixels
        .get(..expected)
        .and_then(|raw| GrayImage::from_raw(size.width, size.height, raw.to_vec()))
        .ok_or(PreviewError::FrameSize {
            expected,
            actual: pixels.len(),
        })?;

    let small = imageops::resize(&frame, PREVIEW_WIDTH, PREVIEW_HEIGHT, FilterType::Triangle);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&small)?;

    Ok(format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(jpeg)
    ))
}
