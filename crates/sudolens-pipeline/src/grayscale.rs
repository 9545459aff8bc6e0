//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces a
//! single-channel grayscale image. Every later stage works on luma only;
//! color photographs are reduced here, once.

use image::{DynamicImage, GrayImage};

use crate::types::PipelineError;

/// Decode raw image bytes without converting them.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Convert any decoded image to 8-bit luma.
///
/// Uses the `image` crate's weighted luminance conversion, so green
/// contributes most and blue least.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Decode raw image bytes and convert to grayscale.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, PipelineError> {
    decode(bytes).map(|img| to_grayscale(&img))
}
