//! Perspective rectification of the located grid.
//!
//! Builds the projective transform taking the quadrilateral's corners to
//! an axis-aligned square whose side is the longest observed edge, then
//! resamples the source through it with bilinear interpolation via
//! [`imageproc::geometric_transformations::warp_into`].

use image::GrayImage;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::debug;

use crate::types::{PipelineError, Quadrilateral};

/// Edges at or below this length (in pixels) count as collapsed.
pub const MIN_EDGE_LENGTH: f64 = 1e-6;

/// Side length of the rectified square for `quad`.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateQuadrilateral`] if any edge is at
/// most [`MIN_EDGE_LENGTH`] long.
pub fn rectified_side(quad: &Quadrilateral) -> Result<f64, PipelineError> {
    let edges = quad.edge_lengths();
    if edges
        .iter()
        .any(|&len| len <= MIN_EDGE_LENGTH || !len.is_finite())
    {
        return Err(PipelineError::DegenerateQuadrilateral);
    }
    Ok(quad.longest_edge())
}

/// The projective transform mapping `quad` onto the square
/// `(0, 0), (side - 1, 0), (side - 1, side - 1), (0, side - 1)`.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateQuadrilateral`] if the four
/// correspondences do not define a projective transform (for example,
/// three collinear corners).
#[allow(clippy::cast_possible_truncation)]
pub fn projection(quad: &Quadrilateral, side: f64) -> Result<Projection, PipelineError> {
    let far = (side - 1.0) as f32;
    let from = quad.corners().map(|p| (p.x as f32, p.y as f32));
    let to = [(0.0, 0.0), (far, 0.0), (far, far), (0.0, far)];
    Projection::from_control_points(from, to).ok_or(PipelineError::DegenerateQuadrilateral)
}

/// Rectify the grid in `image` bounded by `quad` into a square image.
///
/// The output is `⌊side⌋ × ⌊side⌋` where `side` is the longest edge of
/// `quad`. Output pixels whose pre-image falls outside the source are
/// black.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateQuadrilateral`] if the
/// quadrilateral has a collapsed edge, is smaller than one pixel, or
/// admits no projective transform.
pub fn rectify(image: &GrayImage, quad: &Quadrilateral) -> Result<GrayImage, PipelineError> {
    let side = rectified_side(quad)?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let out_side = side as u32;
    if out_side == 0 {
        return Err(PipelineError::DegenerateQuadrilateral);
    }

    let projection = projection(quad, side)?;
    let mut output = GrayImage::new(out_side, out_side);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        image::Luma([0]),
        &mut output,
    );
    debug!(side, out_side, "rectified");
    Ok(output)
}
