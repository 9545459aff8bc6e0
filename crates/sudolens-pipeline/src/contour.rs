//! Locate the grid border: the largest external outline in a binary mask,
//! reduced to four corners.
//!
//! Outlines come from Suzuki-Abe border following via
//! [`imageproc::contours::find_contours`]. Only outer borders without a
//! parent are considered, so digits and cell interiors never compete
//! with the grid itself.
//!
//! # Corner heuristic
//!
//! Corners are the extrema of `x + y` and `x - y` over the outline's
//! points. This is fast and exact for a roughly axis-aligned grid with
//! moderate perspective, but it is not a minimum-area quadrilateral fit:
//! a grid rotated by close to 45° will have its corners misassigned.

use image::GrayImage;
use imageproc::contours::{BorderType, Contour};
use tracing::debug;

use crate::types::{PipelineError, Point, Quadrilateral};

/// Find the external outline enclosing the largest area.
///
/// Ties keep the outline traced first.
///
/// # Errors
///
/// Returns [`PipelineError::NoContourFound`] if the mask has no
/// foreground pixels.
pub fn largest_outline(mask: &GrayImage) -> Result<Vec<Point>, PipelineError> {
    let contours: Vec<Contour<i32>> = imageproc::contours::find_contours(mask);

    let mut best: Option<(f64, &Contour<i32>)> = None;
    let mut external = 0_usize;
    for contour in contours
        .iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
    {
        external += 1;
        let area = enclosed_area(&contour.points);
        if best.is_none_or(|(best_area, _)| area > best_area) {
            best = Some((area, contour));
        }
    }

    let (area, contour) = best.ok_or(PipelineError::NoContourFound)?;
    debug!(
        outlines = external,
        area,
        points = contour.points.len(),
        "largest outline"
    );
    Ok(contour
        .points
        .iter()
        .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
        .collect())
}

/// Area enclosed by a closed polygon (shoelace formula, absolute value).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn enclosed_area(points: &[imageproc::point::Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice.unsigned_abs() as f64 / 2.0
}

/// Reduce an outline to its four extreme corners.
///
/// Returns `None` for an empty outline. Ties keep the first point in
/// traversal order.
#[must_use]
pub fn extreme_corners(outline: &[Point]) -> Option<Quadrilateral> {
    let first = *outline.first()?;
    let mut quad = Quadrilateral {
        top_left: first,
        top_right: first,
        bottom_right: first,
        bottom_left: first,
    };
    let sum = |p: Point| p.x + p.y;
    let diff = |p: Point| p.x - p.y;

    for &p in &outline[1..] {
        if sum(p) < sum(quad.top_left) {
            quad.top_left = p;
        }
        if sum(p) > sum(quad.bottom_right) {
            quad.bottom_right = p;
        }
        if diff(p) < diff(quad.bottom_left) {
            quad.bottom_left = p;
        }
        if diff(p) > diff(quad.top_right) {
            quad.top_right = p;
        }
    }
    Some(quad)
}

/// Locate the grid border in a binary mask.
///
/// # Errors
///
/// Returns [`PipelineError::NoContourFound`] if the mask has no
/// foreground pixels.
pub fn locate(mask: &GrayImage) -> Result<Quadrilateral, PipelineError> {
    let outline = largest_outline(mask)?;
    let quad = extreme_corners(&outline).ok_or(PipelineError::NoContourFound)?;
    debug!(?quad, "located quadrilateral");
    Ok(quad)
}
