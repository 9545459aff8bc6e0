//! Shared types for the sudolens extraction pipeline.

use serde::{Deserialize, Serialize};

use crate::board::SudokuBoard;
use crate::cell::CellImage;
use crate::grid::Grid81;
use crate::solver::SolveReport;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Four corners of the located grid border.
///
/// The field order is the canonical corner order used everywhere in the
/// pipeline: top-left, top-right, bottom-right, bottom-left. Perspective
/// rectification maps the corners in exactly this order, so swapping two
/// of them mirrors or rotates the rectified image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    /// Corner minimizing `x + y`.
    pub top_left: Point,
    /// Corner maximizing `x - y`.
    pub top_right: Point,
    /// Corner maximizing `x + y`.
    pub bottom_right: Point,
    /// Corner minimizing `x - y`.
    pub bottom_left: Point,
}

impl Quadrilateral {
    /// Corners in canonical order.
    #[must_use]
    pub const fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Lengths of the four edges: right, left, bottom, top.
    #[must_use]
    pub fn edge_lengths(&self) -> [f64; 4] {
        [
            self.bottom_right.distance(self.top_right),
            self.top_left.distance(self.bottom_left),
            self.bottom_right.distance(self.bottom_left),
            self.top_left.distance(self.top_right),
        ]
    }

    /// The longest of the four edges.
    #[must_use]
    pub fn longest_edge(&self) -> f64 {
        self.edge_lengths().into_iter().fold(0.0, f64::max)
    }
}

/// Axis-aligned rectangle given by its top-left and bottom-right corners.
///
/// Coordinates are floating point; integer pixel bounds are produced by
/// truncation only when cropping (see [`Rect::pixel_bounds`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left corner (inclusive).
    pub top_left: Point,
    /// Bottom-right corner (exclusive when cropping).
    pub bottom_right: Point,
}

impl Rect {
    /// Create a rectangle from its two corners.
    #[must_use]
    pub const fn new(top_left: Point, bottom_right: Point) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// Horizontal extent (may be negative for a malformed rectangle).
    #[must_use]
    pub fn width(&self) -> f64 {
        self.bottom_right.x - self.top_left.x
    }

    /// Vertical extent (may be negative for a malformed rectangle).
    #[must_use]
    pub fn height(&self) -> f64 {
        self.bottom_right.y - self.top_left.y
    }

    /// Area of the rectangle, `0.0` when degenerate.
    #[must_use]
    pub fn area(&self) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            self.width() * self.height()
        }
    }

    /// `true` unless bottom-right lies strictly below and right of top-left.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Truncated integer bounds `(x0, y0, x1, y1)` clamped to an image of
    /// the given dimensions. `x1`/`y1` are exclusive and never smaller
    /// than `x0`/`y0`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "coordinates are clamped to the image before the cast"
    )]
    pub fn pixel_bounds(&self, dimensions: Dimensions) -> (u32, u32, u32, u32) {
        let clamp = |v: f64, max: u32| v.clamp(0.0, f64::from(max)) as u32;
        let x0 = clamp(self.top_left.x, dimensions.width);
        let y0 = clamp(self.top_left.y, dimensions.height);
        let x1 = clamp(self.bottom_right.x, dimensions.width).max(x0);
        let y1 = clamp(self.bottom_right.y, dimensions.height).max(y0);
        (x0, y0, x1, y1)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image.
    #[must_use]
    pub fn of(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// Configuration for the extraction pipeline and solver.
///
/// Defaults reproduce the classic OpenCV Sudoku recipe: 9×9 Gaussian
/// blur, 11-pixel adaptive Gaussian threshold with an offset of 2, a 3×3
/// dilation, and 28×28 canonical cell images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Gaussian pre-blur kernel size (odd). The sigma is derived from it.
    pub blur_kernel: u32,

    /// Neighbourhood size (odd) of the adaptive threshold.
    pub threshold_block: u32,

    /// Constant subtracted from the local mean before thresholding.
    pub threshold_offset: f32,

    /// Dilation radius in pixels (square structuring element of side
    /// `2 * radius + 1`). Zero disables dilation.
    pub dilate_radius: u8,

    /// Side length of the canonical cell image handed to the classifier.
    pub cell_size: u32,

    /// Total padding reserved around the scaled digit along its longer
    /// axis.
    pub cell_margin: u32,

    /// Bounding-box area (in pixels) at or below which a cell is blank.
    pub min_digit_area: u32,

    /// Maximum number of solver placements before giving up.
    /// `None` searches exhaustively.
    pub node_limit: Option<u64>,
}

impl PipelineConfig {
    /// Default Gaussian pre-blur kernel size.
    pub const DEFAULT_BLUR_KERNEL: u32 = 9;
    /// Default adaptive threshold neighbourhood.
    pub const DEFAULT_THRESHOLD_BLOCK: u32 = 11;
    /// Default adaptive threshold offset.
    pub const DEFAULT_THRESHOLD_OFFSET: f32 = 2.0;
    /// Default dilation radius (3×3 kernel).
    pub const DEFAULT_DILATE_RADIUS: u8 = 1;
    /// Default canonical cell size.
    pub const DEFAULT_CELL_SIZE: u32 = 28;
    /// Default padding around the scaled digit.
    pub const DEFAULT_CELL_MARGIN: u32 = 12;
    /// Default minimum ink bounding-box area.
    pub const DEFAULT_MIN_DIGIT_AREA: u32 = 100;

    /// Check the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when a kernel or block
    /// size is even or zero, the cell size is zero, or the margin leaves
    /// no room for the digit.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_kernel must be odd and positive, got {}",
                self.blur_kernel
            )));
        }
        if self.threshold_block < 3 || self.threshold_block % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold_block must be odd and at least 3, got {}",
                self.threshold_block
            )));
        }
        if !self.threshold_offset.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "threshold_offset must be finite".to_owned(),
            ));
        }
        if self.cell_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "cell_size must be positive".to_owned(),
            ));
        }
        if self.cell_margin >= self.cell_size {
            return Err(PipelineError::InvalidConfig(format!(
                "cell_margin ({}) must be smaller than cell_size ({})",
                self.cell_margin, self.cell_size
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blur_kernel: Self::DEFAULT_BLUR_KERNEL,
            threshold_block: Self::DEFAULT_THRESHOLD_BLOCK,
            threshold_offset: Self::DEFAULT_THRESHOLD_OFFSET,
            dilate_radius: Self::DEFAULT_DILATE_RADIUS,
            cell_size: Self::DEFAULT_CELL_SIZE,
            cell_margin: Self::DEFAULT_CELL_MARGIN,
            min_digit_area: Self::DEFAULT_MIN_DIGIT_AREA,
            node_limit: None,
        }
    }
}

/// Result of running the full pipeline on one photograph.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Board as read by the classifier. Never modified by the solver.
    pub observed: SudokuBoard,
    /// Solver's working copy: complete on success, otherwise whatever
    /// state the search left behind.
    pub solved: SudokuBoard,
    /// Outcome of the search.
    pub report: SolveReport,
    /// Grid border located in the source image.
    pub quadrilateral: Quadrilateral,
    /// Perspective-rectified grayscale grid.
    pub rectified: GrayImage,
}

/// Result of running the pipeline with every intermediate preserved.
///
/// Note: does not derive `PartialEq` because comparing full rasters is
/// never what a caller wants.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Decoded grayscale source image.
    pub grayscale: GrayImage,
    /// Binary mask of the source (ink = 255).
    pub binary: GrayImage,
    /// Located grid border.
    pub quadrilateral: Quadrilateral,
    /// Perspective-rectified grayscale grid.
    pub rectified: GrayImage,
    /// Binary mask of the rectified grid.
    pub rectified_binary: GrayImage,
    /// The 81 cell rectangles.
    pub grid: Grid81,
    /// Canonical cell images, row-major.
    pub cells: Vec<CellImage>,
    /// Classifier output.
    pub observed: SudokuBoard,
    /// Solver output.
    pub solved: SudokuBoard,
    /// Outcome of the search.
    pub report: SolveReport,
}

impl StagedResult {
    /// Drop the intermediates and keep what a caller rendering the
    /// result needs.
    #[must_use]
    pub fn into_process_result(self) -> ProcessResult {
        ProcessResult {
            observed: self.observed,
            solved: self.solved,
            report: self.report,
            quadrilateral: self.quadrilateral,
            rectified: self.rectified,
        }
    }
}

/// Errors that abort pipeline processing.
///
/// An unsolvable board is not an error: misreads are expected and the
/// pipeline reports them through [`crate::SolveStatus`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The binary mask contains no foreground outline.
    #[error("no contour found in the image")]
    NoContourFound,

    /// The located grid border collapses to a line or a point.
    #[error("located quadrilateral is degenerate")]
    DegenerateQuadrilateral,

    /// The classifier returned a label outside `0..=9`.
    #[error("classifier returned label {label} for cell ({row}, {col})")]
    AmbiguousClassification {
        /// Row of the offending cell.
        row: usize,
        /// Column of the offending cell.
        col: usize,
        /// The out-of-range label.
        label: u8,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    // --- Quadrilateral tests ---

    #[test]
    fn longest_edge_of_skewed_quad() {
        let quad = Quadrilateral {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(10.0, 0.0),
            bottom_right: Point::new(12.0, 10.0),
            bottom_left: Point::new(0.0, 10.0),
        };
        let expected = 2.0_f64.hypot(10.0).max(12.0);
        assert!((quad.longest_edge() - expected).abs() < 1e-9);
    }

    #[test]
    fn corners_keep_canonical_order() {
        let quad = Quadrilateral {
            top_left: Point::new(1.0, 1.0),
            top_right: Point::new(2.0, 1.0),
            bottom_right: Point::new(2.0, 2.0),
            bottom_left: Point::new(1.0, 2.0),
        };
        let corners = quad.corners();
        assert_eq!(corners[0], quad.top_left);
        assert_eq!(corners[1], quad.top_right);
        assert_eq!(corners[2], quad.bottom_right);
        assert_eq!(corners[3], quad.bottom_left);
    }

    // --- Rect tests ---

    #[test]
    fn rect_degenerate_when_inverted() {
        let rect = Rect::new(Point::new(5.0, 5.0), Point::new(4.0, 9.0));
        assert!(rect.is_degenerate());
        assert!(rect.area().abs() < f64::EPSILON);
    }

    #[test]
    fn pixel_bounds_truncate_and_clamp() {
        let rect = Rect::new(Point::new(2.9, -3.0), Point::new(30.7, 7.99));
        let dims = Dimensions {
            width: 20,
            height: 20,
        };
        assert_eq!(rect.pixel_bounds(dims), (2, 0, 20, 7));
    }

    // --- PipelineConfig tests ---

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn even_blur_kernel_rejected() {
        let config = PipelineConfig {
            blur_kernel: 8,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn margin_must_leave_room_for_digit() {
        let config = PipelineConfig {
            cell_margin: 28,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_round_trips_through_json_with_missing_fields() {
        let config: PipelineConfig = serde_json::from_str(r#"{"cell_size": 32}"#).unwrap();
        assert_eq!(config.cell_size, 32);
        assert_eq!(config.blur_kernel, PipelineConfig::DEFAULT_BLUR_KERNEL);
    }
}
