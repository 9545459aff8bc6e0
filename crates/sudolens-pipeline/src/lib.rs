//! sudolens-pipeline: Sudoku extraction and solving (sans-IO).
//!
//! Turns a photograph of a printed Sudoku into a solved board through:
//! grayscale -> blur -> adaptive threshold -> border location ->
//! perspective rectification -> 9×9 segmentation -> cell isolation ->
//! classification -> backtracking search.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and images and returns structured data. Digit recognition
//! is not included: callers inject a [`Classifier`]. Filesystem access
//! and rendering live in `sudolens-cli` and `sudolens-export`.

pub mod blur;
pub mod board;
pub mod cell;
pub mod classify;
pub mod contour;
pub mod diagnostics;
pub mod grayscale;
pub mod grid;
pub mod pipeline;
pub mod preprocess;
pub mod solver;
pub mod threshold;
pub mod types;
pub mod warp;

pub use board::{InvalidValue, ParseBoardError, SudokuBoard};
pub use cell::CellImage;
pub use classify::Classifier;
pub use grid::Grid81;
pub use pipeline::{Pipeline, SudokuPipeline};
pub use solver::{SolveReport, SolveStatus, Solver};
pub use types::{
    Dimensions, GrayImage, PipelineConfig, PipelineError, Point, ProcessResult, Quadrilateral,
    Rect, StagedResult,
};

/// Run the full pipeline on encoded image bytes, keeping every
/// intermediate.
///
/// # Pipeline steps
///
/// 1. Decode image and convert to grayscale
/// 2. Gaussian blur, adaptive threshold, invert, dilate
/// 3. Largest external outline reduced to four corners
/// 4. Perspective warp onto a square
/// 5. Binarize the square and split it into 81 cells
/// 6. Isolate and normalize the digit in each cell
/// 7. Classify non-blank cells
/// 8. Solve a copy of the observed board
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Returns [`PipelineError::NoContourFound`] if the mask has no foreground.
/// Returns [`PipelineError::DegenerateQuadrilateral`] if the border collapses.
/// Returns [`PipelineError::AmbiguousClassification`] if the classifier
/// returns a label above 9.
pub fn process_staged<C: Classifier + ?Sized>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    classifier: &C,
) -> Result<StagedResult, PipelineError> {
    config.validate()?;
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .preprocess()
        .locate()?
        .rectify()?
        .segment()
        .isolate()
        .classify(classifier)?
        .solve()
        .into_result())
}

/// Run the full pipeline and keep only the boards, the border, and the
/// rectified image.
///
/// # Errors
///
/// See [`process_staged`].
pub fn process<C: Classifier + ?Sized>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    classifier: &C,
) -> Result<ProcessResult, PipelineError> {
    process_staged(image_bytes, config, classifier).map(StagedResult::into_process_result)
}
