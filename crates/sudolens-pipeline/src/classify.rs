//! Digit classification seam.
//!
//! The pipeline does not ship a recognizer. Callers supply anything that
//! maps a canonical cell image to a label in `0..=9`; a label of `0`
//! means "no digit". Closures work directly through the blanket impl.

use image::GrayImage;
use tracing::debug;

use crate::board::{SIZE, SudokuBoard};
use crate::cell::CellImage;
use crate::types::PipelineError;

/// Maps a canonical `cell_size × cell_size` cell image to a digit.
pub trait Classifier {
    /// Label for `cell`: `1..=9` for a digit, `0` for none. Any other
    /// value aborts the pipeline with
    /// [`PipelineError::AmbiguousClassification`].
    fn classify(&self, cell: &GrayImage) -> u8;
}

impl<F> Classifier for F
where
    F: Fn(&GrayImage) -> u8,
{
    fn classify(&self, cell: &GrayImage) -> u8 {
        self(cell)
    }
}

/// Build the observed board from 81 row-major cell images.
///
/// Blank cells become `0` without consulting the classifier.
///
/// # Errors
///
/// Returns [`PipelineError::AmbiguousClassification`] for the first cell
/// whose label exceeds 9.
pub fn classify_cells<C: Classifier + ?Sized>(
    classifier: &C,
    cells: &[CellImage],
) -> Result<SudokuBoard, PipelineError> {
    let mut board = SudokuBoard::empty();
    for (index, cell) in cells.iter().enumerate().take(SIZE * SIZE) {
        let CellImage::Digit(pixels) = cell else {
            continue;
        };
        let (row, col) = (index / SIZE, index % SIZE);
        let label = classifier.classify(pixels);
        board
            .set(row, col, label)
            .map_err(|_| PipelineError::AmbiguousClassification { row, col, label })?;
    }
    debug!(givens = 81 - board.empty_count(), "classified cells");
    Ok(board)
}
