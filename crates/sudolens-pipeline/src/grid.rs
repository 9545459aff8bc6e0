//! Partition the rectified square into the 81 cell rectangles.
//!
//! Cell boundaries stay fractional here; truncation happens only when a
//! cell is cropped, so rounding error never accumulates across a row.

use serde::{Deserialize, Serialize};

use crate::board::{CELL_COUNT, SIZE};
use crate::types::{Point, Rect};

/// The 81 cell rectangles of a rectified grid, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid81 {
    cells: Vec<Rect>,
    cell_side: f64,
}

impl Grid81 {
    /// Rectangle of the cell at `(row, col)`.
    ///
    /// Returns `None` if either index is outside `0..9`.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<&Rect> {
        if row >= SIZE || col >= SIZE {
            return None;
        }
        self.cells.get(row * SIZE + col)
    }

    /// All rectangles in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Rect] {
        &self.cells
    }

    /// Side length of a cell in pixels (fractional).
    #[must_use]
    pub const fn cell_side(&self) -> f64 {
        self.cell_side
    }
}

/// Split a square image of side `side` into 9×9 equal cells.
///
/// Row `j`, column `i` spans `(i·s, j·s)` to `((i+1)·s, (j+1)·s)` with
/// `s = side / 9`.
#[must_use]
pub fn segment(side: u32) -> Grid81 {
    #[allow(clippy::cast_precision_loss)]
    let cell_side = f64::from(side) / SIZE as f64;
    let mut cells = Vec::with_capacity(CELL_COUNT);
    for j in 0..SIZE {
        for i in 0..SIZE {
            #[allow(clippy::cast_precision_loss)]
            let (x, y) = (i as f64, j as f64);
            cells.push(Rect::new(
                Point::new(x * cell_side, y * cell_side),
                Point::new((x + 1.0) * cell_side, (y + 1.0) * cell_side),
            ));
        }
    }
    Grid81 { cells, cell_side }
}
