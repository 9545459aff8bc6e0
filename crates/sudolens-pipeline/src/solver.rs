//! Exhaustive backtracking solver.
//!
//! Depth-first search over the first unknown cell in row-major order,
//! trying 1..=9 in ascending order. A placement is kept only if the
//! value does not already occur in the cell's row, column, or box. When
//! every candidate fails the cell is reset to `0` and the caller moves on
//! to its next candidate.
//!
//! Recursion depth is bounded by the number of unknown cells (at most 81).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::board::SudokuBoard;

/// Outcome of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// The board was completed.
    Solved,
    /// Every branch was exhausted, or the givens already conflict.
    Unsolvable,
    /// The node limit was hit before the search finished.
    LimitReached,
}

impl SolveStatus {
    /// `true` for [`SolveStatus::Solved`].
    #[must_use]
    pub const fn is_solved(self) -> bool {
        matches!(self, Self::Solved)
    }
}

/// Status plus the number of placements the search made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveReport {
    /// Outcome of the search.
    pub status: SolveStatus,
    /// Number of values placed (including ones later undone).
    pub nodes: u64,
}

/// Backtracking solver with an optional placement budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Solver {
    node_limit: Option<u64>,
}

/// Internal branch result.
enum Branch {
    Found,
    Exhausted,
    Aborted,
}

impl Solver {
    /// A solver that searches exhaustively.
    #[must_use]
    pub const fn new() -> Self {
        Self { node_limit: None }
    }

    /// Stop after `limit` placements. `None` removes the limit.
    #[must_use]
    pub const fn with_node_limit(mut self, limit: Option<u64>) -> Self {
        self.node_limit = limit;
        self
    }

    /// Solve `board` in place.
    ///
    /// On success the board holds the first solution found in search
    /// order. Otherwise every value placed by the search has been reset,
    /// so the board is back in its input state.
    ///
    /// Givens that already repeat within a row, column, or box make the
    /// board [`SolveStatus::Unsolvable`] without searching.
    pub fn solve(&self, board: &mut SudokuBoard) -> SolveReport {
        if !board.is_consistent() {
            debug!("givens conflict, not searching");
            return SolveReport {
                status: SolveStatus::Unsolvable,
                nodes: 0,
            };
        }

        let mut nodes = 0;
        let status = match self.search(board, &mut nodes) {
            Branch::Found => SolveStatus::Solved,
            Branch::Exhausted => SolveStatus::Unsolvable,
            Branch::Aborted => SolveStatus::LimitReached,
        };
        debug!(?status, nodes, "search finished");
        SolveReport { status, nodes }
    }

    fn search(&self, board: &mut SudokuBoard, nodes: &mut u64) -> Branch {
        let Some((row, col)) = board.first_empty() else {
            return Branch::Found;
        };

        for value in 1..=9 {
            if !board.allows(row, col, value) {
                continue;
            }
            if self.node_limit.is_some_and(|limit| *nodes >= limit) {
                board.clear(row, col);
                return Branch::Aborted;
            }
            *nodes += 1;
            board.place(row, col, value);
            match self.search(board, nodes) {
                Branch::Found => return Branch::Found,
                Branch::Aborted => {
                    board.clear(row, col);
                    return Branch::Aborted;
                }
                Branch::Exhausted => board.clear(row, col),
            }
        }
        Branch::Exhausted
    }
}

/// Solve `board` in place with an unlimited search.
///
/// Returns `true` when the board was completed. See [`Solver::solve`].
pub fn solve(board: &mut SudokuBoard) -> bool {
    Solver::new().solve(board).status.is_solved()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CLASSIC: [[u8; 9]; 9] = [
        [5, 3, 0, 0, 7, 0, 0, 0, 0],
        [6, 0, 0, 1, 9, 5, 0, 0, 0],
        [0, 9, 8, 0, 0, 0, 0, 6, 0],
        [8, 0, 0, 0, 6, 0, 0, 0, 3],
        [4, 0, 0, 8, 0, 3, 0, 0, 1],
        [7, 0, 0, 0, 2, 0, 0, 0, 6],
        [0, 6, 0, 0, 0, 0, 2, 8, 0],
        [0, 0, 0, 4, 1, 9, 0, 0, 5],
        [0, 0, 0, 0, 8, 0, 0, 7, 9],
    ];

    const CLASSIC_SOLUTION: &str = "534678912672195348198342567859761423426853791713924856961537284287419635345286179";

    #[test]
    fn solves_classic_puzzle() {
        let mut board = SudokuBoard::from_rows(CLASSIC).unwrap();
        assert!(solve(&mut board));
        assert_eq!(board.rows()[0], [5, 3, 4, 6, 7, 8, 9, 1, 2]);
        assert_eq!(board, CLASSIC_SOLUTION.parse().unwrap());
        assert!(board.is_solved());
    }

    #[test]
    fn keeps_givens() {
        let observed = SudokuBoard::from_rows(CLASSIC).unwrap();
        let mut working = observed;
        assert!(solve(&mut working));
        for (row, col, value) in observed.cells() {
            if value != 0 {
                assert_eq!(working.get(row, col), Some(value));
            }
        }
    }

    #[test]
    fn solved_board_is_left_unchanged() {
        let solution: SudokuBoard = CLASSIC_SOLUTION.parse().unwrap();
        let mut board = solution;
        let report = Solver::new().solve(&mut board);
        assert_eq!(report.status, SolveStatus::Solved);
        assert_eq!(report.nodes, 0);
        assert_eq!(board, solution);
    }

    #[test]
    fn empty_board_gets_a_valid_fill() {
        let mut board = SudokuBoard::empty();
        assert!(solve(&mut board));
        assert!(board.is_solved());
    }

    #[test]
    fn forced_contradiction_fails_and_resets() {
        // Row 0 misses 3 and 5; the 3 below in box 0 forces both gaps
        // to 5.
        let mut rows = [[0; 9]; 9];
        rows[0] = [0, 0, 4, 6, 7, 8, 9, 1, 2];
        rows[1][2] = 3;
        let original = SudokuBoard::from_rows(rows).unwrap();
        let mut board = original;

        let report = Solver::new().solve(&mut board);

        assert_eq!(report.status, SolveStatus::Unsolvable);
        assert_eq!(report.nodes, 1);
        assert_eq!(board, original);
    }

    #[test]
    fn conflicting_givens_are_unsolvable() {
        let mut board = SudokuBoard::empty();
        board.set(0, 0, 1).unwrap();
        board.set(0, 8, 1).unwrap();
        let before = board;
        let report = Solver::new().solve(&mut board);
        assert_eq!(report.status, SolveStatus::Unsolvable);
        assert_eq!(board, before);
    }

    #[test]
    fn node_limit_aborts_and_resets() {
        let original = SudokuBoard::from_rows(CLASSIC).unwrap();
        let mut board = original;
        let report = Solver::new()
            .with_node_limit(Some(10))
            .solve(&mut board);
        assert_eq!(report.status, SolveStatus::LimitReached);
        assert_eq!(report.nodes, 10);
        assert_eq!(board, original);
    }

    #[test]
    fn generous_node_limit_still_solves() {
        let mut board = SudokuBoard::from_rows(CLASSIC).unwrap();
        let report = Solver::new()
            .with_node_limit(Some(1_000_000))
            .solve(&mut board);
        assert_eq!(report.status, SolveStatus::Solved);
        assert!(report.nodes >= 51);
    }

    #[test]
    fn every_row_column_and_box_is_a_permutation() {
        let mut board = SudokuBoard::from_rows(CLASSIC).unwrap();
        assert!(solve(&mut board));
        let rows = board.rows();
        for i in 0..9 {
            let mut row: Vec<u8> = rows[i].to_vec();
            let mut col: Vec<u8> = (0..9).map(|r| rows[r][i]).collect();
            let (br, bc) = (i / 3 * 3, i % 3 * 3);
            let mut bx: Vec<u8> = (0..9).map(|k| rows[br + k / 3][bc + k % 3]).collect();
            row.sort_unstable();
            col.sort_unstable();
            bx.sort_unstable();
            let expected: Vec<u8> = (1..=9).collect();
            assert_eq!(row, expected);
            assert_eq!(col, expected);
            assert_eq!(bx, expected);
        }
    }
}
