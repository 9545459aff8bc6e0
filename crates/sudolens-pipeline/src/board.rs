//! The 9×9 Sudoku board.
//!
//! A [`SudokuBoard`] holds values `0..=9` where `0` marks an unknown
//! cell. The pipeline keeps two boards per run: the observed board
//! produced by the classifier, which is never modified afterwards, and a
//! working copy handed to the solver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of rows, columns, and boxes.
pub const SIZE: usize = 9;

/// Number of cells on the board.
pub const CELL_COUNT: usize = SIZE * SIZE;

/// A value outside `0..=9` was offered to a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cell ({row}, {col}) value {value} is not in 0..=9")]
pub struct InvalidValue {
    /// Row of the offending cell.
    pub row: usize,
    /// Column of the offending cell.
    pub col: usize,
    /// The rejected value.
    pub value: u8,
}

/// Error for [`SudokuBoard::from_str`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseBoardError {
    /// Input does not contain exactly 81 cell symbols.
    #[error("board should have 81 cells, found {0}")]
    WrongLength(usize),
    /// Input contains a character that is neither a cell nor a separator.
    #[error("invalid symbol {symbol:?} at cell {index}")]
    InvalidSymbol {
        /// Index of the cell the symbol would have filled.
        index: usize,
        /// The rejected character.
        symbol: char,
    },
}

/// A 9×9 Sudoku board; `0` means unknown.
///
/// Deserialization goes through [`SudokuBoard::from_rows`], so values
/// above 9 are rejected there too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "[[u8; SIZE]; SIZE]")]
pub struct SudokuBoard([[u8; SIZE]; SIZE]);

impl TryFrom<[[u8; SIZE]; SIZE]> for SudokuBoard {
    type Error = InvalidValue;

    fn try_from(rows: [[u8; SIZE]; SIZE]) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl SudokuBoard {
    /// An all-unknown board.
    #[must_use]
    pub const fn empty() -> Self {
        Self([[0; SIZE]; SIZE])
    }

    /// Build a board from nine rows.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidValue`] for the first entry greater than 9.
    pub fn from_rows(rows: [[u8; SIZE]; SIZE]) -> Result<Self, InvalidValue> {
        for (row, values) in rows.iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                if value > 9 {
                    return Err(InvalidValue { row, col, value });
                }
            }
        }
        Ok(Self(rows))
    }

    /// The nine rows.
    #[must_use]
    pub const fn rows(&self) -> &[[u8; SIZE]; SIZE] {
        &self.0
    }

    /// Value at `(row, col)`.
    ///
    /// Returns `None` if either index is outside `0..9`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.0.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Set `(row, col)` to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidValue`] when `value > 9` or the position is off
    /// the board.
    pub fn set(&mut self, row: usize, col: usize, value: u8) -> Result<(), InvalidValue> {
        match self.0.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) if value <= 9 => {
                *cell = value;
                Ok(())
            }
            _ => Err(InvalidValue { row, col, value }),
        }
    }

    /// Unchecked write used by the solver; `value` is always `1..=9`.
    pub(crate) fn place(&mut self, row: usize, col: usize, value: u8) {
        self.0[row][col] = value;
    }

    pub(crate) fn clear(&mut self, row: usize, col: usize) {
        self.0[row][col] = 0;
    }

    /// Position of the first unknown cell in row-major order.
    #[must_use]
    pub fn first_empty(&self) -> Option<(usize, usize)> {
        self.cells()
            .find(|&(_, _, value)| value == 0)
            .map(|(row, col, _)| (row, col))
    }

    /// Number of unknown cells.
    #[must_use]
    pub fn empty_count(&self) -> usize {
        self.cells().filter(|&(_, _, value)| value == 0).count()
    }

    /// `true` when no cell is unknown.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.first_empty().is_none()
    }

    /// Whether `value` may be placed at `(row, col)`: it must not appear
    /// elsewhere in the row, the column, or the 3×3 box. The cell's own
    /// current content is ignored. Off-board positions are never allowed.
    #[must_use]
    pub fn allows(&self, row: usize, col: usize, value: u8) -> bool {
        if row >= SIZE || col >= SIZE {
            return false;
        }
        let grid = &self.0;
        for i in 0..SIZE {
            if i != col && grid[row][i] == value {
                return false;
            }
            if i != row && grid[i][col] == value {
                return false;
            }
        }
        let (box_row, box_col) = (row / 3 * 3, col / 3 * 3);
        for r in box_row..box_row + 3 {
            for c in box_col..box_col + 3 {
                if (r, c) != (row, col) && grid[r][c] == value {
                    return false;
                }
            }
        }
        true
    }

    /// `true` when no known value repeats within a row, column, or box.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.cells()
            .filter(|&(_, _, value)| value != 0)
            .all(|(row, col, value)| self.allows(row, col, value))
    }

    /// `true` when the board is complete and consistent, i.e. every row,
    /// column, and box is a permutation of 1..=9.
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.is_complete() && self.is_consistent()
    }

    /// Iterate `(row, col, value)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        self.0.iter().enumerate().flat_map(|(row, values)| {
            values
                .iter()
                .enumerate()
                .map(move |(col, &value)| (row, col, value))
        })
    }

    /// Cells that are unknown in `observed` and known here, as
    /// `(row, col, value)`. These are the digits an overlay draws.
    pub fn filled_since<'a>(
        &'a self,
        observed: &'a Self,
    ) -> impl Iterator<Item = (usize, usize, u8)> + 'a {
        self.cells()
            .filter(move |&(row, col, value)| value != 0 && observed.0[row][col] == 0)
    }

    /// The board as a single 81-character line, `.` for unknowns.
    #[must_use]
    pub fn to_line(&self) -> String {
        self.cells()
            .map(|(_, _, value)| {
                if value == 0 {
                    '.'
                } else {
                    char::from(b'0' + value)
                }
            })
            .collect()
    }
}

impl FromStr for SudokuBoard {
    type Err = ParseBoardError;

    /// Parse 81 cell symbols: `1`-`9` are givens, `0`, `.` and `_` are
    /// unknown. Whitespace and the box-drawing separators `|`, `-`, `+`
    /// are skipped so pretty-printed boards parse too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut board = Self::empty();
        let mut index = 0;
        for symbol in s.chars() {
            if symbol.is_whitespace() || matches!(symbol, '|' | '-' | '+') {
                continue;
            }
            let value = match symbol {
                '.' | '_' => 0,
                // `to_digit(10)` yields at most 9, so the cast is lossless.
                #[allow(clippy::cast_possible_truncation)]
                d if d.is_ascii_digit() => d.to_digit(10).unwrap_or(0) as u8,
                other => {
                    return Err(ParseBoardError::InvalidSymbol {
                        index,
                        symbol: other,
                    });
                }
            };
            if index < CELL_COUNT {
                board.0[index / SIZE][index % SIZE] = value;
            }
            index += 1;
        }
        if index == CELL_COUNT {
            Ok(board)
        } else {
            Err(ParseBoardError::WrongLength(index))
        }
    }
}

impl fmt::Display for SudokuBoard {
    /// Nine lines of nine digits, `.` for unknown cells.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self.to_line();
        for (i, chunk) in line.as_bytes().chunks(SIZE).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for &b in chunk {
                write!(f, "{}", char::from(b))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SOLVED: &str = "534678912672195348198342567859761423426853791713924856961537284287419635345286179";

    #[test]
    fn parse_accepts_dots_and_separators() {
        let pretty = "53..7.... | 6..195...\n.98....6.\n8...6...3 4..8.3..1 7...2...6\n.6....28. ...419..5 ....8..79";
        let board: SudokuBoard = pretty.parse().unwrap();
        assert_eq!(board.get(0, 0), Some(5));
        assert_eq!(board.get(0, 2), Some(0));
        assert_eq!(board.get(8, 8), Some(9));
        assert_eq!(board.empty_count(), 51);
    }

    #[test]
    fn parse_rejects_short_input() {
        let err = "123".parse::<SudokuBoard>().unwrap_err();
        assert_eq!(err, ParseBoardError::WrongLength(3));
    }

    #[test]
    fn parse_rejects_long_input() {
        let long = format!("{SOLVED}1");
        let err = long.parse::<SudokuBoard>().unwrap_err();
        assert_eq!(err, ParseBoardError::WrongLength(82));
    }

    #[test]
    fn parse_rejects_letters() {
        let err = "12x".parse::<SudokuBoard>().unwrap_err();
        assert_eq!(
            err,
            ParseBoardError::InvalidSymbol {
                index: 2,
                symbol: 'x'
            }
        );
    }

    #[test]
    fn display_round_trips() {
        let board: SudokuBoard = SOLVED.parse().unwrap();
        let shown = board.to_string();
        assert_eq!(shown.lines().count(), 9);
        assert_eq!(shown.parse::<SudokuBoard>().unwrap(), board);
    }

    #[test]
    fn from_rows_rejects_ten() {
        let mut rows = [[0; SIZE]; SIZE];
        rows[4][7] = 10;
        let err = SudokuBoard::from_rows(rows).unwrap_err();
        assert_eq!(
            err,
            InvalidValue {
                row: 4,
                col: 7,
                value: 10
            }
        );
    }

    #[test]
    fn set_rejects_off_board_positions() {
        let mut board = SudokuBoard::empty();
        assert!(board.set(9, 0, 1).is_err());
        assert!(board.set(0, 0, 10).is_err());
        assert!(board.set(8, 8, 9).is_ok());
        assert_eq!(board.get(8, 8), Some(9));
    }

    #[test]
    fn solved_board_is_solved() {
        let board: SudokuBoard = SOLVED.parse().unwrap();
        assert!(board.is_solved());
        assert_eq!(board.first_empty(), None);
    }

    #[test]
    fn duplicate_in_box_is_inconsistent() {
        let mut board = SudokuBoard::empty();
        board.set(0, 0, 4).unwrap();
        board.set(2, 2, 4).unwrap();
        assert!(!board.is_consistent());
        assert!(!board.allows(1, 1, 4));
    }

    #[test]
    fn allows_ignores_own_cell() {
        let mut board = SudokuBoard::empty();
        board.set(3, 3, 7).unwrap();
        assert!(board.allows(3, 3, 7));
        assert!(!board.allows(3, 8, 7));
        assert!(!board.allows(8, 3, 7));
    }

    #[test]
    fn allows_rejects_off_board_positions() {
        let board = SudokuBoard::empty();
        assert!(!board.allows(9, 0, 1));
        assert!(!board.allows(0, 9, 1));
    }

    #[test]
    fn json_round_trips_through_rows() {
        let board: SudokuBoard = SOLVED.parse().unwrap();
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(serde_json::from_str::<SudokuBoard>(&json).unwrap(), board);
    }

    #[test]
    fn json_with_value_above_nine_is_rejected() {
        let mut rows = [[0_u8; SIZE]; SIZE];
        rows[0][0] = 42;
        let json = serde_json::to_string(&rows).unwrap();
        let err = serde_json::from_str::<SudokuBoard>(&json).unwrap_err();
        assert!(err.to_string().contains("value 42"), "got {err}");

        rows[0][0] = 10;
        let json = serde_json::to_string(&rows).unwrap();
        assert!(serde_json::from_str::<SudokuBoard>(&json).is_err());
    }

    #[test]
    fn filled_since_reports_new_digits_only() {
        let solved: SudokuBoard = SOLVED.parse().unwrap();
        let mut observed = solved;
        observed.set(0, 2, 0).unwrap();
        observed.set(8, 0, 0).unwrap();
        let filled: Vec<_> = solved.filled_since(&observed).collect();
        assert_eq!(filled, vec![(0, 2, 4), (8, 0, 3)]);
    }
}
