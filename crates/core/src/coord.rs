//! Cell coordinates.
//!
//! Users address cells with 1-based row/column numbers typed as text.
//! Internally a [`CellCoord`] is 0-based and is the identity key for the
//! last-applied value memory.

use thiserror::Error;

/// A 0-based (row, column) position in a sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

/// Row or column text that is not a positive integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    #[error("row '{0}' is not a positive integer")]
    Row(String),
    #[error("column '{0}' is not a positive integer")]
    Col(String),
}

impl CellCoord {
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parse user-entered 1-based row and column text.
    ///
    /// Surrounding whitespace is ignored. Signs, decimals and zero are rejected.
    pub fn parse(row: &str, col: &str) -> Result<Self, CoordError> {
        let row = parse_one_based(row).ok_or_else(|| CoordError::Row(row.trim().to_string()))?;
        let col = parse_one_based(col).ok_or_else(|| CoordError::Col(col.trim().to_string()))?;
        Ok(Self::new(row - 1, col - 1))
    }

    /// 1-based row number as shown to users.
    pub fn display_row(&self) -> usize {
        self.row + 1
    }

    /// 1-based column number as shown to users.
    pub fn display_col(&self) -> usize {
        self.col + 1
    }
}

fn parse_one_based(text: &str) -> Option<usize> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<usize>().ok().filter(|n| *n > 0)
}

impl std::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

/// Convert 0-based column index to Excel-style letter(s).
fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}
