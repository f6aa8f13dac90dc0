//! Sheet snapshots and the trait for things that produce them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;

use crate::coord::CellCoord;
use crate::value::CellValue;

/// An immutable read of one sheet.
///
/// Rows may be ragged on construction; the snapshot's width is the widest
/// row, and positions past the end of a shorter row read as empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    rows: Vec<Vec<CellValue>>,
    width: usize,
    modified: Option<SystemTime>,
}

impl Snapshot {
    pub fn new(rows: Vec<Vec<CellValue>>, modified: Option<SystemTime>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width, modified }
    }

    /// Build from string literals (tests and fixtures).
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<CellValue>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        Self::new(rows, None)
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.width)
    }

    /// Modification time of the file this snapshot was read from.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.row < self.rows.len() && coord.col < self.width
    }

    /// Bounds-checked accessor.
    pub fn get(&self, coord: CellCoord) -> Option<CellValue> {
        if !self.contains(coord) {
            return None;
        }
        Some(self.rows[coord.row].get(coord.col).cloned().unwrap_or_default())
    }
}

/// Why a snapshot could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// File path or sheet name is not configured.
    #[error("spreadsheet file or sheet name not set")]
    MissingConfig,
    /// The file does not exist or its metadata cannot be read.
    #[error("spreadsheet file unavailable: {} ({detail})", path.display())]
    FileUnavailable { path: PathBuf, detail: String },
    /// The workbook could not be parsed, or the sheet does not exist.
    #[error("failed to read sheet: {0}")]
    SheetReadFailed(String),
}

/// A cached source of sheet snapshots.
pub trait TableSource: Send {
    /// Return the current snapshot, re-reading when stale or when `force` is set.
    fn ensure_fresh(&mut self, force: bool) -> Result<Arc<Snapshot>, ReadError>;

    /// Drop the held snapshot so the next `ensure_fresh` re-reads.
    fn invalidate(&mut self);
}
