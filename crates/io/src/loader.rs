use std::io;
use std::path::Path;
use std::time::SystemTime;

use cellcast_core::CellValue;

pub type Rows = Vec<Vec<CellValue>>;

/// File access behind the snapshot cache.
pub trait TableLoader: Send {
    /// Modification time used as the cache key.
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Read every row of `sheet`. Errors are human-readable details.
    fn load(&self, path: &Path, sheet: &str) -> Result<Rows, String>;

    /// Whether a sheet name is needed to read `path`.
    fn requires_sheet(&self, path: &Path) -> bool;
}

/// Reads spreadsheets from disk: delimited text through the csv reader,
/// everything else through calamine.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookLoader;

/// True for `.csv`, `.tsv` and `.txt` files.
pub fn is_delimited(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "csv" | "tsv" | "txt"))
        .unwrap_or(false)
}

impl TableLoader for WorkbookLoader {
    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn load(&self, path: &Path, sheet: &str) -> Result<Rows, String> {
        if is_delimited(path) {
            crate::csv::read_rows(path)
        } else {
            crate::workbook::read_sheet(path, sheet)
        }
    }

    fn requires_sheet(&self, path: &Path) -> bool {
        !is_delimited(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimited_extensions() {
        assert!(is_delimited(Path::new("scores.csv")));
        assert!(is_delimited(Path::new("scores.TSV")));
        assert!(is_delimited(Path::new("/tmp/x/scores.txt")));
        assert!(!is_delimited(Path::new("scores.xlsx")));
        assert!(!is_delimited(Path::new("scores")));
    }

    #[test]
    fn test_sheet_needed_for_workbooks_only() {
        let loader = WorkbookLoader;
        assert!(loader.requires_sheet(Path::new("scores.xlsx")));
        assert!(loader.requires_sheet(Path::new("scores.ods")));
        assert!(!loader.requires_sheet(Path::new("scores.csv")));
    }
}
