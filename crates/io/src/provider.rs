//! Cached sheet snapshots keyed on file modification time.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use cellcast_core::{CellCoord, CellValue, ReadError, Snapshot, TableSource};
use log::{debug, info};

use crate::loader::{TableLoader, WorkbookLoader};

/// Holds the most recent snapshot of the configured sheet and re-reads it
/// only when forced or when the file's modification time moves.
///
/// Any failure drops the held snapshot, so a stale table is never served
/// after a refresh went wrong.
#[derive(Debug, Default)]
pub struct SnapshotProvider<L = WorkbookLoader> {
    loader: L,
    path: Option<PathBuf>,
    sheet: Option<String>,
    current: Option<Arc<Snapshot>>,
    reads: usize,
}

impl SnapshotProvider {
    pub fn new() -> Self {
        Self::with_loader(WorkbookLoader)
    }
}

impl<L: TableLoader> SnapshotProvider<L> {
    pub fn with_loader(loader: L) -> Self {
        Self {
            loader,
            path: None,
            sheet: None,
            current: None,
            reads: 0,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    /// Point at a file and sheet. Blank values count as unset.
    pub fn set_source(&mut self, path: Option<PathBuf>, sheet: Option<String>) {
        let path = path.filter(|p| !p.as_os_str().is_empty());
        let sheet = sheet.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if path != self.path || sheet != self.sheet {
            self.path = path;
            self.sheet = sheet;
            self.current = None;
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn sheet(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    pub fn ensure_fresh(&mut self, force: bool) -> Result<Arc<Snapshot>, ReadError> {
        let result = self.refresh(force);
        if result.is_err() {
            self.current = None;
        }
        result
    }

    fn refresh(&mut self, force: bool) -> Result<Arc<Snapshot>, ReadError> {
        let path = self.path.clone().ok_or(ReadError::MissingConfig)?;
        let sheet = self.sheet.clone().unwrap_or_default();
        if sheet.is_empty() && self.loader.requires_sheet(&path) {
            return Err(ReadError::MissingConfig);
        }

        let modified = self
            .loader
            .modified(&path)
            .map_err(|e| file_unavailable(&path, e))?;

        let reason = match &self.current {
            _ if force => "forced",
            None => "no cached data",
            Some(current) if current.modified() != Some(modified) => "file modified",
            Some(current) => return Ok(Arc::clone(current)),
        };
        debug!("Reading '{}' ({})", path.display(), reason);

        let started = Instant::now();
        let rows = self.loader.load(&path, &sheet).map_err(ReadError::SheetReadFailed)?;
        let snapshot = Arc::new(Snapshot::new(rows, Some(modified)));
        self.reads += 1;

        let (rows, cols) = snapshot.shape();
        info!("Sheet cache updated in {:.2?} ({}x{})", started.elapsed(), rows, cols);
        self.current = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Value at `coord` in the held snapshot.
    pub fn get_cell(&self, coord: CellCoord) -> Option<CellValue> {
        self.current.as_ref()?.get(coord)
    }

    pub fn current(&self) -> Option<&Arc<Snapshot>> {
        self.current.as_ref()
    }

    /// Full reads performed so far.
    pub fn read_count(&self) -> usize {
        self.reads
    }
}

fn file_unavailable(path: &Path, e: io::Error) -> ReadError {
    let detail = match e.kind() {
        io::ErrorKind::NotFound => "file not found".to_string(),
        _ => e.to_string(),
    };
    ReadError::FileUnavailable {
        path: path.to_path_buf(),
        detail,
    }
}

impl<L: TableLoader> TableSource for SnapshotProvider<L> {
    fn ensure_fresh(&mut self, force: bool) -> Result<Arc<Snapshot>, ReadError> {
        SnapshotProvider::ensure_fresh(self, force)
    }

    fn invalidate(&mut self) {
        self.current = None;
    }
}
