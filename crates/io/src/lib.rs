// Sheet reading: file loaders and the mtime-cached snapshot provider

pub mod csv;
pub mod loader;
pub mod provider;
pub mod workbook;

pub use loader::{TableLoader, WorkbookLoader};
pub use provider::SnapshotProvider;
