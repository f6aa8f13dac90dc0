//! Core types shared by every cellcast crate.
//!
//! Nothing in here performs I/O. The reader (`cellcast-io`) produces
//! [`Snapshot`]s, the engine diffs them, and a [`TargetSink`] applies values.

pub mod coord;
pub mod kind;
pub mod table;
pub mod target;
pub mod value;

pub use coord::{CellCoord, CoordError};
pub use kind::ValueKind;
pub use table::{ReadError, Snapshot, TableSource};
pub use target::{ConnectionState, SendError, TargetSink};
pub use value::CellValue;
