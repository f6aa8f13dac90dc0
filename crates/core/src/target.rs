//! The seam between change detection and whatever applies values.

use thiserror::Error;

use crate::kind::ValueKind;
use crate::value::CellValue;

/// Connection lifecycle of a target endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
        })
    }
}

/// Why a single update was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("not connected")]
    Disconnected,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("source '{0}' not found")]
    TargetNotFound(String),
    #[error("request rejected [{code}]: {comment}")]
    SendRejected { code: u16, comment: String },
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("{0}")]
    Other(String),
}

/// Applies one value to one named target.
pub trait TargetSink: Send + Sync {
    fn send(&self, kind: ValueKind, value: &CellValue, target: &str) -> Result<(), SendError>;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}
