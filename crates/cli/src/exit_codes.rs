//! CLI Exit Code Registry
//!
//! Single source of truth for `cellcast` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | General error (including updates that were not applied)  |
//! | 2    | Usage error (bad arguments, bad index, bad coordinate)   |
//! | 3    | Settings error (unreadable, invalid, or incomplete)      |
//! | 4    | Connection error (cannot reach or identify with target)  |
//! | 5    | Sheet read error (file missing, unreadable, no sheet)    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use cellcast_core::ReadError;
use cellcast_obs_client::{ClientError, ConnectError};

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure, or some updates failed.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, out-of-range group or mapping index.
pub const EXIT_USAGE: u8 = 2;

/// Settings file unreadable or invalid, or the source sheet is not set.
pub const EXIT_SETTINGS: u8 = 3;

/// Cannot connect or authenticate to the target.
pub const EXIT_CONNECT: u8 = 4;

/// Spreadsheet missing or unreadable.
pub const EXIT_SHEET: u8 = 5;

/// Map a connection failure to its exit code.
pub fn connect_exit_code(err: &ConnectError) -> u8 {
    match err {
        ConnectError::InProgress | ConnectError::Cancelled => EXIT_ERROR,
        ConnectError::Client(ClientError::InvalidArgument(_)) => EXIT_USAGE,
        ConnectError::Client(_) => EXIT_CONNECT,
    }
}

/// Map a sheet read failure to its exit code.
pub fn read_exit_code(err: &ReadError) -> u8 {
    match err {
        ReadError::MissingConfig => EXIT_SETTINGS,
        ReadError::FileUnavailable { .. } | ReadError::SheetReadFailed(_) => EXIT_SHEET,
    }
}
