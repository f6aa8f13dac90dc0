//! `SetInputSettings` payloads per value kind.

use std::path::Path;

use cellcast_core::{CellValue, ValueKind};
use serde_json::{json, Value};

use crate::{ProtocolError, RequestMessage};

pub const SET_INPUT_SETTINGS: &str = "SetInputSettings";

/// Settings object for `kind`: `{text}`, `{file}`, `{url}` or `{local_file}`.
/// Path kinds are made absolute; an empty path is an error.
pub fn input_settings(kind: ValueKind, value: &CellValue) -> Result<Value, ProtocolError> {
    let text = value.to_string();
    let text = text.trim();
    let settings = match kind {
        ValueKind::Text => json!({ "text": text }),
        ValueKind::Image => json!({ "file": absolute(kind, text)? }),
        ValueKind::BrowserUrl => json!({ "url": text }),
        ValueKind::MediaFile => json!({ "local_file": absolute(kind, text)? }),
    };
    Ok(settings)
}

fn absolute(kind: ValueKind, text: &str) -> Result<String, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyPath(kind));
    }
    std::path::absolute(Path::new(text))
        .map(|p| p.to_string_lossy().into_owned())
        .map_err(|e| ProtocolError::BadPath {
            path: text.to_string(),
            detail: e.to_string(),
        })
}

/// Overlay `value` onto the input named `input_name`.
pub fn set_input_settings(
    request_id: impl Into<String>,
    input_name: &str,
    kind: ValueKind,
    value: &CellValue,
) -> Result<RequestMessage, ProtocolError> {
    let settings = input_settings(kind, value)?;
    Ok(RequestMessage {
        request_type: SET_INPUT_SETTINGS.to_string(),
        request_id: request_id.into(),
        request_data: Some(json!({
            "inputName": input_name,
            "inputSettings": settings,
            "overlay": true,
        })),
    })
}
