// Tolerant field readers for hand-edited and older settings files

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

use crate::settings::DEFAULT_PORT;

/// Number or digit string. Blank means the default port.
pub fn port<'de, D: Deserializer<'de>>(d: D) -> Result<u16, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(DEFAULT_PORT),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| D::Error::custom(format!("invalid port {}", n))),
        Value::String(s) if s.trim().is_empty() => Ok(DEFAULT_PORT),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid port '{}'", s))),
        other => Err(D::Error::custom(format!("invalid port {}", other))),
    }
}

/// Ports are written as strings.
pub fn port_as_string<S: Serializer>(port: &u16, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&port.to_string())
}

/// Row or column as typed: numbers and strings both accepted, kept as text.
pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(match (n.as_u64(), n.as_f64()) {
            (Some(u), _) => u.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
            _ => n.to_string(),
        }),
        other => Err(D::Error::custom(format!("expected a number or string, got {}", other))),
    }
}

/// `0`/`1`, booleans, or their string forms. Missing means on.
pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(true),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(D::Error::custom(format!("invalid flag '{}'", s))),
        },
        other => Err(D::Error::custom(format!("invalid flag {}", other))),
    }
}

/// Flags are written as `0`/`1`.
pub fn flag_as_int<S: Serializer>(flag: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(u8::from(*flag))
}

pub fn default_true() -> bool {
    true
}
