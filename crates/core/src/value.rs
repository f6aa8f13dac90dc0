//! Normalized cell values.

/// Characters shown in a value preview before truncation.
pub const PREVIEW_CHARS: usize = 50;

/// A cell value as read from a sheet.
///
/// Values are normalized on the way in so that equality means "would
/// render the same": integral floats become `Int` and missing cells become
/// an empty `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl CellValue {
    /// The value of a blank or missing cell.
    pub fn empty() -> Self {
        CellValue::Text(String::new())
    }

    /// Build from a float, collapsing integral values to `Int`.
    pub fn from_float(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
            CellValue::Int(n as i64)
        } else {
            CellValue::Float(n)
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.is_empty())
    }

    /// Display text cut to `max_chars` characters, with `...` appended when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        let full = self.to_string();
        if full.chars().count() <= max_chars {
            return full;
        }
        let mut cut: String = full.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}

impl Default for CellValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Int(n) => write!(f, "{}", n),
            CellValue::Float(n) => write!(f, "{}", n),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Int(n)
    }
}
