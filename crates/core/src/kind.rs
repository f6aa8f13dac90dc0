//! Kinds of target inputs a mapping can drive.

/// How a cell value is applied to its target input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueKind {
    /// Text source: the value is the text.
    #[default]
    Text,
    /// Image source: the value is a file path.
    Image,
    /// Browser source: the value is a URL.
    BrowserUrl,
    /// Media source: the value is a local file path.
    MediaFile,
}

impl ValueKind {
    pub const ALL: [ValueKind; 4] = [
        ValueKind::Text,
        ValueKind::Image,
        ValueKind::BrowserUrl,
        ValueKind::MediaFile,
    ];

    /// Label used in settings files and output.
    pub fn label(&self) -> &'static str {
        match self {
            ValueKind::Text => "Text",
            ValueKind::Image => "Image",
            ValueKind::BrowserUrl => "Browser URL",
            ValueKind::MediaFile => "Media File",
        }
    }

    /// Whether the value names a file on disk.
    pub fn is_path(&self) -> bool {
        matches!(self, ValueKind::Image | ValueKind::MediaFile)
    }

    /// Lenient label lookup: case, spaces, dashes and underscores are ignored,
    /// and the short forms `Browser`, `Url` and `Media` are accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        let folded: String = label
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "text" => Some(ValueKind::Text),
            "image" => Some(ValueKind::Image),
            "browserurl" | "browser" | "url" => Some(ValueKind::BrowserUrl),
            "mediafile" | "media" => Some(ValueKind::MediaFile),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueKind::from_label(s).ok_or_else(|| {
            format!("unknown kind '{}' (expected text, image, browser-url or media-file)", s)
        })
    }
}
