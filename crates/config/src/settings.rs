//! The settings file.
//!
//! One JSON document holds the connection, the source sheet, poll options
//! and every mapping group. Older files with a flat `"mappings"` list are
//! read into a single `Default Group`. Lines starting with `//` are ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use cellcast_engine::DEFAULT_GROUP_NAME;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loose;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 4444;
pub const DEFAULT_INTERVAL_MS: u64 = 500;
/// Floor for the poll interval; anything lower would spin on the sheet.
pub const MIN_INTERVAL_MS: u64 = 50;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObsSettings {
    pub host: String,
    #[serde(deserialize_with = "loose::port", serialize_with = "loose::port_as_string")]
    pub port: u16,
    pub password: String,
}

impl Default for ObsSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetSettings {
    pub file_path: String,
    pub sheet_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub skip_collapsed_groups: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            skip_collapsed_groups: true,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms.max(MIN_INTERVAL_MS))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "loose::text")]
    pub row: String,
    #[serde(default, deserialize_with = "loose::text")]
    pub col: String,
    #[serde(
        default = "loose::default_true",
        deserialize_with = "loose::flag",
        serialize_with = "loose::flag_as_int"
    )]
    pub auto_update: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub mappings: Vec<MappingEntry>,
}

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSettings")]
pub struct SettingsFile {
    pub obs_settings: ObsSettings,
    pub excel_settings: SheetSettings,
    pub poll_settings: PollSettings,
    pub mapping_groups: Vec<GroupEntry>,
}

/// On-disk shape, including the legacy flat list.
#[derive(Deserialize)]
#[serde(default)]
struct RawSettings {
    obs_settings: ObsSettings,
    excel_settings: SheetSettings,
    poll_settings: PollSettings,
    mapping_groups: Option<Vec<GroupEntry>>,
    mappings: Option<Vec<MappingEntry>>,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            obs_settings: ObsSettings::default(),
            excel_settings: SheetSettings::default(),
            poll_settings: PollSettings::default(),
            mapping_groups: None,
            mappings: None,
        }
    }
}

impl From<RawSettings> for SettingsFile {
    fn from(raw: RawSettings) -> Self {
        let mapping_groups = match (raw.mapping_groups, raw.mappings) {
            (Some(groups), _) => groups,
            (None, Some(mappings)) => {
                warn!("Legacy settings format; creating a single '{}'", DEFAULT_GROUP_NAME);
                vec![GroupEntry {
                    group_name: DEFAULT_GROUP_NAME.to_string(),
                    collapsed: false,
                    mappings,
                }]
            }
            (None, None) => Vec::new(),
        };
        Self {
            obs_settings: raw.obs_settings,
            excel_settings: raw.excel_settings,
            poll_settings: raw.poll_settings,
            mapping_groups,
        }
    }
}

impl SettingsFile {
    /// Default settings file path: `<config_dir>/cellcast/settings.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cellcast")
            .join("settings.json")
    }

    /// Parse settings text, skipping `//` comment lines.
    pub fn from_json(contents: &str) -> Result<Self, SettingsError> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(serde_json::from_str(&cleaned)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&contents)?;
        info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Like [`load`](Self::load), but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        match Self::load(path) {
            Err(SettingsError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("No settings at {}; using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Pretty JSON with 4-space indentation and a trailing newline.
    pub fn to_json(&self) -> Result<String, SettingsError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        out.push(b'\n');
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Write to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, self.to_json()?).map_err(io_error)?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Configured workbook path, if any.
    pub fn source_path(&self) -> Option<PathBuf> {
        let path = self.excel_settings.file_path.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }

    pub fn sheet_name(&self) -> Option<String> {
        let sheet = self.excel_settings.sheet_name.trim();
        (!sheet.is_empty()).then(|| sheet.to_string())
    }

    pub fn password(&self) -> Option<String> {
        (!self.obs_settings.password.is_empty()).then(|| self.obs_settings.password.clone())
    }
}
