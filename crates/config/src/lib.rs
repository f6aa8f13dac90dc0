// Settings loading and saving

mod loose;
pub mod mappings;
pub mod settings;

pub use settings::{
    GroupEntry, MappingEntry, ObsSettings, PollSettings, SettingsError, SettingsFile, SheetSettings,
};
