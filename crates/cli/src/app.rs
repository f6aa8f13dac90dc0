//! Settings context shared by every subcommand.

use std::path::PathBuf;

use cellcast_config::SettingsFile;
use cellcast_engine::{Bridge, GroupId, MappingId, Registry, Session};
use cellcast_io::SnapshotProvider;
use cellcast_obs_client::Endpoint;

use crate::CliError;

pub struct Context {
    pub path: PathBuf,
    pub settings: SettingsFile,
}

impl Context {
    /// Load the settings file; a missing file yields defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self, CliError> {
        let path = path.unwrap_or_else(SettingsFile::default_path);
        let settings = SettingsFile::load_or_default(&path).map_err(CliError::settings)?;
        Ok(Self { path, settings })
    }

    pub fn save(&self) -> Result<(), CliError> {
        self.settings.save(&self.path).map_err(CliError::settings)
    }

    pub fn endpoint(&self) -> Endpoint {
        let obs = &self.settings.obs_settings;
        Endpoint::new(obs.host.trim(), obs.port).with_password(self.settings.password())
    }

    pub fn registry(&self) -> Registry {
        self.settings.to_registry()
    }

    /// Apply an edit to the registry and store the result.
    pub fn edit_registry<T>(
        &mut self,
        edit: impl FnOnce(&mut Registry) -> Result<T, CliError>,
    ) -> Result<T, CliError> {
        let mut registry = self.registry();
        let result = edit(&mut registry)?;
        self.settings.store_registry(&registry);
        self.save()?;
        Ok(result)
    }

    pub fn source(&self) -> SnapshotProvider {
        let mut provider = SnapshotProvider::new();
        provider.set_source(self.settings.source_path(), self.settings.sheet_name());
        provider
    }

    pub fn session(&self) -> Session<SnapshotProvider> {
        let bridge = Bridge::new(self.registry(), self.settings.collapse_policy());
        Session::new(bridge, self.source())
    }
}

/// Resolve a 1-based group index.
pub fn group_at(registry: &Registry, index: usize) -> Result<GroupId, CliError> {
    index
        .checked_sub(1)
        .and_then(|i| registry.group_at(i))
        .ok_or_else(|| {
            CliError::args(format!("no group {} (have {})", index, registry.groups().len()))
                .with_hint("list groups with `cellcast show`")
        })
}

/// Resolve 1-based group and mapping indices.
pub fn mapping_at(registry: &Registry, group: usize, index: usize) -> Result<MappingId, CliError> {
    let group_id = group_at(registry, group)?;
    let count = registry.group(group_id).map_or(0, |g| g.mappings.len());
    index
        .checked_sub(1)
        .and_then(|i| registry.mapping_at(group - 1, i))
        .ok_or_else(|| {
            CliError::args(format!("group {} has no mapping {} (have {})", group, index, count))
                .with_hint("list mappings with `cellcast show`")
        })
}
