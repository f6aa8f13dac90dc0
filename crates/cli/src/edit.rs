//! Settings-editing subcommands.

use std::fs;
use std::path::{Path, PathBuf};

use cellcast_config::SettingsFile;
use cellcast_core::{CellCoord, ValueKind};
use cellcast_engine::{MappingFields, MappingId, Registry, RegistryError};
use log::warn;

use crate::app::{group_at, mapping_at, Context};
use crate::CliError;

/// Optional field values from the command line.
#[derive(Debug, Default)]
pub struct FieldChanges {
    pub target: Option<String>,
    pub row: Option<String>,
    pub col: Option<String>,
    pub kind: Option<ValueKind>,
    pub auto_update: Option<bool>,
}

impl FieldChanges {
    fn is_empty(&self) -> bool {
        self.target.is_none()
            && self.row.is_none()
            && self.col.is_none()
            && self.kind.is_none()
            && self.auto_update.is_none()
    }

    fn apply(self, mut fields: MappingFields) -> MappingFields {
        if let Some(target) = self.target {
            fields.target = target;
        }
        if let Some(row) = self.row {
            fields.row = row;
        }
        if let Some(col) = self.col {
            fields.col = col;
        }
        if let Some(kind) = self.kind {
            fields.kind = kind;
        }
        if let Some(auto_update) = self.auto_update {
            fields.auto_update = auto_update;
        }
        fields
    }
}

fn registry_error(e: RegistryError) -> CliError {
    CliError::args(e.to_string())
}

fn check_coord(fields: &MappingFields) -> Result<CellCoord, CliError> {
    fields
        .coord()
        .map_err(|e| CliError::args(e.to_string()).with_hint("rows and columns start at 1"))
}

pub fn cmd_init(ctx: &mut Context, force: bool) -> Result<(), CliError> {
    if ctx.path.exists() && !force {
        return Err(CliError::args(format!("{} already exists", ctx.path.display()))
            .with_hint("use --force to overwrite it"));
    }
    ctx.settings = SettingsFile::default();
    let registry = ctx.settings.to_registry();
    ctx.settings.store_registry(&registry);
    ctx.save()?;
    println!("Wrote {}", ctx.path.display());
    Ok(())
}

pub fn cmd_source(ctx: &mut Context, file: Option<PathBuf>, sheet: Option<String>) -> Result<(), CliError> {
    if file.is_none() && sheet.is_none() {
        return Err(CliError::args("nothing to change").with_hint("pass --file and/or --sheet"));
    }
    if let Some(file) = file {
        if !file.as_os_str().is_empty() && !file.exists() {
            warn!("{} does not exist yet", file.display());
        }
        ctx.settings.excel_settings.file_path = file.to_string_lossy().into_owned();
    }
    if let Some(sheet) = sheet {
        ctx.settings.excel_settings.sheet_name = sheet.trim().to_string();
    }
    ctx.save()?;

    let excel = &ctx.settings.excel_settings;
    println!("Source: {} [{}]", excel.file_path, excel.sheet_name);
    Ok(())
}

pub fn cmd_connection(
    ctx: &mut Context,
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
) -> Result<(), CliError> {
    if host.is_none() && port.is_none() && password.is_none() {
        return Err(CliError::args("nothing to change").with_hint("pass --host, --port and/or --password"));
    }
    if let Some(host) = host {
        let host = host.trim();
        if host.is_empty() {
            return Err(CliError::args("host cannot be empty"));
        }
        ctx.settings.obs_settings.host = host.to_string();
    }
    if let Some(port) = port {
        if port == 0 {
            return Err(CliError::args("port must be between 1 and 65535"));
        }
        ctx.settings.obs_settings.port = port;
    }
    if let Some(password) = password {
        ctx.settings.obs_settings.password = password;
    }
    ctx.save()?;
    println!("Target: {}", ctx.endpoint());
    Ok(())
}

pub fn cmd_group_add(ctx: &mut Context, name: &str) -> Result<(), CliError> {
    let (index, name) = ctx.edit_registry(|registry| {
        let id = registry.add_group(name);
        let name = registry.group(id).map(|g| g.name.clone()).unwrap_or_default();
        Ok((registry.groups().len(), name))
    })?;
    println!("Added group {}: {}", index, name);
    Ok(())
}

pub fn cmd_group_rename(ctx: &mut Context, index: usize, name: &str) -> Result<(), CliError> {
    let name = ctx.edit_registry(|registry| {
        let id = group_at(registry, index)?;
        registry.rename_group(id, name).map_err(registry_error)?;
        Ok(registry.group(id).map(|g| g.name.clone()).unwrap_or_default())
    })?;
    println!("Renamed group {} to {}", index, name);
    Ok(())
}

pub fn cmd_group_remove(ctx: &mut Context, index: usize) -> Result<(), CliError> {
    let removed = ctx.edit_registry(|registry| {
        let id = group_at(registry, index)?;
        registry.delete_group(id).map_err(registry_error)
    })?;
    println!(
        "Removed group '{}' and {} mapping(s)",
        removed.name,
        removed.mappings.len()
    );
    Ok(())
}

pub fn cmd_group_collapse(ctx: &mut Context, index: usize, collapsed: bool) -> Result<(), CliError> {
    ctx.edit_registry(|registry| {
        let id = group_at(registry, index)?;
        registry.set_group_collapsed(id, collapsed).map_err(registry_error)
    })?;
    println!("Group {} {}", index, if collapsed { "collapsed" } else { "expanded" });
    Ok(())
}

pub fn cmd_mapping_add(ctx: &mut Context, group: usize, changes: FieldChanges) -> Result<(), CliError> {
    if changes.row.is_none() || changes.col.is_none() {
        return Err(CliError::args("--row and --col are required"));
    }
    let fields = changes.apply(MappingFields::default());
    let coord = check_coord(&fields)?;

    let position = ctx.edit_registry(|registry| {
        let id = group_at(registry, group)?;
        warn_shared_coord(registry, coord, None);
        registry.add_mapping(id, fields.clone()).map_err(registry_error)?;
        Ok(registry.group(id).map_or(0, |g| g.mappings.len()))
    })?;
    println!("Added mapping {}.{}: {}", group, position, describe(&fields));
    Ok(())
}

pub fn cmd_mapping_edit(ctx: &mut Context, group: usize, index: usize, changes: FieldChanges) -> Result<(), CliError> {
    if changes.is_empty() {
        return Err(CliError::args("nothing to change")
            .with_hint("pass any of --target, --row, --col, --kind, --auto"));
    }
    let fields = ctx.edit_registry(|registry| {
        let id = mapping_at(registry, group, index)?;
        let current = registry
            .mapping(id)
            .map(|m| m.fields.clone())
            .ok_or_else(|| registry_error(RegistryError::UnknownMapping(id)))?;
        let fields = changes.apply(current);
        let coord = check_coord(&fields)?;
        warn_shared_coord(registry, coord, Some(id));
        registry.edit_mapping(id, fields.clone()).map_err(registry_error)?;
        Ok(fields)
    })?;
    println!("Updated mapping {}.{}: {}", group, index, describe(&fields));
    Ok(())
}

pub fn cmd_mapping_remove(ctx: &mut Context, group: usize, index: usize) -> Result<(), CliError> {
    let removed = ctx.edit_registry(|registry| {
        let id = mapping_at(registry, group, index)?;
        registry.delete_mapping(id).map_err(registry_error)
    })?;
    println!("Removed mapping {}.{}: {}", group, index, describe(&removed.fields));
    Ok(())
}

pub fn cmd_import(ctx: &mut Context, file: &Path) -> Result<(), CliError> {
    let imported = SettingsFile::load(file).map_err(CliError::settings)?;
    let registry = imported.to_registry();
    ctx.settings = imported;
    ctx.settings.store_registry(&registry);
    ctx.save()?;
    println!(
        "Imported {} group(s), {} mapping(s) from {}",
        registry.groups().len(),
        registry.mapping_count(),
        file.display()
    );
    Ok(())
}

pub fn cmd_export(ctx: &Context, file: &Path) -> Result<(), CliError> {
    let json = ctx.settings.to_json().map_err(CliError::settings)?;
    fs::write(file, json).map_err(|e| CliError::io(format!("cannot write {}: {}", file.display(), e)))?;
    println!("Exported settings to {}", file.display());
    Ok(())
}

/// Several mappings may read one cell; they then share a single last-applied entry.
fn warn_shared_coord(registry: &Registry, coord: CellCoord, except: Option<MappingId>) {
    if registry.coord_in_use(coord, except) {
        warn!("Another mapping already reads cell {}", coord);
    }
}

pub fn describe(fields: &MappingFields) -> String {
    let target = match fields.target_name() {
        "" => "(no target)",
        name => name,
    };
    format!(
        "row {} col {} -> {} [{}{}]",
        fields.row.trim(),
        fields.col.trim(),
        target,
        fields.kind,
        if fields.auto_update { "" } else { ", manual" }
    )
}
