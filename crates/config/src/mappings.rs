//! Conversion between stored mapping groups and the live registry.

use cellcast_core::ValueKind;
use cellcast_engine::{CollapsePolicy, MappingFields, Registry, DEFAULT_GROUP_NAME};
use log::warn;

use crate::settings::{GroupEntry, MappingEntry, SettingsFile};

impl MappingEntry {
    /// Unknown or missing types fall back to text.
    pub fn value_kind(&self) -> ValueKind {
        if self.kind.trim().is_empty() {
            return ValueKind::Text;
        }
        ValueKind::from_label(&self.kind).unwrap_or_else(|| {
            warn!("Unknown type '{}' for '{}'; treating as Text", self.kind, self.name);
            ValueKind::Text
        })
    }

    pub fn to_fields(&self) -> MappingFields {
        MappingFields::new(self.row.as_str(), self.col.as_str(), self.name.as_str(), self.value_kind())
            .with_auto_update(self.auto_update)
    }

    pub fn from_fields(fields: &MappingFields) -> Self {
        Self {
            kind: fields.kind.label().to_string(),
            name: fields.target.clone(),
            row: fields.row.clone(),
            col: fields.col.clone(),
            auto_update: fields.auto_update,
        }
    }
}

impl SettingsFile {
    /// Build a registry from the stored groups. No groups yields one empty
    /// default group.
    pub fn to_registry(&self) -> Registry {
        let mut registry = Registry::new();
        for entry in &self.mapping_groups {
            let group = registry.add_group(&entry.group_name);
            if entry.collapsed {
                if let Err(e) = registry.set_group_collapsed(group, true) {
                    warn!("Could not collapse group '{}': {}", entry.group_name, e);
                }
            }
            for mapping in &entry.mappings {
                if let Err(e) = registry.add_mapping(group, mapping.to_fields()) {
                    warn!("Skipping mapping '{}': {}", mapping.name, e);
                }
            }
        }
        if registry.groups().is_empty() {
            registry.add_group(DEFAULT_GROUP_NAME);
        }
        registry
    }

    /// Replace the stored groups with the registry's contents.
    pub fn store_registry(&mut self, registry: &Registry) {
        self.mapping_groups = registry
            .groups()
            .iter()
            .map(|group| GroupEntry {
                group_name: group.name.clone(),
                collapsed: group.collapsed,
                mappings: group.mappings.iter().map(|m| MappingEntry::from_fields(&m.fields)).collect(),
            })
            .collect();
    }

    pub fn collapse_policy(&self) -> CollapsePolicy {
        CollapsePolicy::from_skip_flag(self.poll_settings.skip_collapsed_groups)
    }
}
