//! Ordered groups of cell-to-target mappings.
//!
//! Plain data: no I/O, no presentation state beyond the collapse flag.
//! Ids are stable for the life of the registry and never reused.

use cellcast_core::{CellCoord, CoordError, ValueKind};
use thiserror::Error;

/// Name given to the group created for legacy (ungrouped) imports.
pub const DEFAULT_GROUP_NAME: &str = "Default Group";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingId(u64);

impl GroupId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl MappingId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// User-editable fields of a mapping.
///
/// Row and column are kept as entered; they are validated every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingFields {
    pub row: String,
    pub col: String,
    /// Target input name. Empty means the mapping only previews.
    pub target: String,
    pub kind: ValueKind,
    pub auto_update: bool,
}

impl MappingFields {
    pub fn new(row: impl Into<String>, col: impl Into<String>, target: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            row: row.into(),
            col: col.into(),
            target: target.into(),
            kind,
            auto_update: true,
        }
    }

    pub fn with_auto_update(mut self, auto_update: bool) -> Self {
        self.auto_update = auto_update;
        self
    }

    pub fn coord(&self) -> Result<CellCoord, CoordError> {
        CellCoord::parse(&self.row, &self.col)
    }

    /// Target name with surrounding whitespace removed.
    pub fn target_name(&self) -> &str {
        self.target.trim()
    }
}

impl Default for MappingFields {
    fn default() -> Self {
        Self::new("", "", "", ValueKind::Text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub id: MappingId,
    pub fields: MappingFields,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub collapsed: bool,
    pub mappings: Vec<Mapping>,
}

/// One mapping as seen by the dispatcher, with its group context.
#[derive(Debug, Clone, Copy)]
pub struct ActiveMapping<'a> {
    pub group: &'a Group,
    pub mapping: &'a Mapping,
}

impl<'a> ActiveMapping<'a> {
    pub fn id(&self) -> MappingId {
        self.mapping.id
    }

    pub fn fields(&self) -> &'a MappingFields {
        &self.mapping.fields
    }

    pub fn collapsed(&self) -> bool {
        self.group.collapsed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no group with id {}", .0.raw())]
    UnknownGroup(GroupId),
    #[error("no mapping with id {}", .0.raw())]
    UnknownMapping(MappingId),
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    groups: Vec<Group>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Add a group at the end. A blank name becomes `Group N`.
    pub fn add_group(&mut self, name: &str) -> GroupId {
        let id = GroupId(self.allocate());
        let name = normalize_group_name(name, self.groups.len());
        self.groups.push(Group {
            id,
            name,
            collapsed: false,
            mappings: Vec::new(),
        });
        id
    }

    /// Remove a group and return it (with its mappings).
    pub fn delete_group(&mut self, id: GroupId) -> Result<Group, RegistryError> {
        let index = self.group_index(id)?;
        Ok(self.groups.remove(index))
    }

    pub fn rename_group(&mut self, id: GroupId, name: &str) -> Result<(), RegistryError> {
        let index = self.group_index(id)?;
        self.groups[index].name = normalize_group_name(name, index);
        Ok(())
    }

    pub fn set_group_collapsed(&mut self, id: GroupId, collapsed: bool) -> Result<(), RegistryError> {
        let index = self.group_index(id)?;
        self.groups[index].collapsed = collapsed;
        Ok(())
    }

    pub fn add_mapping(&mut self, group: GroupId, fields: MappingFields) -> Result<MappingId, RegistryError> {
        let index = self.group_index(group)?;
        let id = MappingId(self.allocate());
        self.groups[index].mappings.push(Mapping { id, fields });
        Ok(id)
    }

    /// Remove a mapping and return it.
    pub fn delete_mapping(&mut self, id: MappingId) -> Result<Mapping, RegistryError> {
        let (g, m) = self.mapping_position(id)?;
        Ok(self.groups[g].mappings.remove(m))
    }

    /// Replace a mapping's fields, returning the previous ones.
    pub fn edit_mapping(&mut self, id: MappingId, fields: MappingFields) -> Result<MappingFields, RegistryError> {
        let (g, m) = self.mapping_position(id)?;
        Ok(std::mem::replace(&mut self.groups[g].mappings[m].fields, fields))
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn mapping(&self, id: MappingId) -> Option<&Mapping> {
        self.iter_active().find(|a| a.id() == id).map(|a| a.mapping)
    }

    /// Group id at a 0-based position.
    pub fn group_at(&self, index: usize) -> Option<GroupId> {
        self.groups.get(index).map(|g| g.id)
    }

    /// Mapping id at 0-based (group, mapping) positions.
    pub fn mapping_at(&self, group_index: usize, mapping_index: usize) -> Option<MappingId> {
        self.groups
            .get(group_index)
            .and_then(|g| g.mappings.get(mapping_index))
            .map(|m| m.id)
    }

    /// Every mapping in group order, then insertion order within a group.
    pub fn iter_active(&self) -> impl Iterator<Item = ActiveMapping<'_>> {
        self.groups
            .iter()
            .flat_map(|group| group.mappings.iter().map(move |mapping| ActiveMapping { group, mapping }))
    }

    pub fn mapping_count(&self) -> usize {
        self.groups.iter().map(|g| g.mappings.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether any mapping other than `except` resolves to `coord`.
    pub fn coord_in_use(&self, coord: CellCoord, except: Option<MappingId>) -> bool {
        self.iter_active()
            .filter(|a| Some(a.id()) != except)
            .any(|a| a.fields().coord().ok() == Some(coord))
    }

    fn group_index(&self, id: GroupId) -> Result<usize, RegistryError> {
        self.groups
            .iter()
            .position(|g| g.id == id)
            .ok_or(RegistryError::UnknownGroup(id))
    }

    fn mapping_position(&self, id: MappingId) -> Result<(usize, usize), RegistryError> {
        self.groups
            .iter()
            .enumerate()
            .find_map(|(g, group)| group.mappings.iter().position(|m| m.id == id).map(|m| (g, m)))
            .ok_or(RegistryError::UnknownMapping(id))
    }
}

fn normalize_group_name(name: &str, index: usize) -> String {
    let name = name.trim();
    if name.is_empty() {
        format!("Group {}", index + 1)
    } else {
        name.to_string()
    }
}
