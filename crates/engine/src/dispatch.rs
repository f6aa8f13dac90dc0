//! Change detection and dispatch.
//!
//! [`Bridge`] owns the registry together with the last-applied memory so
//! that structural edits (delete, move) and the memory stay consistent.
//! [`Bridge::run_cycle`] is the only place values are sent.

use std::collections::HashMap;

use cellcast_core::{CellValue, ReadError, SendError, Snapshot, TargetSink};
use log::{debug, info, warn};

use crate::applied::LastApplied;
use crate::registry::{Group, GroupId, MappingFields, MappingId, Registry, RegistryError};

/// What triggered a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    /// Poll-triggered: send only detected changes of auto-update mappings.
    Auto,
    /// User-triggered: send every mapping that has a target.
    Manual,
}

/// Whether mappings in collapsed groups take part in cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollapsePolicy {
    /// Collapsed groups are skipped by both auto and manual cycles.
    #[default]
    SkipCollapsed,
    /// Collapse is display-only.
    PollCollapsed,
}

impl CollapsePolicy {
    pub fn from_skip_flag(skip: bool) -> Self {
        if skip {
            CollapsePolicy::SkipCollapsed
        } else {
            CollapsePolicy::PollCollapsed
        }
    }

    fn skips(&self, collapsed: bool) -> bool {
        collapsed && *self == CollapsePolicy::SkipCollapsed
    }
}

/// Last evaluation result of a mapping, for display.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MappingState {
    /// Not evaluated yet.
    #[default]
    Pending,
    InvalidCoordinate,
    OutOfRange { rows: usize, cols: usize },
    ReadUnavailable,
    /// Read but not sent (no target, or nothing to send).
    Observed { value: CellValue, changed: bool },
    Applied { value: CellValue, changed: bool },
    SendFailed { value: CellValue, changed: bool, error: SendError },
}

impl MappingState {
    pub fn value(&self) -> Option<&CellValue> {
        match self {
            MappingState::Observed { value, .. }
            | MappingState::Applied { value, .. }
            | MappingState::SendFailed { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Short marker used where a value cannot be shown.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            MappingState::Pending => Some("N/A"),
            MappingState::InvalidCoordinate => Some("Num?"),
            MappingState::OutOfRange { .. } => Some("Range?"),
            MappingState::ReadUnavailable => Some("Read?"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingOutcome {
    pub id: MappingId,
    pub state: MappingState,
}

/// Counts and per-mapping results of one cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleReport {
    pub evaluated: usize,
    pub attempted: usize,
    pub succeeded: usize,
    /// Mappings passed over because their group is collapsed.
    pub skipped: usize,
    /// Set when the sheet could not be read for this cycle.
    pub read_error: Option<ReadError>,
    pub outcomes: Vec<MappingOutcome>,
}

impl CycleReport {
    /// Mappings the cycle walked over, collapsed ones included.
    pub fn processed(&self) -> usize {
        self.evaluated + self.skipped
    }

    pub fn summary(&self) -> String {
        format!(
            "Processed {}, Attempted {}, Successful {}.",
            self.processed(),
            self.attempted,
            self.succeeded
        )
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

/// Registry + last-applied memory + display states.
#[derive(Debug, Default)]
pub struct Bridge {
    registry: Registry,
    applied: LastApplied,
    states: HashMap<MappingId, MappingState>,
    policy: CollapsePolicy,
}

impl Bridge {
    pub fn new(registry: Registry, policy: CollapsePolicy) -> Self {
        Self {
            registry,
            applied: LastApplied::new(),
            states: HashMap::new(),
            policy,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn applied(&self) -> &LastApplied {
        &self.applied
    }

    pub fn policy(&self) -> CollapsePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: CollapsePolicy) {
        self.policy = policy;
    }

    pub fn state(&self, id: MappingId) -> &MappingState {
        static PENDING: MappingState = MappingState::Pending;
        self.states.get(&id).unwrap_or(&PENDING)
    }

    /// Swap in a new registry (settings import). All memory is dropped.
    pub fn replace_registry(&mut self, registry: Registry) {
        self.registry = registry;
        self.applied.clear();
        self.states.clear();
    }

    pub fn add_group(&mut self, name: &str) -> GroupId {
        self.registry.add_group(name)
    }

    pub fn rename_group(&mut self, id: GroupId, name: &str) -> Result<(), RegistryError> {
        self.registry.rename_group(id, name)
    }

    pub fn set_group_collapsed(&mut self, id: GroupId, collapsed: bool) -> Result<(), RegistryError> {
        self.registry.set_group_collapsed(id, collapsed)
    }

    pub fn delete_group(&mut self, id: GroupId) -> Result<Group, RegistryError> {
        let group = self.registry.delete_group(id)?;
        for mapping in &group.mappings {
            self.release(mapping.id, &mapping.fields);
        }
        info!("Deleted group '{}'", group.name);
        Ok(group)
    }

    pub fn add_mapping(&mut self, group: GroupId, fields: MappingFields) -> Result<MappingId, RegistryError> {
        self.registry.add_mapping(group, fields)
    }

    /// Delete a mapping, purging its coordinate's memory unless another
    /// mapping still reads the same cell.
    pub fn delete_mapping(&mut self, id: MappingId) -> Result<(), RegistryError> {
        let mapping = self.registry.delete_mapping(id)?;
        self.release(id, &mapping.fields);
        Ok(())
    }

    /// Edit a mapping. Moving it off a coordinate releases that coordinate.
    pub fn edit_mapping(&mut self, id: MappingId, fields: MappingFields) -> Result<(), RegistryError> {
        let new_coord = fields.coord().ok();
        let old = self.registry.edit_mapping(id, fields)?;
        if old.coord().ok() != new_coord {
            self.release(id, &old);
        } else {
            self.states.remove(&id);
        }
        Ok(())
    }

    fn release(&mut self, id: MappingId, fields: &MappingFields) {
        self.states.remove(&id);
        if let Ok(coord) = fields.coord() {
            if !self.registry.coord_in_use(coord, Some(id)) && self.applied.forget(coord).is_some() {
                debug!("Cleared last applied value for {}", coord);
            }
        }
    }

    /// Whether an auto cycle would have anything to look at.
    pub fn has_auto_mappings(&self) -> bool {
        self.registry
            .iter_active()
            .any(|m| !self.policy.skips(m.collapsed()) && m.fields().auto_update)
    }

    /// Evaluate every mapping against `snapshot` and send what the mode requires.
    pub fn run_cycle(
        &mut self,
        mode: CycleMode,
        snapshot: Result<&Snapshot, &ReadError>,
        sink: &dyn TargetSink,
    ) -> CycleReport {
        let mut report = CycleReport {
            read_error: snapshot.err().cloned(),
            ..CycleReport::default()
        };

        let Bridge { registry, applied, policy, .. } = self;

        for entry in registry.iter_active() {
            if policy.skips(entry.collapsed()) {
                report.skipped += 1;
                continue;
            }
            let fields = entry.fields();
            if mode == CycleMode::Auto && !fields.auto_update {
                continue;
            }
            report.evaluated += 1;

            let state = evaluate(mode, &entry.group.name, fields, snapshot, applied, sink, &mut report);
            report.outcomes.push(MappingOutcome { id: entry.id(), state });
        }

        for outcome in &report.outcomes {
            self.states.insert(outcome.id, outcome.state.clone());
        }

        match mode {
            CycleMode::Manual => info!("Manual update: {}", report.summary()),
            CycleMode::Auto if report.succeeded > 0 => {
                info!("Auto-update: sent {} change(s)", report.succeeded)
            }
            CycleMode::Auto => {}
        }
        report
    }
}

fn evaluate(
    mode: CycleMode,
    group_name: &str,
    fields: &MappingFields,
    snapshot: Result<&Snapshot, &ReadError>,
    applied: &mut LastApplied,
    sink: &dyn TargetSink,
    report: &mut CycleReport,
) -> MappingState {
    let coord = match fields.coord() {
        Ok(coord) => coord,
        Err(e) => {
            log_skip(mode, format_args!("Skipping mapping in '{}': {}", group_name, e));
            return MappingState::InvalidCoordinate;
        }
    };

    let snapshot = match snapshot {
        Ok(snapshot) => snapshot,
        Err(_) => return MappingState::ReadUnavailable,
    };

    let value = match snapshot.get(coord) {
        Some(value) => value,
        None => {
            let (rows, cols) = snapshot.shape();
            log_skip(
                mode,
                format_args!("Skipping mapping in '{}': cell {} out of range ({}x{})", group_name, coord, rows, cols),
            );
            return MappingState::OutOfRange { rows, cols };
        }
    };

    let previous = applied.get(coord);
    let first_seen = previous.is_none();
    let changed = previous.is_some_and(|p| *p != value);

    let target = fields.target_name();
    let should_send = !target.is_empty()
        && match mode {
            CycleMode::Manual => true,
            CycleMode::Auto => changed,
        };

    if changed {
        debug!("Change detected: '{}' {} (target '{}')", group_name, coord, target);
    }

    if !should_send {
        if first_seen {
            applied.establish(coord, value.clone());
        }
        return MappingState::Observed { value, changed };
    }

    report.attempted += 1;
    match sink.send(fields.kind, &value, target) {
        Ok(()) => {
            report.succeeded += 1;
            applied.record(coord, value.clone());
            MappingState::Applied { value, changed }
        }
        Err(error) => {
            warn!("Update of '{}' from {} failed: {}", target, coord, error);
            MappingState::SendFailed { value, changed, error }
        }
    }
}

/// Auto cycles repeat every interval; keep their skip noise at debug.
fn log_skip(mode: CycleMode, args: std::fmt::Arguments<'_>) {
    match mode {
        CycleMode::Manual => warn!("{}", args),
        CycleMode::Auto => debug!("{}", args),
    }
}

/// What `fields` currently points at, without sending or touching memory.
pub fn observe(fields: &MappingFields, snapshot: Result<&Snapshot, &ReadError>) -> MappingState {
    let Ok(coord) = fields.coord() else {
        return MappingState::InvalidCoordinate;
    };
    let Ok(snapshot) = snapshot else {
        return MappingState::ReadUnavailable;
    };
    match snapshot.get(coord) {
        Some(value) => MappingState::Observed { value, changed: false },
        None => {
            let (rows, cols) = snapshot.shape();
            MappingState::OutOfRange { rows, cols }
        }
    }
}
