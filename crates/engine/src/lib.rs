pub mod applied;
pub mod dispatch;
pub mod registry;
pub mod scheduler;

#[cfg(test)]
pub mod harness;

pub use applied::LastApplied;
pub use dispatch::{observe, Bridge, CollapsePolicy, CycleMode, CycleReport, MappingOutcome, MappingState};
pub use registry::{
    ActiveMapping, Group, GroupId, Mapping, MappingFields, MappingId, Registry, RegistryError,
    DEFAULT_GROUP_NAME,
};
pub use scheduler::{
    Poller, PollerConfig, PollerHandle, Session, SharedSession, StopSignal, DEFAULT_BACKOFF,
    DEFAULT_INTERVAL,
};
