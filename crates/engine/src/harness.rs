//! Test doubles for the engine's two seams.
//!
//! `RecordingSink` stands in for the target connection and records every
//! send; `ScriptedSource` serves whatever snapshot (or error) a test sets.

use std::sync::Arc;

use cellcast_core::{CellValue, ConnectionState, ReadError, SendError, Snapshot, TableSource, TargetSink, ValueKind};
use parking_lot::Mutex;

pub type Sent = (ValueKind, CellValue, String);

#[derive(Debug, Default)]
pub struct RecordingSink {
    state: Mutex<ConnectionState>,
    sent: Mutex<Vec<Sent>>,
    failure: Mutex<Option<SendError>>,
}

impl RecordingSink {
    pub fn connected() -> Self {
        let sink = Self::default();
        sink.set_state(ConnectionState::Connected);
        sink
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Make every following send fail with `error`.
    pub fn fail_with(&self, error: SendError) {
        *self.failure.lock() = Some(error);
    }

    pub fn succeed(&self) {
        *self.failure.lock() = None;
    }

    /// Successful sends so far.
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

impl TargetSink for RecordingSink {
    fn send(&self, kind: ValueKind, value: &CellValue, target: &str) -> Result<(), SendError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        self.sent.lock().push((kind, value.clone(), target.to_string()));
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }
}

#[derive(Debug)]
pub struct ScriptedSource {
    current: Result<Arc<Snapshot>, ReadError>,
    pub refreshes: usize,
    pub forced: usize,
    pub invalidations: usize,
}

impl ScriptedSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: Ok(Arc::new(snapshot)),
            refreshes: 0,
            forced: 0,
            invalidations: 0,
        }
    }

    pub fn set(&mut self, snapshot: Snapshot) {
        self.current = Ok(Arc::new(snapshot));
    }

    pub fn fail(&mut self, error: ReadError) {
        self.current = Err(error);
    }
}

impl TableSource for ScriptedSource {
    fn ensure_fresh(&mut self, force: bool) -> Result<Arc<Snapshot>, ReadError> {
        self.refreshes += 1;
        if force {
            self.forced += 1;
        }
        self.current.clone()
    }

    fn invalidate(&mut self) {
        self.invalidations += 1;
    }
}
