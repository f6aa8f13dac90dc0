//! The poll loop.
//!
//! A [`Session`] couples the [`Bridge`] with its table source; one lock
//! around the session is held for a whole cycle, so the poller and a manual
//! "update now" never interleave. The target sink has its own lock, held
//! per send.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cellcast_core::{ReadError, TableSource, TargetSink};
use log::{error, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::dispatch::{Bridge, CycleMode, CycleReport};
use crate::registry::Registry;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Bridge plus the source it reads from.
#[derive(Debug)]
pub struct Session<S> {
    bridge: Bridge,
    source: S,
    last_read_error: Option<ReadError>,
}

pub type SharedSession<S> = Arc<Mutex<Session<S>>>;

impl<S: TableSource> Session<S> {
    pub fn new(bridge: Bridge, source: S) -> Self {
        Self {
            bridge,
            source,
            last_read_error: None,
        }
    }

    pub fn into_shared(self) -> SharedSession<S> {
        Arc::new(Mutex::new(self))
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut Bridge {
        &mut self.bridge
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Load a new mapping set; cached sheet data and value memory are dropped.
    pub fn replace_registry(&mut self, registry: Registry) {
        self.bridge.replace_registry(registry);
        self.source.invalidate();
        self.last_read_error = None;
    }

    /// Refresh the sheet (forced for manual cycles) and dispatch.
    pub fn run_cycle(&mut self, mode: CycleMode, sink: &dyn TargetSink) -> CycleReport {
        let snapshot = self.source.ensure_fresh(mode == CycleMode::Manual);
        match &snapshot {
            Err(e) => self.note_read_error(mode, e),
            Ok(_) => {
                if self.last_read_error.take().is_some() {
                    info!("Sheet readable again");
                }
            }
        }
        self.bridge.run_cycle(mode, snapshot.as_deref(), sink)
    }

    /// One status line per distinct failure; auto cycles repeat every interval.
    fn note_read_error(&mut self, mode: CycleMode, e: &ReadError) {
        let repeated = self.last_read_error.as_ref() == Some(e);
        match mode {
            CycleMode::Manual => error!("Cannot update: {}", e),
            CycleMode::Auto if !repeated => warn!("Auto-update skipped: {}", e),
            CycleMode::Auto => {}
        }
        self.last_read_error = Some(e.clone());
    }
}

/// Cancellation flag with a wakeable wait.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock() = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Wait up to `timeout`; returns true if stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut stopped = lock.lock();
        while !*stopped {
            if cvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Pause after an iteration panicked.
    pub backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

pub struct Poller<S> {
    session: SharedSession<S>,
    sink: Arc<dyn TargetSink>,
    config: PollerConfig,
    stop: StopSignal,
}

impl<S: TableSource + 'static> Poller<S> {
    pub fn new(session: SharedSession<S>, sink: Arc<dyn TargetSink>, config: PollerConfig) -> Self {
        Self {
            session,
            sink,
            config,
            stop: StopSignal::new(),
        }
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run the loop on a named background thread.
    pub fn spawn(self) -> std::io::Result<PollerHandle> {
        let stop = self.stop.clone();
        let thread = thread::Builder::new()
            .name("poller".into())
            .spawn(move || self.run())?;
        info!("Background update thread started");
        Ok(PollerHandle { stop, thread })
    }

    /// Loop until stopped.
    pub fn run(&self) {
        info!("Periodic update loop starting");
        while !self.stop.is_stopped() {
            let started = Instant::now();
            let wait = match panic::catch_unwind(AssertUnwindSafe(|| self.tick())) {
                Ok(_) => self.config.interval.saturating_sub(started.elapsed()),
                Err(_) => {
                    error!("Poll iteration panicked; retrying in {:?}", self.config.backoff);
                    self.config.backoff
                }
            };
            if self.stop.wait_timeout(wait) {
                break;
            }
        }
        info!("Periodic update loop stopped");
    }

    /// One auto cycle, if connected and anything is set to auto-update.
    pub fn tick(&self) -> Option<CycleReport> {
        if !self.sink.is_connected() {
            return None;
        }
        let mut session = self.session.lock();
        if !session.bridge().has_auto_mappings() {
            return None;
        }
        Some(session.run_cycle(CycleMode::Auto, self.sink.as_ref()))
    }
}

/// Owner of a running poll thread.
pub struct PollerHandle {
    stop: StopSignal,
    thread: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }

    /// Stop and join, giving up after `timeout`. Returns whether the thread exited.
    pub fn shutdown(self, timeout: Duration) -> bool {
        self.stop.stop();
        let deadline = Instant::now() + timeout;
        while !self.thread.is_finished() {
            if Instant::now() >= deadline {
                warn!("Update thread did not stop within {:?}", timeout);
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if self.thread.join().is_err() {
            warn!("Update thread ended with a panic");
        }
        true
    }
}
