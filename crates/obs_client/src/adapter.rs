use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cellcast_core::{CellValue, ConnectionState, SendError, TargetSink, ValueKind};
use cellcast_protocol::status;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::client::{ClientError, Endpoint, ObsClient, CONNECT_TIMEOUT};

pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// A connected control session.
pub trait ControlClient: Send {
    fn set_input_settings(&mut self, input: &str, kind: ValueKind, value: &CellValue) -> Result<(), ClientError>;

    /// Close the session. May block; callers bound it.
    fn disconnect(self);
}

/// Opens control sessions.
pub trait Connector: Send + Sync {
    type Client: ControlClient + 'static;

    fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Self::Client, ClientError>;
}

impl ControlClient for ObsClient {
    fn set_input_settings(&mut self, input: &str, kind: ValueKind, value: &CellValue) -> Result<(), ClientError> {
        ObsClient::set_input_settings(self, input, kind, value)
    }

    fn disconnect(self) {
        ObsClient::disconnect(self)
    }
}

/// Connects over obs-websocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Client = ObsClient;

    fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> Result<ObsClient, ClientError> {
        ObsClient::connect(endpoint, timeout)
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("a connection attempt is already in progress")]
    InProgress,
    #[error("disconnected while connecting")]
    Cancelled,
    #[error(transparent)]
    Client(#[from] ClientError),
}

struct Link<C> {
    state: ConnectionState,
    client: Option<C>,
    /// Bumped by every explicit disconnect.
    generation: u64,
}

/// The engine's view of the target: one client behind one lock.
///
/// State moves `Disconnected → Connecting → Connected` and back to
/// `Disconnected` on an explicit disconnect, a failed connect, or a send
/// that finds the socket dead. The lock is held for a single send or a
/// single install/take of the client; the slow parts of connecting and
/// disconnecting run outside it.
pub struct TargetAdapter<K: Connector = WsConnector> {
    connector: K,
    link: Mutex<Link<K::Client>>,
    connecting: AtomicBool,
    connect_timeout: Duration,
    disconnect_timeout: Duration,
}

impl TargetAdapter<WsConnector> {
    pub fn obs() -> Self {
        Self::new(WsConnector)
    }
}

impl<K: Connector> TargetAdapter<K> {
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            link: Mutex::new(Link {
                state: ConnectionState::Disconnected,
                client: None,
                generation: 0,
            }),
            connecting: AtomicBool::new(false),
            connect_timeout: CONNECT_TIMEOUT,
            disconnect_timeout: DISCONNECT_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, disconnect: Duration) -> Self {
        self.connect_timeout = connect;
        self.disconnect_timeout = disconnect;
        self
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }

    /// Connect, replacing any existing session. Refused while another
    /// attempt is running.
    pub fn connect(&self, endpoint: &Endpoint) -> Result<(), ConnectError> {
        if self.connecting.swap(true, Ordering::SeqCst) {
            warn!("Connection attempt already in progress");
            return Err(ConnectError::InProgress);
        }
        let result = self.establish(endpoint);
        self.connecting.store(false, Ordering::SeqCst);
        result
    }

    /// A disconnect that lands while the connector is running wins: the new
    /// session is closed and the state stays `Disconnected`.
    fn establish(&self, endpoint: &Endpoint) -> Result<(), ConnectError> {
        let (previous, generation) = {
            let mut link = self.link.lock();
            link.state = ConnectionState::Connecting;
            (link.client.take(), link.generation)
        };
        if let Some(previous) = previous {
            self.close_bounded(previous);
        }

        info!("Connecting to {}...", endpoint);
        let result = self.connector.connect(endpoint, self.connect_timeout);
        let mut link = self.link.lock();
        if link.generation != generation {
            drop(link);
            warn!("Disconnect requested while connecting to {}; dropping the new session", endpoint);
            if let Ok(client) = result {
                self.close_bounded(client);
            }
            return Err(ConnectError::Cancelled);
        }
        match result {
            Ok(client) => {
                link.client = Some(client);
                link.state = ConnectionState::Connected;
                info!("Connected to {}", endpoint);
                Ok(())
            }
            Err(e) => {
                link.state = ConnectionState::Disconnected;
                drop(link);
                error!("Connection to {} failed: {}", endpoint, e);
                Err(e.into())
            }
        }
    }

    /// Connect on a helper thread.
    pub fn connect_in_background(self: &Arc<Self>, endpoint: Endpoint) -> std::io::Result<JoinHandle<Result<(), ConnectError>>>
    where
        K: 'static,
    {
        let adapter = Arc::clone(self);
        thread::Builder::new()
            .name("connect".into())
            .spawn(move || adapter.connect(&endpoint))
    }

    /// Drop the session, and cancel any connect in flight. Returns false if
    /// closing the session did not finish in time.
    pub fn disconnect(&self) -> bool {
        let client = {
            let mut link = self.link.lock();
            link.state = ConnectionState::Disconnected;
            link.generation += 1;
            link.client.take()
        };
        match client {
            Some(client) => {
                info!("Disconnecting...");
                self.close_bounded(client)
            }
            None => true,
        }
    }

    fn close_bounded(&self, client: K::Client) -> bool {
        let (done_tx, done_rx) = mpsc::channel();
        let spawned = thread::Builder::new().name("disconnect".into()).spawn(move || {
            client.disconnect();
            let _ = done_tx.send(());
        });
        if let Err(e) = spawned {
            warn!("Could not start disconnect thread: {}", e);
            return false;
        }
        match done_rx.recv_timeout(self.disconnect_timeout) {
            Ok(()) => {
                debug!("Disconnected");
                true
            }
            Err(_) => {
                warn!("Disconnect did not finish within {:?}; abandoning it", self.disconnect_timeout);
                false
            }
        }
    }
}

impl<K: Connector> TargetSink for TargetAdapter<K> {
    fn send(&self, kind: ValueKind, value: &CellValue, target: &str) -> Result<(), SendError> {
        let mut link = self.link.lock();
        if link.state != ConnectionState::Connected {
            return Err(SendError::Disconnected);
        }
        let Some(client) = link.client.as_mut() else {
            link.state = ConnectionState::Disconnected;
            return Err(SendError::Disconnected);
        };
        if target.trim().is_empty() {
            return Err(SendError::InvalidArgument("target name is empty".into()));
        }

        match client.set_input_settings(target, kind, value) {
            Ok(()) => {
                debug!("Updated '{}' ({}): {}", target, kind, value.preview(cellcast_core::value::PREVIEW_CHARS));
                Ok(())
            }
            Err(e) if e.is_connection_lost() => {
                link.state = ConnectionState::Disconnected;
                link.client = None;
                error!("Connection lost while updating '{}': {}", target, e);
                Err(SendError::ConnectionLost(e.to_string()))
            }
            Err(ClientError::RequestFailed { code: status::RESOURCE_NOT_FOUND, .. }) => {
                Err(SendError::TargetNotFound(target.to_string()))
            }
            Err(ClientError::RequestFailed { code, comment }) => Err(SendError::SendRejected { code, comment }),
            Err(ClientError::InvalidArgument(detail)) => Err(SendError::InvalidArgument(detail)),
            Err(e) => Err(SendError::Other(e.to_string())),
        }
    }

    fn state(&self) -> ConnectionState {
        self.link.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Instant;

    type Calls = Arc<Mutex<Vec<String>>>;

    struct FakeClient {
        id: usize,
        calls: Calls,
        replies: Arc<Mutex<VecDeque<Result<(), ClientError>>>>,
        hang: Duration,
    }

    impl ControlClient for FakeClient {
        fn set_input_settings(&mut self, input: &str, _kind: ValueKind, value: &CellValue) -> Result<(), ClientError> {
            self.calls.lock().push(format!("{}={}", input, value));
            self.replies.lock().pop_front().unwrap_or(Ok(()))
        }

        fn disconnect(self) {
            thread::sleep(self.hang);
            self.calls.lock().push(format!("disconnect#{}", self.id));
        }
    }

    #[derive(Default)]
    struct FakeConnector {
        calls: Calls,
        replies: Arc<Mutex<VecDeque<Result<(), ClientError>>>>,
        refuse: Mutex<Option<ClientError>>,
        connect_delay: Duration,
        hang: Duration,
        connects: Mutex<usize>,
    }

    impl Connector for FakeConnector {
        type Client = FakeClient;

        fn connect(&self, _endpoint: &Endpoint, _timeout: Duration) -> Result<FakeClient, ClientError> {
            thread::sleep(self.connect_delay);
            if let Some(e) = self.refuse.lock().take() {
                return Err(e);
            }
            let mut connects = self.connects.lock();
            *connects += 1;
            Ok(FakeClient {
                id: *connects,
                calls: Arc::clone(&self.calls),
                replies: Arc::clone(&self.replies),
                hang: self.hang,
            })
        }
    }

    fn connected(connector: FakeConnector) -> TargetAdapter<FakeConnector> {
        let adapter = TargetAdapter::new(connector);
        adapter.connect(&Endpoint::default()).unwrap();
        adapter
    }

    fn reply(adapter: &TargetAdapter<FakeConnector>, result: Result<(), ClientError>) {
        adapter.connector().replies.lock().push_back(result);
    }

    fn calls(adapter: &TargetAdapter<FakeConnector>) -> Vec<String> {
        adapter.connector().calls.lock().clone()
    }

    #[test]
    fn test_send_when_connected() {
        let adapter = connected(FakeConnector::default());
        assert_eq!(adapter.state(), ConnectionState::Connected);
        adapter.send(ValueKind::Text, &CellValue::Int(3), "HomeScore").unwrap();
        assert_eq!(calls(&adapter), vec!["HomeScore=3"]);
    }

    #[test]
    fn test_send_while_disconnected() {
        let adapter = TargetAdapter::new(FakeConnector::default());
        let err = adapter.send(ValueKind::Text, &CellValue::Int(3), "HomeScore").unwrap_err();
        assert_eq!(err, SendError::Disconnected);
        assert!(calls(&adapter).is_empty());
    }

    #[test]
    fn test_empty_target_rejected() {
        let adapter = connected(FakeConnector::default());
        let err = adapter.send(ValueKind::Text, &CellValue::Int(3), "  ").unwrap_err();
        assert!(matches!(err, SendError::InvalidArgument(_)));
        assert!(calls(&adapter).is_empty());
    }

    #[test]
    fn test_request_failures_mapped() {
        let adapter = connected(FakeConnector::default());
        reply(&adapter, Err(ClientError::RequestFailed { code: 600, comment: "No source".into() }));
        reply(&adapter, Err(ClientError::RequestFailed { code: 604, comment: "Wrong kind".into() }));

        let err = adapter.send(ValueKind::Text, &CellValue::Int(1), "Missing").unwrap_err();
        assert_eq!(err, SendError::TargetNotFound("Missing".into()));

        let err = adapter.send(ValueKind::Image, &CellValue::text("a.png"), "Logo").unwrap_err();
        assert_eq!(err, SendError::SendRejected { code: 604, comment: "Wrong kind".into() });
        assert_eq!(adapter.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_connection_lost_flips_state() {
        let adapter = connected(FakeConnector::default());
        reply(&adapter, Err(ClientError::Io("broken pipe".into())));

        let err = adapter.send(ValueKind::Text, &CellValue::Int(1), "HomeScore").unwrap_err();
        assert!(matches!(err, SendError::ConnectionLost(_)));
        assert_eq!(adapter.state(), ConnectionState::Disconnected);

        let err = adapter.send(ValueKind::Text, &CellValue::Int(2), "HomeScore").unwrap_err();
        assert_eq!(err, SendError::Disconnected);
    }

    #[test]
    fn test_failed_connect_leaves_disconnected() {
        let connector = FakeConnector::default();
        *connector.refuse.lock() = Some(ClientError::ConnectionFailed("refused".into()));
        let adapter = TargetAdapter::new(connector);

        let err = adapter.connect(&Endpoint::default()).unwrap_err();
        assert!(matches!(err, ConnectError::Client(ClientError::ConnectionFailed(_))));
        assert_eq!(adapter.state(), ConnectionState::Disconnected);

        adapter.connect(&Endpoint::default()).unwrap();
        assert!(adapter.is_connected());
    }

    #[test]
    fn test_reentrant_connect_refused() {
        let adapter = Arc::new(TargetAdapter::new(FakeConnector {
            connect_delay: Duration::from_millis(300),
            ..FakeConnector::default()
        }));
        let background = adapter.connect_in_background(Endpoint::default()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while adapter.state() != ConnectionState::Connecting && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(adapter.state(), ConnectionState::Connecting);
        assert!(matches!(adapter.connect(&Endpoint::default()), Err(ConnectError::InProgress)));

        background.join().unwrap().unwrap();
        assert_eq!(adapter.state(), ConnectionState::Connected);
        assert_eq!(*adapter.connector().connects.lock(), 1);
    }

    #[test]
    fn test_disconnect_while_connecting_wins() {
        let adapter = Arc::new(TargetAdapter::new(FakeConnector {
            connect_delay: Duration::from_millis(300),
            ..FakeConnector::default()
        }));
        let background = adapter.connect_in_background(Endpoint::default()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while adapter.state() != ConnectionState::Connecting && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(adapter.disconnect());
        assert_eq!(adapter.state(), ConnectionState::Disconnected);

        let result = background.join().unwrap();
        assert!(matches!(result, Err(ConnectError::Cancelled)));
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
        assert_eq!(calls(&adapter), vec!["disconnect#1"]);

        let err = adapter.send(ValueKind::Text, &CellValue::Int(1), "HomeScore").unwrap_err();
        assert_eq!(err, SendError::Disconnected);

        adapter.connect(&Endpoint::default()).unwrap();
        assert!(adapter.is_connected());
    }

    #[test]
    fn test_hung_disconnect_is_bounded() {
        let adapter = connected(FakeConnector {
            hang: Duration::from_secs(5),
            ..FakeConnector::default()
        })
        .with_timeouts(CONNECT_TIMEOUT, Duration::from_millis(50));

        let started = Instant::now();
        assert!(!adapter.disconnect());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_reconnect_closes_previous_session() {
        let adapter = connected(FakeConnector::default());
        adapter.connect(&Endpoint::default()).unwrap();
        assert_eq!(calls(&adapter), vec!["disconnect#1"]);
        assert!(adapter.disconnect());
        assert_eq!(calls(&adapter), vec!["disconnect#1", "disconnect#2"]);
    }
}
