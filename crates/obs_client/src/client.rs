//! Blocking obs-websocket v5 client.
//!
//! Connect → Hello → Identify → Identified, then one request at a time.
//! Events are never subscribed to; any that arrive are skipped while
//! waiting for a response.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use cellcast_core::{CellValue, ValueKind};
use cellcast_protocol::{
    set_input_settings, ClientMessage, IdentifyMessage, RequestResponse, ServerMessage,
};
use log::{debug, info};
use thiserror::Error;
use tungstenite::protocol::CloseFrame;
use tungstenite::{Message, WebSocket};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 4444;
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Close code obs-websocket uses for a rejected Identify.
const CLOSE_AUTH_FAILED: u16 = 4009;

/// Where to connect, and with what password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: None,
        }
    }

    /// Empty passwords count as none.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("connection closed by server: {0}")]
    ConnectionClosed(String),
    #[error("timed out waiting for the server")]
    Timeout,
    #[error("I/O error: {0}")]
    Io(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("request failed [{code}]: {comment}")]
    RequestFailed { code: u16, comment: String },
}

impl ClientError {
    /// Whether the socket is no longer usable.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionClosed(_) | ClientError::Timeout | ClientError::Io(_)
        )
    }
}

/// An identified obs-websocket session.
pub struct ObsClient {
    socket: WebSocket<TcpStream>,
    timeout: Duration,
    next_id: u64,
    rpc_version: u32,
}

impl ObsClient {
    /// Open the socket and complete the Hello/Identify exchange.
    ///
    /// `timeout` bounds the TCP connect and every later read and write.
    pub fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Self, ClientError> {
        let stream = open_stream(endpoint, timeout)?;
        stream
            .set_read_timeout(Some(timeout))
            .and_then(|_| stream.set_write_timeout(Some(timeout)))
            .and_then(|_| stream.set_nodelay(true))
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        let (socket, _response) = tungstenite::client(endpoint.url(), stream)
            .map_err(|e| ClientError::ConnectionFailed(format!("WebSocket handshake failed: {}", e)))?;

        let mut client = Self {
            socket,
            timeout,
            next_id: 1,
            rpc_version: 0,
        };

        let hello = match client.receive()? {
            ServerMessage::Hello(hello) => hello,
            other => return Err(ClientError::Protocol(format!("expected Hello, got {:?}", other))),
        };
        debug!(
            "Server obs-websocket {} (rpc {}), auth {}",
            hello.obs_web_socket_version,
            hello.rpc_version,
            if hello.authentication.is_some() { "required" } else { "not required" }
        );

        let identify = IdentifyMessage::answer(&hello, endpoint.password.as_deref());
        client.send(&ClientMessage::Identify(identify))?;

        match client.receive() {
            Ok(ServerMessage::Identified(identified)) => {
                client.rpc_version = identified.negotiated_rpc_version;
                info!("Identified with {} (rpc {})", endpoint, client.rpc_version);
                Ok(client)
            }
            Ok(other) => Err(ClientError::Protocol(format!("expected Identified, got {:?}", other))),
            Err(ClientError::ConnectionClosed(reason)) if hello.authentication.is_some() => {
                Err(ClientError::AuthFailed(reason))
            }
            Err(e) => Err(e),
        }
    }

    pub fn rpc_version(&self) -> u32 {
        self.rpc_version
    }

    /// Overlay a value onto an input's settings.
    pub fn set_input_settings(&mut self, input: &str, kind: ValueKind, value: &CellValue) -> Result<(), ClientError> {
        let id = self.next_request_id();
        let request = set_input_settings(id.as_str(), input, kind, value)
            .map_err(|e| ClientError::InvalidArgument(e.to_string()))?;
        self.send(&ClientMessage::Request(request))?;

        let response = self.await_response(&id)?;
        let status = &response.request_status;
        if status.result {
            Ok(())
        } else {
            Err(ClientError::RequestFailed {
                code: status.code,
                comment: status.comment().to_string(),
            })
        }
    }

    /// Send a close frame and drain until the server acknowledges.
    pub fn disconnect(mut self) {
        if self.socket.close(None).is_err() {
            return;
        }
        let deadline = Instant::now() + self.timeout;
        while Instant::now() < deadline {
            if self.socket.read().is_err() {
                break;
            }
        }
        debug!("Socket closed");
    }

    fn next_request_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }

    fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        let json = msg.to_json().map_err(|e| ClientError::Protocol(e.to_string()))?;
        self.socket.send(Message::Text(json)).map_err(map_ws_error)
    }

    fn receive(&mut self) -> Result<ServerMessage, ClientError> {
        loop {
            match self.socket.read().map_err(map_ws_error)? {
                Message::Text(text) => {
                    return ServerMessage::from_json(&text).map_err(|e| ClientError::Protocol(e.to_string()));
                }
                Message::Close(frame) => return Err(closed(frame)),
                // Pings are answered by tungstenite on the next read or write
                _ => continue,
            }
        }
    }

    fn await_response(&mut self, id: &str) -> Result<RequestResponse, ClientError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if Instant::now() >= deadline {
                return Err(ClientError::Timeout);
            }
            match self.receive()? {
                ServerMessage::RequestResponse(response) if response.request_id == id => return Ok(response),
                ServerMessage::RequestResponse(response) => {
                    debug!("Ignoring response to request {}", response.request_id);
                }
                _ => {}
            }
        }
    }
}

fn open_stream(endpoint: &Endpoint, timeout: Duration) -> Result<TcpStream, ClientError> {
    let addrs = (endpoint.host.as_str(), endpoint.port)
        .to_socket_addrs()
        .map_err(|e| ClientError::ConnectionFailed(format!("cannot resolve {}: {}", endpoint, e)))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(ClientError::ConnectionFailed(match last_error {
        Some(e) => format!("{}: {}", endpoint, e),
        None => format!("{}: no addresses", endpoint),
    }))
}

fn closed(frame: Option<CloseFrame<'_>>) -> ClientError {
    match frame {
        Some(frame) if u16::from(frame.code) == CLOSE_AUTH_FAILED => ClientError::AuthFailed(frame.reason.to_string()),
        Some(frame) => ClientError::ConnectionClosed(format!("{} {}", u16::from(frame.code), frame.reason)),
        None => ClientError::ConnectionClosed("no close frame".to_string()),
    }
}

fn map_ws_error(e: tungstenite::Error) -> ClientError {
    use std::io::ErrorKind;
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ClientError::ConnectionClosed("socket closed".to_string())
        }
        tungstenite::Error::Io(io) if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            ClientError::Timeout
        }
        tungstenite::Error::Io(io) => ClientError::Io(io.to_string()),
        other => ClientError::Protocol(other.to_string()),
    }
}
