//! obs-websocket client, shared between the poller and the CLI.
//!
//! `ObsClient` speaks the wire protocol over a blocking socket;
//! `TargetAdapter` wraps one behind a mutex and a connection state machine
//! and is what the engine sends through.

mod adapter;
mod client;

pub use adapter::{ConnectError, Connector, ControlClient, TargetAdapter, WsConnector, DISCONNECT_TIMEOUT};
pub use client::{ClientError, Endpoint, ObsClient, CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT};
