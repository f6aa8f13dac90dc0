//! obs-websocket v5 wire format.
//!
//! Every frame is a JSON text message `{"op": <opcode>, "d": {...}}`. Only
//! the subset needed to identify and push input settings is modelled:
//!
//! | op | direction | message |
//! |----|-----------|---------|
//! | 0  | server → client | `Hello` |
//! | 1  | client → server | `Identify` |
//! | 2  | server → client | `Identified` |
//! | 6  | client → server | `Request` |
//! | 7  | server → client | `RequestResponse` |
//!
//! Anything else the server sends (events, batch responses) decodes to
//! [`ServerMessage::Other`] and is ignored by the client.

pub mod auth;
pub mod inputs;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use auth::auth_response;
pub use inputs::{input_settings, set_input_settings};

/// RPC version requested in `Identify`.
pub const RPC_VERSION: u32 = 1;

pub mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

/// `requestStatus.code` values.
pub mod status {
    pub const SUCCESS: u16 = 100;
    pub const RESOURCE_NOT_FOUND: u16 = 600;
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{0} path is empty")]
    EmptyPath(cellcast_core::ValueKind),
    #[error("cannot resolve path '{path}': {detail}")]
    BadPath { path: String, detail: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    op: u8,
    d: T,
}

// =============================================================================
// Server → Client
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Hello(HelloMessage),
    Identified(IdentifiedMessage),
    RequestResponse(RequestResponse),
    Other { op: u8 },
}

impl ServerMessage {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope<Value> = serde_json::from_str(text)?;
        let message = match envelope.op {
            op::HELLO => ServerMessage::Hello(serde_json::from_value(envelope.d)?),
            op::IDENTIFIED => ServerMessage::Identified(serde_json::from_value(envelope.d)?),
            op::REQUEST_RESPONSE => ServerMessage::RequestResponse(serde_json::from_value(envelope.d)?),
            other => ServerMessage::Other { op: other },
        };
        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloMessage {
    #[serde(default)]
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    /// Present when the server requires a password.
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedMessage {
    pub negotiated_rpc_version: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default)]
    pub comment: Option<String>,
}

impl RequestStatus {
    pub fn comment(&self) -> &str {
        self.comment.as_deref().unwrap_or("")
    }
}

// =============================================================================
// Client → Server
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Identify(IdentifyMessage),
    Request(RequestMessage),
}

impl ClientMessage {
    pub fn op(&self) -> u8 {
        match self {
            ClientMessage::Identify(_) => op::IDENTIFY,
            ClientMessage::Request(_) => op::REQUEST,
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        let d = match self {
            ClientMessage::Identify(m) => serde_json::to_value(m)?,
            ClientMessage::Request(m) => serde_json::to_value(m)?,
        };
        Ok(serde_json::to_string(&Envelope { op: self.op(), d })?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyMessage {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    /// Bitmask of event categories; 0 subscribes to nothing.
    pub event_subscriptions: u32,
}

impl IdentifyMessage {
    /// Answer a `Hello`, authenticating when it carries a challenge.
    pub fn answer(hello: &HelloMessage, password: Option<&str>) -> Self {
        let authentication = hello
            .authentication
            .as_ref()
            .map(|a| auth_response(password.unwrap_or(""), &a.salt, &a.challenge));
        Self {
            rpc_version: RPC_VERSION,
            authentication,
            event_subscriptions: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    pub request_type: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_hello_with_auth() {
        let text = r#"{"op":0,"d":{"obsWebSocketVersion":"5.1.0","rpcVersion":1,
            "authentication":{"challenge":"c","salt":"s"}}}"#;
        let ServerMessage::Hello(hello) = ServerMessage::from_json(text).unwrap() else {
            panic!("expected hello");
        };
        assert_eq!(hello.rpc_version, 1);
        assert_eq!(
            hello.authentication,
            Some(AuthChallenge {
                challenge: "c".into(),
                salt: "s".into()
            })
        );
    }

    #[test]
    fn test_decode_request_response() {
        let text = r#"{"op":7,"d":{"requestType":"SetInputSettings","requestId":"3",
            "requestStatus":{"result":false,"code":600,"comment":"No source was found"}}}"#;
        let ServerMessage::RequestResponse(resp) = ServerMessage::from_json(text).unwrap() else {
            panic!("expected response");
        };
        assert_eq!(resp.request_id, "3");
        assert_eq!(resp.request_status.code, status::RESOURCE_NOT_FOUND);
        assert_eq!(resp.request_status.comment(), "No source was found");
    }

    #[test]
    fn test_events_decode_as_other() {
        let text = r#"{"op":5,"d":{"eventType":"InputCreated","eventIntent":8}}"#;
        assert_eq!(ServerMessage::from_json(text).unwrap(), ServerMessage::Other { op: 5 });
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            ServerMessage::from_json("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(ServerMessage::from_json(r#"{"op":7,"d":{}}"#).is_err());
    }

    #[test]
    fn test_identify_without_auth() {
        let hello = HelloMessage {
            obs_web_socket_version: "5.0.0".into(),
            rpc_version: 1,
            authentication: None,
        };
        let json = ClientMessage::Identify(IdentifyMessage::answer(&hello, Some("pw")))
            .to_json()
            .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({"op": 1, "d": {"rpcVersion": 1, "eventSubscriptions": 0}}));
    }

    #[test]
    fn test_identify_with_auth() {
        let hello = HelloMessage {
            obs_web_socket_version: "5.0.0".into(),
            rpc_version: 1,
            authentication: Some(AuthChallenge {
                challenge: "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=".into(),
                salt: "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=".into(),
            }),
        };
        let identify = IdentifyMessage::answer(&hello, Some("supersecretpassword"));
        assert_eq!(
            identify.authentication.as_deref(),
            Some("1Ct943GAT+6YQUUX47Ia/ncufilbe6+oD6lY+5kaCu4=")
        );
    }
}
