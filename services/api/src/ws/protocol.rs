//! Defines the WebSocket message protocol between the browser client and the relay.

use relay_core::SessionId;
use serde::{Deserialize, Serialize};

/// Frames sent from the client (browser) to the server.
///
/// Any JSON object carrying a string `type` is accepted; the payload is
/// optional and only `text` is looked at.
#[derive(Deserialize, Debug, PartialEq)]
pub struct ClientFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ClientFrame {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Frames sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Informational status, including per-frame acknowledgements.
    Status { message: String },
    /// Reports a client-caused problem.
    Error { message: String },
    /// Describes the session this connection is bound to.
    SessionInfo {
        session_id: SessionId,
        is_active: bool,
    },
}

impl ServerMessage {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Acknowledges an inbound frame of the given type.
    pub fn ack(kind: &str) -> Self {
        Self::status(format!("received message of type {kind}"))
    }
}
