//! Manages the relay WebSocket connection lifecycle for a single session.
//!
//! Each connection runs the state machine
//! `Connecting → Validating → Greeting → Streaming → Closing → Closed`
//! on its own task. Peer-caused problems (unknown ids, malformed frames,
//! disconnects) are ordinary transitions, never errors raised to the caller.

use super::protocol::{ClientFrame, ServerMessage};
use crate::state::AppState;
use axum::{
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use relay_core::{SessionId, SessionRecord, SessionRegistry};
use std::{fmt::Display, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Maximum number of transcript characters written to the log.
const TRANSCRIPT_LOG_CHARS: usize = 30;

/// Axum handler to upgrade an HTTP connection to a relay WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, session_id.into(), registry))
}

#[instrument(name = "ws_relay", skip_all, fields(session_id = %session_id))]
async fn handle_socket(socket: WebSocket, session_id: SessionId, registry: Arc<SessionRegistry>) {
    info!("New relay connection.");
    let mut relay = RelayConnection::new(socket, session_id, registry);
    relay.run().await;
    info!("Relay connection finished.");
}

/// Why a connection attempt was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid session identifier")]
    InvalidSession,
    #[error("session inactive")]
    InactiveSession,
}

/// Checks a session id against the registry's current view.
pub fn validate_session(
    registry: &SessionRegistry,
    session_id: &SessionId,
) -> Result<SessionRecord, ValidationError> {
    let record = registry
        .get(session_id)
        .ok_or(ValidationError::InvalidSession)?;
    if !record.is_active {
        return Err(ValidationError::InactiveSession);
    }
    Ok(record)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Connecting,
    Validating,
    Greeting,
    Streaming,
    Closing(CloseReason),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The session id failed validation.
    Rejected,
    /// The peer sent a close frame.
    PeerClosed,
    /// The peer vanished without a close handshake.
    PeerGone,
    /// A server-side fault ended the connection.
    Internal,
}

impl CloseReason {
    fn close_frame(self) -> CloseFrame {
        match self {
            CloseReason::Rejected => CloseFrame {
                code: close_code::POLICY,
                reason: "invalid or inactive session".into(),
            },
            CloseReason::Internal => CloseFrame {
                code: close_code::ERROR,
                reason: "internal error".into(),
            },
            CloseReason::PeerClosed | CloseReason::PeerGone => CloseFrame {
                code: close_code::NORMAL,
                reason: "".into(),
            },
        }
    }
}

/// What the streaming loop should do with one inbound transport message.
#[derive(Debug, PartialEq)]
enum FrameOutcome {
    Structured(ClientFrame),
    Malformed,
    Control,
    PeerClosed,
}

impl FrameOutcome {
    fn classify(message: Message) -> Self {
        match message {
            Message::Text(text) => match ClientFrame::parse(text.as_str()) {
                Ok(frame) => FrameOutcome::Structured(frame),
                Err(_) => FrameOutcome::Malformed,
            },
            Message::Binary(_) => FrameOutcome::Malformed,
            Message::Ping(_) | Message::Pong(_) => FrameOutcome::Control,
            Message::Close(_) => FrameOutcome::PeerClosed,
        }
    }
}

#[derive(Error, Debug)]
enum SendFailure {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("peer unreachable: {0}")]
    Transport(String),
}

impl SendFailure {
    fn close_reason(&self) -> CloseReason {
        match self {
            SendFailure::Encode(_) => CloseReason::Internal,
            SendFailure::Transport(_) => CloseReason::PeerGone,
        }
    }
}

/// One relay connection and its state machine.
///
/// Generic over the transport so the state machine runs the same way over an
/// axum `WebSocket` and over an in-memory socket in tests.
pub struct RelayConnection<S> {
    socket: S,
    session_id: SessionId,
    registry: Arc<SessionRegistry>,
    state: RelayState,
    closed: bool,
}

impl<S, E> RelayConnection<S>
where
    S: Stream<Item = Result<Message, E>> + Sink<Message, Error = E> + Unpin,
    E: Display,
{
    pub fn new(socket: S, session_id: SessionId, registry: Arc<SessionRegistry>) -> Self {
        Self {
            socket,
            session_id,
            registry,
            state: RelayState::Connecting,
            closed: false,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Drives the connection until it reaches `Closed`.
    pub async fn run(&mut self) {
        while self.state != RelayState::Closed {
            let next = match self.state {
                RelayState::Connecting => RelayState::Validating,
                RelayState::Validating => self.validate().await,
                RelayState::Greeting => self.greet().await,
                RelayState::Streaming => self.stream().await,
                RelayState::Closing(reason) => {
                    self.close(reason).await;
                    RelayState::Closed
                }
                RelayState::Closed => RelayState::Closed,
            };
            debug!(from = ?self.state, to = ?next, "Relay state transition");
            self.state = next;
        }
    }

    async fn validate(&mut self) -> RelayState {
        match validate_session(&self.registry, &self.session_id) {
            Ok(_) => RelayState::Greeting,
            Err(e) => {
                warn!(reason = %e, "Rejecting relay connection");
                if let Err(send_err) = self.send_msg(ServerMessage::error(e.to_string())).await {
                    debug!(error = %send_err, "Could not deliver rejection frame");
                }
                RelayState::Closing(CloseReason::Rejected)
            }
        }
    }

    async fn greet(&mut self) -> RelayState {
        // Re-read so the greeting reflects the registry, not a cached copy.
        let is_active = self
            .registry
            .get(&self.session_id)
            .is_some_and(|record| record.is_active);
        let greeting = [
            ServerMessage::status("connection established"),
            ServerMessage::SessionInfo {
                session_id: self.session_id.clone(),
                is_active,
            },
        ];
        for msg in greeting {
            if let Err(e) = self.send_msg(msg).await {
                debug!(error = %e, "Peer left during greeting");
                return RelayState::Closing(e.close_reason());
            }
        }
        RelayState::Streaming
    }

    async fn stream(&mut self) -> RelayState {
        while let Some(received) = self.socket.next().await {
            let message = match received {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Error receiving from relay client");
                    return RelayState::Closing(CloseReason::PeerGone);
                }
            };

            let replies = match FrameOutcome::classify(message) {
                FrameOutcome::Control => continue,
                FrameOutcome::PeerClosed => {
                    info!("Client sent close frame.");
                    return RelayState::Closing(CloseReason::PeerClosed);
                }
                FrameOutcome::Malformed => {
                    debug!("Received unstructured frame");
                    vec![
                        ServerMessage::error("expected structured message"),
                        ServerMessage::ack("unknown"),
                    ]
                }
                FrameOutcome::Structured(frame) => {
                    log_transcript(&frame);
                    vec![ServerMessage::ack(&frame.kind)]
                }
            };

            for reply in replies {
                if let Err(e) = self.send_msg(reply).await {
                    match e.close_reason() {
                        CloseReason::Internal => error!(error = %e, "Relay fault"),
                        _ => debug!(error = %e, "Peer left mid-stream"),
                    }
                    return RelayState::Closing(e.close_reason());
                }
            }
        }
        info!("Client disconnected.");
        RelayState::Closing(CloseReason::PeerGone)
    }

    /// Attempts a graceful close. Only the first call touches the transport.
    async fn close(&mut self, reason: CloseReason) {
        if self.closed {
            debug!(?reason, "Relay already closed; ignoring close request");
            return;
        }
        self.closed = true;
        if let Err(e) = self
            .socket
            .send(Message::Close(Some(reason.close_frame())))
            .await
        {
            debug!(?reason, error = %e, "Close handshake failed; transport already closed");
        }
    }

    async fn send_msg(&mut self, msg: ServerMessage) -> Result<(), SendFailure> {
        let serialized = serde_json::to_string(&msg)?;
        self.socket
            .send(Message::Text(serialized.into()))
            .await
            .map_err(|e| SendFailure::Transport(e.to_string()))
    }
}

fn log_transcript(frame: &ClientFrame) {
    if frame.kind != "transcript" {
        return;
    }
    if let Some(text) = frame.text.as_deref().filter(|t| !t.is_empty()) {
        info!(transcript = %truncate_chars(text, TRANSCRIPT_LOG_CHARS), "Transcript received");
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
