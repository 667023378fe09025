//! WebSocket Relay
//!
//! This module contains the per-connection relay logic. It is split into:
//!
//! - `protocol`: Defines the JSON frames exchanged with the browser client.
//! - `session`: Validates the connection against the session registry and runs
//!   the relay state machine until the connection closes.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
