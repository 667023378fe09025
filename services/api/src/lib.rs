//! Realtime Relay API Library Crate
//!
//! This library contains the web-facing half of the relay: configuration,
//! logging setup, the REST handlers for session creation and termination, the
//! WebSocket relay, and routing. The binaries in `bin/` are thin wrappers
//! around it.

pub mod config;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
