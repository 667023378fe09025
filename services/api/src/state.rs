//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared session
//! registry and the lifecycle manager that writes to it.

use relay_core::{SessionLifecycleManager, SessionRegistry};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub lifecycle: Arc<SessionLifecycleManager>,
}

impl AppState {
    /// Builds the state around a lifecycle manager, sharing its registry.
    pub fn new(lifecycle: Arc<SessionLifecycleManager>) -> Self {
        Self {
            registry: lifecycle.registry().clone(),
            lifecycle,
        }
    }
}
