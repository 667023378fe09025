//! Session Lifecycle Manager
//!
//! Orchestrates session creation and termination. It is the only component
//! that writes to the [`SessionRegistry`]: a record is inserted only after the
//! provider has returned a credential, so callers either receive a fully
//! registered `(id, payload)` pair or an error, never a half-registered
//! session.

use crate::{
    credential::{CredentialClient, CredentialError, CredentialRequest},
    registry::{RegistryError, SessionRegistry},
    session::{SessionId, SessionRecord},
};
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Session creation failed: {0}")]
    SessionCreationFailed(#[from] CredentialError),
    #[error("Internal registry fault: {0}")]
    Internal(#[from] RegistryError),
    #[error("Session not found: {0}")]
    NotFound(SessionId),
}

/// Provider parameters applied to every new session.
#[derive(Clone, Debug)]
pub struct SessionDefaults {
    pub model: String,
    pub voice: String,
    pub temperature: f32,
    /// File holding the system instructions. Re-read on each creation so the
    /// text can be edited without restarting the server.
    pub instructions_path: PathBuf,
    /// Soft limit on concurrently active sessions. Exceeding it is logged but
    /// never refused.
    pub max_sessions: usize,
}

pub struct SessionLifecycleManager {
    registry: Arc<SessionRegistry>,
    credentials: Arc<dyn CredentialClient>,
    defaults: SessionDefaults,
}

impl SessionLifecycleManager {
    pub fn new(
        registry: Arc<SessionRegistry>,
        credentials: Arc<dyn CredentialClient>,
        defaults: SessionDefaults,
    ) -> Self {
        Self {
            registry,
            credentials,
            defaults,
        }
    }

    /// Read access to the registry for components that validate sessions.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Mints a credential and registers a new active session.
    pub async fn create_session(&self) -> Result<(SessionId, Value), LifecycleError> {
        let request = self.credential_request().await;
        let provider_data = self.credentials.request_credential(&request).await?;

        let id = SessionId::generate();
        self.registry
            .insert(SessionRecord::new(id.clone(), provider_data.clone()))
            .inspect_err(|e| error!(error = %e, "Failed to register session"))?;

        let active = self.registry.active_count();
        if active > self.defaults.max_sessions {
            warn!(
                active,
                max_sessions = self.defaults.max_sessions,
                "Active sessions exceed the configured soft limit"
            );
        }
        info!(session_id = %id, active, "Session created");
        Ok((id, provider_data))
    }

    /// Marks a session inactive. Closing an already closed session succeeds.
    pub fn close_session(&self, id: &SessionId) -> Result<(), LifecycleError> {
        if self.registry.deactivate(id) {
            info!(session_id = %id, "Session closed");
            Ok(())
        } else {
            Err(LifecycleError::NotFound(id.clone()))
        }
    }

    async fn credential_request(&self) -> CredentialRequest {
        CredentialRequest {
            model: self.defaults.model.clone(),
            voice: self.defaults.voice.clone(),
            temperature: self.defaults.temperature,
            instructions: self.read_instructions().await,
        }
    }

    async fn read_instructions(&self) -> String {
        match tokio::fs::read_to_string(&self.defaults.instructions_path).await {
            Ok(text) => {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    info!("Loaded instructions from file");
                }
                text
            }
            Err(e) => {
                error!(
                    path = %self.defaults.instructions_path.display(),
                    error = %e,
                    "Error reading instructions file"
                );
                String::new()
            }
        }
    }
}
