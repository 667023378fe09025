//! Session identifiers and records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier handed to clients when a session is created.
///
/// Freshly issued ids are random v4 UUIDs, but any string may be looked up,
/// since the relay receives whatever the client put in the connection path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new collision-resistant identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A server-tracked session backed by an upstream credential.
///
/// `provider_data` is whatever the provider returned when the credential was
/// minted. It is passed through to the client untouched.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub provider_data: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Builds an active record for a freshly minted credential.
    pub fn new(id: SessionId, provider_data: Value) -> Self {
        Self {
            id,
            provider_data,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
