//! In-memory Session Registry
//!
//! The registry is the single source of truth for session liveness. It is
//! created once by the composition root and shared as an `Arc` with the
//! lifecycle manager (the only writer) and the relay connections (readers).
//!
//! All operations take the lock for a constant amount of work and never hold
//! it across an `.await`, so relay loops on different connections never
//! contend beyond these short critical sections.

use crate::session::{SessionId, SessionRecord};
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session identifier already registered: {0}")]
    DuplicateIdentifier(SessionId),
}

#[derive(Default)]
struct Sessions {
    records: HashMap<SessionId, SessionRecord>,
    active: usize,
}

/// A concurrency-safe map from session identifier to session record.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<Sessions>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully constructed record.
    ///
    /// Fails with [`RegistryError::DuplicateIdentifier`] if the id is already
    /// present; the existing record is left untouched.
    pub fn insert(&self, record: SessionRecord) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write();
        if sessions.records.contains_key(&record.id) {
            return Err(RegistryError::DuplicateIdentifier(record.id));
        }
        if record.is_active {
            sessions.active += 1;
        }
        sessions.records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Returns a snapshot of the current record, if any.
    pub fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        self.sessions.read().records.get(id).cloned()
    }

    /// Marks a session inactive. Returns whether the id was known.
    ///
    /// Deactivating an already inactive session is not an error.
    pub fn deactivate(&self, id: &SessionId) -> bool {
        let mut guard = self.sessions.write();
        let sessions = &mut *guard;
        let Some(record) = sessions.records.get_mut(id) else {
            return false;
        };
        if record.is_active {
            record.is_active = false;
            sessions.active -= 1;
        }
        true
    }

    /// Total number of records, active or not.
    pub fn len(&self) -> usize {
        self.sessions.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().active
    }
}
