//! Session lifecycle core for the realtime relay.
//!
//! This crate owns the in-memory session state and the upstream credential
//! client. It has no knowledge of HTTP or WebSockets; the `relay-api` service
//! drives it from its handlers and relay connections.

pub mod credential;
pub mod lifecycle;
pub mod registry;
pub mod session;

pub use credential::{CredentialClient, CredentialError, CredentialRequest, OpenAICredentialClient};
pub use lifecycle::{LifecycleError, SessionDefaults, SessionLifecycleManager};
pub use registry::{RegistryError, SessionRegistry};
pub use session::{SessionId, SessionRecord};
