//! Authentication module: session state, persistence and credentials.
//!
//! This module provides:
//! - `SessionStore`: the state machine owning the current session
//! - `PersistedSessionRepository`: the session's durable mirror
//! - `SessionEvent` / transition listeners: how the rest of the client
//!   learns that identity changed
//! - `CredentialStore`: remembered logins via the OS keychain
//!
//! Sessions survive restarts through a two-key storage schema (record plus
//! id marker); a record whose marker does not match is discarded at
//! bootstrap.

pub mod credentials;
pub mod error;
pub mod events;
pub mod repository;
pub mod session;
pub mod store;

pub use credentials::CredentialStore;
pub use error::AuthError;
pub use events::SessionEvent;
pub use repository::PersistedSessionRepository;
pub use session::{PersistedSessionRecord, SelectedEntity, Session, SessionId, SessionSnapshot};
pub use store::{SessionPhase, SessionStore};
