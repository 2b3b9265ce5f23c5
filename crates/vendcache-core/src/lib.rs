//! Core library for the vendcache client.
//!
//! vendcache keeps a remote-backed commerce account usable across restarts
//! and identity changes. It owns the session lifecycle (login, logout,
//! restore from disk), mirrors the session into local storage so the app
//! starts signed in, and serves account data through a tagged cache that is
//! swept atomically whenever the signed-in identity changes.
//!
//! Consumers hold a [`VendClient`] and read through its accessors; the
//! coupling between session transitions, the bearer token and cached data
//! is handled inside. See [`client`] for the wiring rules.

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError, DEFAULT_API_BASE_URL};
pub use auth::{
    AuthError, CredentialStore, SelectedEntity, Session, SessionEvent, SessionPhase,
    SessionSnapshot, SessionStore,
};
pub use cache::{CacheRegistry, CacheTag, TagStatus};
pub use client::{SyncReport, VendClient};
pub use config::Config;
