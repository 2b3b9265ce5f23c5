//! REST API client module for the Vendora marketplace backend.
//!
//! This module provides the `ApiClient` for the account endpoints
//! (login, logout, register, password and email flows) and for fetching
//! every cached resource category.
//!
//! Authentication uses a bearer token issued by `POST /users/login`. The
//! token slot on the client is written only by the session-transition
//! listener, never by the endpoints themselves.

pub mod client;
pub mod error;

pub use client::{ApiClient, LoginResponse, DEFAULT_API_BASE_URL};
pub use error::ApiError;
