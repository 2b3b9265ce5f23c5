//! In-memory response cache keyed by resource tag.
//!
//! This module provides:
//! - `CacheTag`: the enumerated resource categories
//! - `CacheRegistry`: tagged entries with freshness flags and a generation
//!   fence for in-flight fetches
//!
//! Entries have no TTL; they are dropped by tag invalidation, which the
//! session-transition listener triggers for every tag on login and logout.

pub mod registry;
pub mod tag;

pub use registry::{CacheEntry, CacheRegistry, FetchTicket, TagStatus};
pub use tag::CacheTag;
