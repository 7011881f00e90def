//! Local caching of checkouts for instant display.
//!
//! This module provides the `CacheStore`, which keeps raw checkout records
//! and a small metadata map in one JSON snapshot, and the staleness policy
//! that decides when the snapshot must be refreshed. Cached data is
//! considered fresh until the local calendar day changes.

pub mod error;
pub mod staleness;
pub mod store;

pub use error::CacheError;
pub use staleness::is_fresh;
pub use store::{age_display, CacheStore, LAST_FETCHED_KEY, SCHEMA_VERSION};
