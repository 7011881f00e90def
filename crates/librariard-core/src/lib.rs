//! Librariard core - checkouts across several library cards.
//!
//! Fetching checkouts means a slow login per card, so this crate keeps a
//! local cache that is shown instantly and refreshed at most once a day:
//!
//! - `models`: accounts, raw and computed checkouts, gateway response shape
//! - `due_date`: renewal-adjusted due dates and urgency bands
//! - `cache`: the persistent checkout store and its staleness policy
//! - `assemble`: merging every account into one due-date ordered view
//! - `source`: the `CheckoutSource` seam and its HTTP proxy client
//! - `sync`: the stale-while-revalidate `SyncEngine`
//! - `config`, `auth`: where accounts and PINs are kept

pub mod assemble;
pub mod auth;
pub mod cache;
pub mod config;
pub mod due_date;
pub mod models;
pub mod source;
pub mod sync;

pub use assemble::assemble;
pub use cache::CacheStore;
pub use config::Config;
pub use models::{Account, CheckoutKey, ComputedCheckout, RawCheckout};
pub use source::{CheckoutSource, ProxyClient};
pub use sync::{SyncEngine, SyncError, SyncEvent, SyncStatus};
