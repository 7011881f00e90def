//! Fetching checkouts from the library.
//!
//! Logging in to the library is slow and stateful, so it happens behind a
//! proxy service that takes a card's credentials and returns the gateway's
//! raw checkout JSON. `CheckoutSource` is the seam the sync engine talks
//! to; `ProxyClient` is the HTTP implementation.

pub mod error;
pub mod proxy;

use async_trait::async_trait;

use crate::models::{Account, CheckoutsResponse};

pub use error::SourceError;
pub use proxy::ProxyClient;

#[async_trait]
pub trait CheckoutSource: Send + Sync {
    /// Log in as `account` and return its current checkouts.
    ///
    /// Implementations share one login session across accounts, so callers
    /// must not run two fetches at once.
    async fn fetch_checkouts(&self, account: &Account) -> Result<CheckoutsResponse, SourceError>;
}
