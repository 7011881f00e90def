//! Data models for library checkouts.
//!
//! This module contains the data structures shared by the cache, the
//! due-date calculator and the sync engine:
//!
//! - `Account`: One library card the user has registered
//! - `CheckoutKey`, `RawCheckout`: The persisted, un-derived checkout record
//! - `ComputedCheckout`: A checkout with renewal-adjusted due date and urgency
//! - `CheckoutsResponse`: The gateway JSON relayed by the checkout proxy

pub mod account;
pub mod checkout;
pub mod response;

pub use account::Account;
pub use checkout::{CheckoutKey, ComputedCheckout, RawCheckout};
pub use response::{CheckoutsResponse, Extracted, MalformedResponse};
