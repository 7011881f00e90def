use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a checkout across all accounts.
///
/// The same title borrowed on two cards is two checkouts, so the key pairs
/// the owning account with the catalogue item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CheckoutKey {
    pub account_id: String,
    pub metadata_id: String,
}

impl CheckoutKey {
    pub fn new(account_id: impl Into<String>, metadata_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            metadata_id: metadata_id.into(),
        }
    }
}

impl fmt::Display for CheckoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_id, self.metadata_id)
    }
}

/// A checkout as stored in the cache.
///
/// This is the durable form: computation never mutates it and a refresh
/// replaces the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCheckout {
    #[serde(flatten)]
    pub key: CheckoutKey,
    #[serde(default)]
    pub times_renewed: u32,
    /// Calendar date as sent by the library, possibly with a time suffix
    pub due_date: String,
    pub title: String,
    #[serde(default)]
    pub cover_url: Option<String>,
}

impl RawCheckout {
    pub fn account_id(&self) -> &str {
        &self.key.account_id
    }

    pub fn metadata_id(&self) -> &str {
        &self.key.metadata_id
    }
}

/// A checkout with its renewal-adjusted due date and urgency flags.
///
/// Recomputed on every read and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputedCheckout {
    #[serde(flatten)]
    pub raw: RawCheckout,
    pub renews_left: u32,
    /// Local instant the item must be back by, in Unix milliseconds
    pub real_due_ms: i64,
    pub overdue: bool,
    pub due_within_week: bool,
    pub due_within_2wks: bool,
    /// `month/day` of the real due date, e.g. `2/21`
    pub display_date: String,
    /// Extension gained from remaining renewals, e.g. `+6wk`
    pub renew_label: Option<String>,
}

impl ComputedCheckout {
    pub fn title(&self) -> &str {
        &self.raw.title
    }

    /// Overdue or due within the week
    pub fn is_urgent(&self) -> bool {
        self.overdue || self.due_within_week
    }
}
