use serde::{Deserialize, Serialize};

/// A library membership whose checkouts are tracked.
///
/// Only `account_id` matters to the cache; the card number and PIN are
/// handed to the checkout source when logging in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub card_number: String,
    // Never written to the config file; filled in from the keychain
    #[serde(skip)]
    pub pin: String,
}

impl Account {
    pub fn new(account_id: impl Into<String>, card_number: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            display_name: None,
            card_number: card_number.into(),
            pin: String::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = pin.into();
        self
    }

    /// Name shown in status messages, falling back to the account id
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.account_id)
    }
}
