use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use crate::config::APP_NAME;
use crate::models::Account;

pub struct CredentialStore;

impl CredentialStore {
    /// Store the PIN for a card number in the OS keychain
    pub fn store_pin(card_number: &str, pin: &str) -> Result<()> {
        let entry = Entry::new(APP_NAME, card_number)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(pin)
            .context("Failed to store PIN in keychain")?;
        Ok(())
    }

    /// Retrieve the PIN for a card number from the OS keychain
    pub fn get_pin(card_number: &str) -> Result<String> {
        let entry = Entry::new(APP_NAME, card_number)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve PIN from keychain")
    }

    /// Delete the stored PIN for a card number
    pub fn delete_pin(card_number: &str) -> Result<()> {
        let entry = Entry::new(APP_NAME, card_number)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete PIN from keychain")?;
        Ok(())
    }

    /// Fill in each account's PIN from the keychain.
    ///
    /// Accounts without a stored PIN are kept with an empty one; the library
    /// will reject the login and the refresh reports it.
    pub fn attach_pins(accounts: &[Account]) -> Vec<Account> {
        accounts
            .iter()
            .map(|account| match Self::get_pin(&account.card_number) {
                Ok(pin) => account.clone().with_pin(pin),
                Err(e) => {
                    warn!(account = %account.account_id, error = %e, "No PIN stored for card");
                    account.clone()
                }
            })
            .collect()
    }
}
