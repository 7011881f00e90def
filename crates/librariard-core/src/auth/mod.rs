//! Credential storage for library cards.
//!
//! Card PINs live in the OS keychain via `keyring`, keyed by card number,
//! and are attached to the configured accounts just before a refresh.

pub mod credentials;

pub use credentials::CredentialStore;
