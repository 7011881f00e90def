//! HTTP client for the checkout proxy.
//!
//! The proxy logs in to the library with a card number and PIN, then relays
//! the gateway's checkout listing for the given account id.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{CheckoutSource, SourceError};
use crate::models::{Account, CheckoutsResponse};

/// HTTP request timeout in seconds.
/// The proxy performs a full library login per call, so allow it time.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Body the proxy sends when its own request to the library failed
#[derive(Debug, Deserialize)]
struct ProxyErrorBody {
    error: String,
}

/// Proxy client. Clone is cheap - reqwest::Client uses Arc internally.
#[derive(Clone)]
pub struct ProxyClient {
    client: Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Turn a proxy reply into checkouts or an account-level error.
    fn interpret(status: StatusCode, body: &str) -> Result<CheckoutsResponse, SourceError> {
        if !status.is_success() {
            return Err(SourceError::from_status(status, body));
        }

        if let Ok(ProxyErrorBody { error }) = serde_json::from_str::<ProxyErrorBody>(body) {
            return Err(SourceError::Transport(error));
        }

        serde_json::from_str(body)
            .map_err(|e| SourceError::Transport(format!("Undecodable checkout response: {}", e)))
    }
}

#[async_trait]
impl CheckoutSource for ProxyClient {
    async fn fetch_checkouts(&self, account: &Account) -> Result<CheckoutsResponse, SourceError> {
        let url = format!("{}/checkouts", self.base_url);
        debug!(account = %account.account_id, "Fetching checkouts via proxy");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("name", account.card_number.as_str()),
                ("user_pin", account.pin.as_str()),
                ("accountId", account.account_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Self::interpret(status, &body)
    }
}
