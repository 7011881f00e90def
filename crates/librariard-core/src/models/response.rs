//! Gateway response shape relayed by the checkout proxy.
//!
//! Only the fields the cache needs are modelled. The checkout and bib
//! collections are kept as raw JSON and decoded one entry at a time, so a
//! single bad entry never fails the whole account. Entries come out in the
//! order the gateway sent them.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{Account, CheckoutKey, RawCheckout};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutsResponse {
    #[serde(default)]
    pub entities: Option<Entities>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entities {
    /// Checkouts keyed by the gateway's internal checkout id
    #[serde(default)]
    pub checkouts: Option<Map<String, Value>>,
    /// Bibliographic records keyed by metadata id
    #[serde(default)]
    pub bibs: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutEntry {
    #[serde(rename = "metadataId")]
    pub metadata_id: Option<String>,
    #[serde(rename = "timesRenewed", default)]
    pub times_renewed: Option<u32>,
    #[serde(rename = "dueDate")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BibEntry {
    #[serde(rename = "briefInfo")]
    pub brief_info: Option<BriefInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BriefInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub jacket: Option<Jacket>,
    // Older proxy builds flattened the jacket into a single URL
    #[serde(default)]
    pub cover: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Jacket {
    pub medium: Option<String>,
    pub small: Option<String>,
    pub large: Option<String>,
}

impl BriefInfo {
    fn cover_url(&self) -> Option<String> {
        self.jacket
            .as_ref()
            .and_then(|j| {
                j.medium
                    .clone()
                    .or_else(|| j.large.clone())
                    .or_else(|| j.small.clone())
            })
            .or_else(|| self.cover.clone())
            .filter(|url| !url.is_empty())
    }
}

/// A single checkout entry that could not be turned into a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedResponse {
    #[error("checkout {checkout_id} is missing {field}")]
    MissingField {
        checkout_id: String,
        field: &'static str,
    },

    #[error("checkout {checkout_id} references unknown bib {metadata_id}")]
    MissingBib {
        checkout_id: String,
        metadata_id: String,
    },

    #[error("checkout {checkout_id} could not be read: {reason}")]
    Invalid { checkout_id: String, reason: String },
}

/// Records extracted from one account's response, plus the entries skipped.
#[derive(Debug, Default)]
pub struct Extracted {
    pub records: Vec<RawCheckout>,
    pub skipped: Vec<MalformedResponse>,
}

impl CheckoutsResponse {
    /// Convert the response into raw records owned by `account`.
    ///
    /// A response without a checkout collection yields no records. Entries
    /// with missing fields or no matching bib are skipped and reported.
    pub fn extract(self, account: &Account) -> Extracted {
        let mut out = Extracted::default();

        let Some(entities) = self.entities else {
            return out;
        };
        let Some(checkouts) = entities.checkouts else {
            return out;
        };

        for (checkout_id, entry) in checkouts {
            match Self::extract_one(&entities.bibs, account, &checkout_id, &entry) {
                Ok(rec) => out.records.push(rec),
                Err(e) => out.skipped.push(e),
            }
        }

        out
    }

    fn extract_one(
        bibs: &Map<String, Value>,
        account: &Account,
        checkout_id: &str,
        entry: &Value,
    ) -> Result<RawCheckout, MalformedResponse> {
        let missing = |field| MalformedResponse::MissingField {
            checkout_id: checkout_id.to_string(),
            field,
        };
        let invalid = |e: serde_json::Error| MalformedResponse::Invalid {
            checkout_id: checkout_id.to_string(),
            reason: e.to_string(),
        };

        let entry = CheckoutEntry::deserialize(entry).map_err(invalid)?;

        let metadata_id = entry.metadata_id.ok_or_else(|| missing("metadataId"))?;
        let due_date = entry.due_date.ok_or_else(|| missing("dueDate"))?;

        let bib = match bibs.get(&metadata_id) {
            Some(value) => Some(BibEntry::deserialize(value).map_err(invalid)?),
            None => None,
        };
        let info = bib
            .and_then(|bib| bib.brief_info)
            .ok_or_else(|| MalformedResponse::MissingBib {
                checkout_id: checkout_id.to_string(),
                metadata_id: metadata_id.clone(),
            })?;
        let title = info.title.clone().ok_or_else(|| missing("title"))?;

        Ok(RawCheckout {
            key: CheckoutKey::new(account.account_id.clone(), metadata_id),
            times_renewed: entry.times_renewed.unwrap_or(0),
            due_date,
            title,
            cover_url: info.cover_url(),
        })
    }
}
