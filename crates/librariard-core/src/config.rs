//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the checkout proxy URL and the registered library cards.
//! PINs are not stored here; see `auth::CredentialStore`.
//!
//! Configuration is stored at `~/.config/librariard/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::Account;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "librariard";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the proxy URL
pub const BACKEND_URL_ENV: &str = "LIBRARIARD_BACKEND_URL";

/// Proxy URL when neither the environment nor the config names one
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub backend_url: Option<String>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Proxy URL: environment first, then config, then the local default.
    pub fn backend_url(&self) -> String {
        Self::resolve_backend_url(std::env::var(BACKEND_URL_ENV).ok(), self.backend_url.as_deref())
    }

    fn resolve_backend_url(from_env: Option<String>, from_config: Option<&str>) -> String {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| from_config.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    }

    pub fn find_account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.account_id == account_id)
    }

    /// Register a card. Account ids must be unique since they key the cache.
    pub fn add_account(&mut self, account: Account) -> Result<()> {
        if let Some(existing) = self.find_account(&account.account_id) {
            bail!(
                "Account {} is already registered as {}",
                account.account_id,
                existing.label()
            );
        }
        self.accounts.push(account);
        Ok(())
    }
}
