//! Configuration for the wallet tracker

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::explorer::DEFAULT_PAGE_SIZE;
use crate::wallet::sync::SyncConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub explorer: ExplorerConfig,
    pub sync: SyncSettings,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Spacing between explorer page requests
    pub page_interval_secs: u64,
    /// Spacing between consecutive addresses in a pass
    pub address_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://blockchain.info".to_string(),
            request_timeout_secs: 30,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_interval_secs: 15,
            address_interval_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "./data.db".into(),
            pool_size: 4,
            busy_timeout_ms: 5_000,
        }
    }
}

impl ExplorerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.explorer.base_url.trim().is_empty() {
            bail!("explorer.base_url cannot be empty");
        }
        if self.explorer.request_timeout_secs == 0 {
            bail!("explorer.request_timeout_secs must be greater than 0");
        }
        if self.explorer.page_size == 0 {
            bail!("explorer.page_size must be greater than 0");
        }
        if self.storage.database_path.as_os_str().is_empty() {
            bail!("storage.database_path cannot be empty");
        }
        if self.storage.pool_size == 0 {
            bail!("storage.pool_size must be greater than 0");
        }
        if self.storage.busy_timeout_ms == 0 {
            bail!("storage.busy_timeout_ms must be greater than 0");
        }
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            page_size: self.explorer.page_size,
            page_interval: Duration::from_secs(self.sync.page_interval_secs),
            address_interval: Duration::from_secs(self.sync.address_interval_secs),
        }
    }
}
