//! Ledger configuration, read from TOML.
//!
//! ```toml
//! domain = "channel-a"
//! store_name = "custody"
//!
//! [storage]
//! path = "custody.db"
//! temporary = false
//!
//! # stores of other domains hosted in the same process
//! [[peers]]
//! domain = "channel-b"
//! store_name = "custody"
//! storage = { path = "channel-b.db" }
//! ```
use super::error::LedgerError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Name of the domain this store lives in.
    pub domain: String,
    /// Name under which this store answers federation queries.
    pub store_name: String,
    pub storage: StorageConfig,
    /// Other domains reachable through federation from this process.
    pub peers: Vec<PeerConfig>,
}

/// `[[peers]]`: a store of another domain, opened alongside the local one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub domain: String,
    #[serde(default = "default_store_name")]
    pub store_name: String,
    pub storage: StorageConfig,
}

/// `[storage]`: where sled keeps its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    /// Delete the database when it is dropped.
    pub temporary: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            domain: "local".into(),
            store_name: default_store_name(),
            storage: StorageConfig::default(),
            peers: Vec::new(),
        }
    }
}

fn default_store_name() -> String {
    "custody".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("custody.db"),
            temporary: false,
        }
    }
}

impl LedgerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read '{}'", path.display()))?;

        Self::from_toml(&content).with_context(|| format!("could not parse '{}'", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl StorageConfig {
    pub fn open_db(&self) -> Result<sled::Db, LedgerError> {
        let db = sled::Config::new()
            .path(&self.path)
            .temporary(self.temporary)
            .open()
            .inspect_err(|e| tracing::error!(path = %self.path.display(), "could not open store: {e}"))?;
        Ok(db)
    }
}
