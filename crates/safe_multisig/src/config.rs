//! Persistent settings, stored as JSON under `~/.safe-tx/config.json`.
//!
//! Keys are never written here.

use alloy_primitives::Address;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use std::{
    fs,
    io::BufReader,
    path::{Path, PathBuf},
};

use crate::{
    consts::get_transaction_service_url,
    error::{Result, SafeError},
};

pub const DEFAULT_ROOT_DIR: &str = ".safe-tx";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

/// A validated [`SafeConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub safe_address: Address,
    pub chain_id: u64,
    pub tx_service_url: String,
    pub rpc_url: Url,
}

impl SafeConfig {
    /// `~/.safe-tx`, or `./.safe-tx` without a home directory.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(DEFAULT_ROOT_DIR)
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join(CONFIG_FILE)
    }

    /// Loads `path`, or an empty config if it does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(?path, "no config file, using defaults");
            return Ok(Self::default());
        }
        load_from_json_file(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SafeError::configuration(format!("Failed to create {parent:?}: {e}"))
            })?;
        }
        write_to_json_file(path, self)
    }

    /// Values set in `overrides` win.
    pub fn merge(self, overrides: SafeConfig) -> Self {
        Self {
            tx_service_url: overrides.tx_service_url.or(self.tx_service_url),
            rpc_url: overrides.rpc_url.or(self.rpc_url),
            safe_address: overrides.safe_address.or(self.safe_address),
            chain_id: overrides.chain_id.or(self.chain_id),
        }
    }

    /// Checks that everything needed to talk to the Safe is present and well formed.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let safe_address = self
            .safe_address
            .ok_or_else(|| SafeError::configuration("safe address is not set"))?;
        if safe_address == Address::ZERO {
            return Err(SafeError::configuration("safe address must not be the zero address"));
        }
        let chain_id = self.chain_id.ok_or_else(|| SafeError::configuration("chain id is not set"))?;

        let tx_service_url = match &self.tx_service_url {
            Some(url) => url.clone(),
            None => get_transaction_service_url(chain_id)?,
        };

        let rpc_url = self.rpc_url.as_deref().ok_or_else(|| SafeError::configuration("rpc url is not set"))?;
        let rpc_url = Url::parse(rpc_url)
            .map_err(|e| SafeError::configuration(format!("invalid rpc url {rpc_url:?}: {e}")))?;

        Ok(ResolvedConfig { safe_address, chain_id, tx_service_url, rpc_url })
    }
}

/// Write an object to a JSON file.
pub fn write_to_json_file<P: AsRef<Path>, S: Serialize>(path: P, contents: &S) -> Result<()> {
    let file = fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(&path)
        .map_err(|e| SafeError::configuration(format!("Failed to open {:?}: {e}", path.as_ref())))?;
    serde_json::to_writer_pretty(file, contents).map_err(|e| {
        SafeError::configuration(format!("Failed to write JSON to {:?}: {e}", path.as_ref()))
    })
}

/// Load an object from a JSON file.
pub fn load_from_json_file<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T> {
    let file = fs::File::open(&path)
        .map_err(|e| SafeError::configuration(format!("Failed to open {:?}: {e}", path.as_ref())))?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|e| {
        SafeError::configuration(format!("Failed to read JSON from {:?}: {e}", path.as_ref()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn full() -> SafeConfig {
        SafeConfig {
            tx_service_url: None,
            rpc_url: Some("http://localhost:8545".into()),
            safe_address: Some(address!("5AFE3855358E112B5647B952709E6165E1C1EEEe")),
            chain_id: Some(11155111),
        }
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        assert_eq!(SafeConfig::load(&path).unwrap(), SafeConfig::default());

        full().save(&path).unwrap();
        assert_eq!(SafeConfig::load(&path).unwrap(), full());

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("safeAddress"));
        assert!(raw.contains("rpcUrl"));
        assert!(!raw.contains("txServiceUrl"));
    }

    #[test]
    fn corrupt_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(SafeConfig::load(&path), Err(SafeError::Configuration(_))));
    }

    #[test]
    fn overrides_win() {
        let merged = full().merge(SafeConfig { chain_id: Some(1), ..Default::default() });
        assert_eq!(merged.chain_id, Some(1));
        assert_eq!(merged.rpc_url, full().rpc_url);
    }

    #[test]
    fn resolve_fills_the_service_url_from_the_chain() {
        let resolved = full().resolve().unwrap();
        assert_eq!(resolved.tx_service_url, "https://safe-transaction-sepolia.safe.global/api");
        assert_eq!(resolved.rpc_url.as_str(), "http://localhost:8545/");
    }

    #[test]
    fn resolve_fails_fast() {
        let missing_safe = SafeConfig { safe_address: None, ..full() };
        let zero_safe = SafeConfig { safe_address: Some(Address::ZERO), ..full() };
        let bad_rpc = SafeConfig { rpc_url: Some("not a url".into()), ..full() };
        let unknown_chain = SafeConfig { chain_id: Some(31337), ..full() };

        for config in [missing_safe, zero_safe, bad_rpc, unknown_chain] {
            assert!(matches!(config.resolve(), Err(SafeError::Configuration(_))), "{config:?}");
        }

        let custom = SafeConfig {
            chain_id: Some(31337),
            tx_service_url: Some("http://localhost:8000/api".into()),
            ..full()
        };
        assert!(custom.resolve().is_ok());
    }
}
