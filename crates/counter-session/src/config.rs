//! Session configuration with validation.
//!
//! Loaded from environment variables or a TOML file with the same keys.
//!
//! | Key | Env | Default |
//! |-----|-----|---------|
//! | `contract_address` | `COUNTER_CONTRACT_ADDRESS` | required |
//! | `abi_path` | `COUNTER_ABI_PATH` | bundled counter ABI |
//! | `rpc_url` | `COUNTER_RPC_URL` | `http://127.0.0.1:8545` |
//! | `confirmation_poll_interval_ms` | `COUNTER_POLL_INTERVAL_MS` | 1000 |
//! | `confirmation_timeout_ms` | `COUNTER_CONFIRMATION_TIMEOUT_MS` | 120000 (`0` waits forever) |
//! | `request_timeout_ms` | `COUNTER_REQUEST_TIMEOUT_MS` | 10000 |
//! | `expected_chain_id` | `COUNTER_CHAIN_ID` | unset |

use crate::domain::abi::ContractAbi;
use crate::domain::value_objects::Address;
use crate::errors::ConfigError;
use crate::executor::ExecutorSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default local node endpoint (Hardhat / Anvil).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deployed counter address (checksummed or single-case hex).
    pub contract_address: Option<String>,
    /// JSON ABI document; the bundled counter ABI when unset.
    pub abi_path: Option<PathBuf>,
    /// Node endpoint for the HTTP provider.
    pub rpc_url: String,
    /// Delay between receipt polls.
    pub confirmation_poll_interval_ms: u64,
    /// Confirmation wait bound; `0` or unset waits indefinitely.
    pub confirmation_timeout_ms: Option<u64>,
    /// Per-request HTTP timeout.
    pub request_timeout_ms: u64,
    /// Chain the wallet must be on.
    pub expected_chain_id: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            contract_address: None,
            abi_path: None,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            confirmation_poll_interval_ms: 1000,
            confirmation_timeout_ms: Some(120_000),
            request_timeout_ms: 10_000,
            expected_chain_id: None,
        }
    }
}

impl SessionConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, starting from defaults.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(address) = lookup("COUNTER_CONTRACT_ADDRESS") {
            config.contract_address = Some(address.trim().to_string());
        }
        if let Some(path) = lookup("COUNTER_ABI_PATH") {
            config.abi_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("COUNTER_RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(raw) = lookup("COUNTER_POLL_INTERVAL_MS") {
            config.confirmation_poll_interval_ms = parse_number("COUNTER_POLL_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("COUNTER_CONFIRMATION_TIMEOUT_MS") {
            config.confirmation_timeout_ms =
                Some(parse_number("COUNTER_CONFIRMATION_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = lookup("COUNTER_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_number("COUNTER_REQUEST_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("COUNTER_CHAIN_ID") {
            config.expected_chain_id = Some(parse_number("COUNTER_CHAIN_ID", &raw)?);
        }
        Ok(config)
    }

    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.contract_address()?;

        if self.confirmation_poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "confirmation_poll_interval_ms",
                value: "0".into(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_ms",
                value: "0".into(),
            });
        }
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "rpc_url",
                value: self.rpc_url.clone(),
            });
        }
        Ok(())
    }

    /// Parsed contract address. A mixed-case value must carry a valid
    /// EIP-55 checksum.
    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        let value = self
            .contract_address
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingContractAddress)?;
        Address::from_str(value).map_err(|source| ConfigError::InvalidContractAddress {
            value: value.to_string(),
            source,
        })
    }

    /// Loads the interface descriptor.
    pub fn load_abi(&self) -> Result<ContractAbi, ConfigError> {
        match &self.abi_path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Ok(ContractAbi::from_json(&text)?)
            }
            None => Ok(ContractAbi::counter()?),
        }
    }

    /// Receipt poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_interval_ms)
    }

    /// Confirmation bound, `None` when disabled.
    #[must_use]
    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// HTTP request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Executor bounds derived from this configuration.
    #[must_use]
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            poll_interval: self.poll_interval(),
            confirmation_timeout: self.confirmation_timeout(),
        }
    }
}

fn parse_number(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
