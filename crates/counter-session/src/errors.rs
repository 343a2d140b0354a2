//! # Error Types
//!
//! | Error | Recoverable | Typical cause |
//! |-------|-------------|---------------|
//! | `NoProvider` | no | no wallet installed |
//! | `UserRejected` | yes | prompt declined |
//! | `ContractNotDeployed` | no | wrong network or bad address |
//! | `WrongNetwork` | no | wallet on another chain |
//! | `Reverted` | yes | on-chain rejection (e.g. non-owner reset) |
//! | `Network` | yes | RPC/connectivity, confirmation timeout |
//! | `ReadFailure` | yes | one refresh read failed |

use crate::domain::abi::{decode_revert_reason, AbiError};
use crate::domain::entities::MutationKind;
use crate::domain::value_objects::{Address, Bytes, HexError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// PROVIDER ERRORS (EIP-1193 / EIP-1474)
// =============================================================================

/// Provider and JSON-RPC error codes.
pub mod codes {
    /// EIP-1193: the user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// EIP-1193: the requested account/method is not authorized.
    pub const UNAUTHORIZED: i64 = 4100;
    /// EIP-1193: the provider does not support the method.
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    /// EIP-1193: the provider is disconnected from all chains.
    pub const DISCONNECTED: i64 = 4900;
    /// EIP-1193: the provider is not connected to the requested chain.
    pub const CHAIN_DISCONNECTED: i64 = 4901;

    /// Geth/Hardhat: execution reverted with data.
    pub const EXECUTION_REVERTED: i64 = 3;

    /// JSON-RPC 2.0 standard errors.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Generic server error (EIP-1474).
    pub const SERVER_ERROR: i64 = -32000;
}

/// Error object returned by `request()`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("provider error {code}: {message}")]
pub struct ProviderRpcError {
    /// Numeric code.
    pub code: i64,
    /// Provider message.
    pub message: String,
    /// Optional payload (revert data for execution errors).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProviderRpcError {
    /// Creates an error without data.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// 4001: user rejected the request.
    pub fn user_rejected() -> Self {
        Self::new(codes::USER_REJECTED, "User rejected the request.")
    }

    /// 4200: method not supported.
    pub fn unsupported_method(method: &str) -> Self {
        Self::new(
            codes::UNSUPPORTED_METHOD,
            format!("Method not supported: {method}"),
        )
    }

    /// 4900: provider disconnected.
    pub fn disconnected(details: impl Into<String>) -> Self {
        Self::new(codes::DISCONNECTED, details)
    }

    /// -32602: malformed parameters.
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, format!("Invalid params: {}", details.into()))
    }

    /// -32603: internal error.
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, format!("Internal error: {}", details.into()))
    }

    /// 3: execution reverted, carrying the raw revert payload.
    pub fn execution_reverted(revert_data: &[u8]) -> Self {
        let message = match decode_revert_reason(revert_data) {
            Some(reason) => format!("execution reverted: {reason}"),
            None => "execution reverted".to_string(),
        };
        Self {
            code: codes::EXECUTION_REVERTED,
            message,
            data: Some(serde_json::Value::String(Bytes::from(revert_data).to_string())),
        }
    }

    /// The user declined a prompt or the account is not authorized.
    #[must_use]
    pub fn is_user_rejection(&self) -> bool {
        matches!(self.code, codes::USER_REJECTED | codes::UNAUTHORIZED)
    }

    /// The method is not implemented by this provider.
    #[must_use]
    pub fn is_unsupported_method(&self) -> bool {
        matches!(
            self.code,
            codes::UNSUPPORTED_METHOD | codes::METHOD_NOT_FOUND
        )
    }

    /// The chain rejected the call during execution.
    #[must_use]
    pub fn is_revert(&self) -> bool {
        self.code == codes::EXECUTION_REVERTED
            || (matches!(self.code, codes::SERVER_ERROR | codes::INTERNAL_ERROR)
                && self.message.to_ascii_lowercase().contains("revert"))
    }

    /// Raw revert payload from `data` (`"0x.."` or `{"data": "0x.."}`).
    #[must_use]
    pub fn revert_data(&self) -> Option<Bytes> {
        let value = self.data.as_ref()?;
        let hex = match value {
            serde_json::Value::String(s) => s.as_str(),
            serde_json::Value::Object(map) => map.get("data")?.as_str()?,
            _ => return None,
        };
        hex.parse().ok()
    }

    /// Best available revert reason: decoded payload, else the message.
    #[must_use]
    pub fn revert_reason(&self) -> String {
        self.revert_data()
            .and_then(|data| decode_revert_reason(data.as_slice()))
            .unwrap_or_else(|| {
                self.message
                    .strip_prefix("execution reverted: ")
                    .unwrap_or(&self.message)
                    .to_string()
            })
    }
}

// =============================================================================
// SESSION ERRORS
// =============================================================================

/// Error class, kept alongside the message in session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No injected provider.
    NoProvider,
    /// Prompt or signature declined.
    UserRejected,
    /// No code at the contract address.
    ContractNotDeployed,
    /// Wallet on an unexpected chain.
    WrongNetwork,
    /// On-chain rejection.
    Reverted,
    /// RPC or connectivity failure.
    Network,
    /// A single refresh read failed.
    ReadFailure,
    /// Mutation attempted without a wallet.
    NotConnected,
    /// Mutation attempted while another is in flight.
    TransactionPending,
    /// Owner-only action attempted by a non-owner.
    OwnerOnly,
    /// Interface descriptor cannot serve the call.
    Interface,
}

/// Errors surfaced by the session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No wallet provider was injected.
    #[error("no wallet provider detected; install a wallet")]
    NoProvider,

    /// The user declined the prompt or the signature.
    #[error("request rejected in wallet")]
    UserRejected,

    /// `eth_getCode` returned empty bytecode.
    #[error("contract is not deployed on this network: {address}")]
    ContractNotDeployed {
        /// Probed address.
        address: Address,
    },

    /// The wallet is on a different chain than configured.
    #[error("wrong network: expected chain {expected}, wallet is on chain {actual}")]
    WrongNetwork {
        /// Configured chain id.
        expected: u64,
        /// Wallet chain id.
        actual: u64,
    },

    /// The chain rejected the state transition.
    #[error("transaction reverted: {reason}")]
    Reverted {
        /// Decoded reason.
        reason: String,
    },

    /// RPC or connectivity failure.
    #[error("network error: {0}")]
    Network(String),

    /// One field of a refresh could not be read.
    #[error("failed to read {field}: {reason}")]
    ReadFailure {
        /// `"counter"` or `"owner"`.
        field: &'static str,
        /// Underlying failure.
        reason: String,
    },

    /// Mutation without a connected wallet.
    #[error("connect a wallet first")]
    NotConnected,

    /// Mutation while another one is pending.
    #[error("a transaction is already pending ({0})")]
    TransactionPending(MutationKind),

    /// Owner-only mutation from a non-owner account.
    #[error("owner only")]
    OwnerOnly,

    /// The interface descriptor cannot encode or decode the call.
    #[error("interface error: {0}")]
    Abi(#[from] AbiError),
}

impl SessionError {
    /// Classifies a provider error.
    #[must_use]
    pub fn from_provider(error: ProviderRpcError) -> Self {
        if error.is_user_rejection() {
            Self::UserRejected
        } else if error.is_revert() {
            Self::Reverted {
                reason: error.revert_reason(),
            }
        } else {
            Self::Network(error.to_string())
        }
    }

    /// Malformed provider response.
    pub fn malformed(what: &str, details: impl fmt::Display) -> Self {
        Self::Network(format!("malformed {what}: {details}"))
    }

    /// Line stored in session state for display.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Error class.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoProvider => ErrorKind::NoProvider,
            Self::UserRejected => ErrorKind::UserRejected,
            Self::ContractNotDeployed { .. } => ErrorKind::ContractNotDeployed,
            Self::WrongNetwork { .. } => ErrorKind::WrongNetwork,
            Self::Reverted { .. } => ErrorKind::Reverted,
            Self::Network(_) => ErrorKind::Network,
            Self::ReadFailure { .. } => ErrorKind::ReadFailure,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::TransactionPending(_) => ErrorKind::TransactionPending,
            Self::OwnerOnly => ErrorKind::OwnerOnly,
            Self::Abi(_) => ErrorKind::Interface,
        }
    }

    /// Rejected by a local guard before anything reached the provider.
    #[must_use]
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::TransactionPending(_) | Self::OwnerOnly
        )
    }

    /// Whether retrying later (as a new user action) can succeed without
    /// fixing configuration or installing a wallet.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::NoProvider
                | Self::ContractNotDeployed { .. }
                | Self::WrongNetwork { .. }
                | Self::Abi(_)
        )
    }
}

impl From<ProviderRpcError> for SessionError {
    fn from(error: ProviderRpcError) -> Self {
        Self::from_provider(error)
    }
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

/// Configuration failures, fatal at start-up.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No contract address configured.
    #[error("contract address is not set (COUNTER_CONTRACT_ADDRESS)")]
    MissingContractAddress,

    /// The contract address does not parse.
    #[error("invalid contract address {value}: {source}")]
    InvalidContractAddress {
        /// Configured text.
        value: String,
        /// Parse failure.
        source: HexError,
    },

    /// A numeric or enumerated value is out of range.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Setting name.
        key: &'static str,
        /// Offending value.
        value: String,
    },

    /// A file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// I/O failure.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML.
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The ABI document is unusable.
    #[error("invalid interface descriptor: {0}")]
    Abi(#[from] AbiError),
}

// =============================================================================
// TESTS
// =============================================================================
