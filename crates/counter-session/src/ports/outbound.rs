//! # Driven Ports (SPI - Outbound)
//!
//! The session depends on a single capability: an EIP-1193 style
//! `request(method, params)` entry point. Injected wallets, HTTP nodes and
//! the in-memory chain all implement [`Eip1193Provider`].

use crate::domain::entities::ProviderEvent;
use crate::domain::value_objects::{parse_quantity, Address, Bytes, TxHash};
use crate::errors::ProviderRpcError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

// =============================================================================
// METHOD NAMES
// =============================================================================

/// JSON-RPC methods issued by the session.
pub mod methods {
    /// Prompts for account access.
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    /// Lists already-authorized accounts without prompting.
    pub const ACCOUNTS: &str = "eth_accounts";
    /// Current chain id.
    pub const CHAIN_ID: &str = "eth_chainId";
    /// Deployed bytecode at an address.
    pub const GET_CODE: &str = "eth_getCode";
    /// Read-only call.
    pub const CALL: &str = "eth_call";
    /// Signs and broadcasts a transaction.
    pub const SEND_TRANSACTION: &str = "eth_sendTransaction";
    /// Inclusion receipt, `null` while pending.
    pub const GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
}

// =============================================================================
// PROVIDER
// =============================================================================

/// An EIP-1193 provider.
///
/// ## Implementation Notes
///
/// - `request` must be safe to call concurrently
/// - Errors carry the provider's numeric code (4001 rejection, 3 revert, ...)
/// - Providers without a push channel keep the default `subscribe`
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    /// Issues one request.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;

    /// Subscribes to `accountsChanged` / `chainChanged` / `disconnect`.
    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        None
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Call/transaction object for `eth_call` and `eth_sendTransaction`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Sender; omitted for anonymous reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Contract address.
    pub to: Address,
    /// ABI-encoded calldata.
    pub data: Bytes,
}

/// The subset of a receipt the session inspects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Hash of the included transaction.
    pub transaction_hash: TxHash,
    /// Inclusion block as a hex quantity.
    #[serde(default)]
    pub block_number: Option<String>,
    /// `"0x1"` success, `"0x0"` failure; absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    /// Success unless the status field says failure.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => parse_quantity(status).map_or(false, |s| s == 1),
            None => true,
        }
    }

    /// Inclusion block number, when parseable.
    #[must_use]
    pub fn block(&self) -> Option<u64> {
        self.block_number
            .as_deref()
            .and_then(|b| parse_quantity(b).ok())
    }
}
