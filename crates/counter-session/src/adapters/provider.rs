//! # Provider Adapter
//!
//! Wraps the (optional) injected provider, requests account access and holds
//! the single signer the rest of the session reads. Only this adapter
//! replaces the signer, atomically, on connect or a provider-pushed change.

use crate::domain::entities::ProviderEvent;
use crate::domain::value_objects::{parse_quantity, Address, Bytes};
use crate::errors::SessionError;
use crate::ports::outbound::{methods, Eip1193Provider};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

/// Issues one request and decodes its result.
///
/// Provider errors are classified with [`SessionError::from_provider`];
/// undecodable results become `Network` errors.
pub async fn rpc<T: DeserializeOwned>(
    provider: &dyn Eip1193Provider,
    method: &str,
    params: Value,
) -> Result<T, SessionError> {
    debug!(method, "provider request");
    let value = provider.request(method, params).await.map_err(|e| {
        debug!(method, code = e.code, message = %e.message, "provider error");
        SessionError::from_provider(e)
    })?;
    serde_json::from_value(value).map_err(|e| SessionError::malformed(method, e))
}

/// Reads the chain id as a number.
pub async fn read_chain_id(provider: &dyn Eip1193Provider) -> Result<u64, SessionError> {
    let raw: String = rpc(provider, methods::CHAIN_ID, json!([])).await?;
    parse_quantity(&raw).map_err(|e| SessionError::malformed(methods::CHAIN_ID, e))
}

/// Deployed bytecode at `address` on the provider's current network.
///
/// Empty for accounts without code. Contract binding uses this as its
/// deployment check.
pub async fn get_code(
    provider: &dyn Eip1193Provider,
    address: Address,
) -> Result<Bytes, SessionError> {
    rpc(provider, methods::GET_CODE, json!([address, "latest"])).await
}

// =============================================================================
// SIGNER
// =============================================================================

/// An authorized account together with the provider that signs for it.
#[derive(Clone)]
pub struct Signer {
    address: Address,
    chain_id: u64,
    provider: Arc<dyn Eip1193Provider>,
}

impl Signer {
    /// Binds `address` to `provider`.
    pub fn new(address: Address, chain_id: u64, provider: Arc<dyn Eip1193Provider>) -> Self {
        Self {
            address,
            chain_id,
            provider,
        }
    }

    /// Signing account.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Chain the account was authorized on.
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Provider used for signing and reads.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn Eip1193Provider> {
        &self.provider
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

/// Effect of a provider event on the held signer.
#[derive(Debug, Clone)]
pub enum SignerChange {
    /// Nothing to do.
    Unchanged,
    /// The signer was dropped (accounts revoked or provider disconnected).
    Removed,
    /// A different first account is now active.
    Replaced(Signer),
    /// The wallet moved to another chain.
    ChainSwitched(u64),
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Holds the injected provider and the current signer.
pub struct ProviderAdapter {
    provider: Option<Arc<dyn Eip1193Provider>>,
    signer: RwLock<Option<Signer>>,
}

impl ProviderAdapter {
    /// Creates the adapter; `None` means no wallet was injected.
    pub fn new(provider: Option<Arc<dyn Eip1193Provider>>) -> Self {
        Self {
            provider,
            signer: RwLock::new(None),
        }
    }

    /// Whether a provider was injected.
    #[must_use]
    pub fn is_detected(&self) -> bool {
        self.provider.is_some()
    }

    /// Read-only provider, usable without a signer.
    pub fn read_provider(&self) -> Result<Arc<dyn Eip1193Provider>, SessionError> {
        self.provider.clone().ok_or(SessionError::NoProvider)
    }

    /// Current signer, if connected.
    #[must_use]
    pub fn signer(&self) -> Option<Signer> {
        self.signer.read().clone()
    }

    /// Subscribes to provider-pushed events.
    #[must_use]
    pub fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        self.provider.as_ref().and_then(|p| p.subscribe())
    }

    /// Requests account access and installs a signer for the first account.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<Signer, SessionError> {
        let provider = self.read_provider()?;

        let accounts: Vec<Address> =
            match rpc(provider.as_ref(), methods::REQUEST_ACCOUNTS, json!([])).await {
                Ok(accounts) => accounts,
                Err(SessionError::UserRejected) => {
                    warn!("account access rejected");
                    return Err(SessionError::UserRejected);
                }
                Err(e) => return Err(e),
            };
        let Some(&address) = accounts.first() else {
            warn!("wallet returned no accounts");
            return Err(SessionError::UserRejected);
        };

        let chain_id = read_chain_id(provider.as_ref()).await?;
        let signer = Signer::new(address, chain_id, provider);
        *self.signer.write() = Some(signer.clone());

        info!(address = %address, chain_id, "wallet connected");
        Ok(signer)
    }

    /// Applies a provider event to the held signer.
    pub fn apply_event(&self, event: &ProviderEvent) -> SignerChange {
        let mut slot = self.signer.write();
        match event {
            ProviderEvent::Disconnect => {
                if slot.take().is_some() {
                    info!("provider disconnected");
                    SignerChange::Removed
                } else {
                    SignerChange::Unchanged
                }
            }
            ProviderEvent::AccountsChanged(accounts) => match (accounts.first(), slot.as_ref()) {
                (None, Some(_)) => {
                    *slot = None;
                    info!("wallet accounts revoked");
                    SignerChange::Removed
                }
                (Some(&first), Some(current)) if first != current.address => {
                    let signer = Signer::new(first, current.chain_id, current.provider.clone());
                    *slot = Some(signer.clone());
                    info!(address = %first, "wallet account switched");
                    SignerChange::Replaced(signer)
                }
                _ => SignerChange::Unchanged,
            },
            ProviderEvent::ChainChanged(chain_id) => {
                if let Some(current) = slot.as_mut() {
                    current.chain_id = *chain_id;
                }
                info!(chain_id, "wallet chain changed");
                SignerChange::ChainSwitched(*chain_id)
            }
        }
    }

    /// Drops the signer.
    pub fn disconnect(&self) {
        *self.signer.write() = None;
    }
}

impl fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("detected", &self.is_detected())
            .field("signer", &*self.signer.read())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
