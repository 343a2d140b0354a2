//! # Contract Binding
//!
//! Turns a configured address and interface descriptor into a callable
//! [`ContractHandle`], after probing that code is actually deployed there.
//!
//! A handle always carries either a signer or a read-only provider; reads
//! work with both, writes go through the executor and need the signer.

use crate::adapters::provider::{get_code, rpc, Signer};
use crate::domain::abi::{ContractAbi, Token};
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::SessionError;
use crate::ports::outbound::{methods, Eip1193Provider, TransactionRequest};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Who the handle talks through.
#[derive(Clone)]
pub enum SignerOrProvider {
    /// An authorized account; reads are sent `from` it.
    Signer(Signer),
    /// Anonymous read-only access.
    Provider(Arc<dyn Eip1193Provider>),
}

impl SignerOrProvider {
    fn provider(&self) -> &Arc<dyn Eip1193Provider> {
        match self {
            Self::Signer(signer) => signer.provider(),
            Self::Provider(provider) => provider,
        }
    }
}

impl fmt::Debug for SignerOrProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signer(signer) => f.debug_tuple("Signer").field(signer).finish(),
            Self::Provider(_) => f.write_str("Provider"),
        }
    }
}

/// Binds `address` to `abi`, failing with `ContractNotDeployed` when the
/// current network has no code there.
#[instrument(skip_all, fields(address = %address))]
pub async fn bind(
    address: Address,
    abi: Arc<ContractAbi>,
    access: SignerOrProvider,
) -> Result<ContractHandle, SessionError> {
    let code = get_code(access.provider().as_ref(), address).await?;

    if code.is_empty() {
        error!(address = %address, "no contract code at address");
        return Err(SessionError::ContractNotDeployed { address });
    }

    debug!(code_len = code.len(), "contract bound");
    Ok(ContractHandle {
        address,
        abi,
        access,
    })
}

/// A deployed contract ready for calls.
#[derive(Clone, Debug)]
pub struct ContractHandle {
    address: Address,
    abi: Arc<ContractAbi>,
    access: SignerOrProvider,
}

impl ContractHandle {
    /// Contract address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Interface descriptor.
    #[must_use]
    pub fn abi(&self) -> &ContractAbi {
        &self.abi
    }

    /// Signer, when bound to one.
    #[must_use]
    pub fn signer(&self) -> Option<&Signer> {
        match &self.access {
            SignerOrProvider::Signer(signer) => Some(signer),
            SignerOrProvider::Provider(_) => None,
        }
    }

    /// Provider used for every request.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn Eip1193Provider> {
        self.access.provider()
    }

    /// Encodes calldata for `function`.
    pub fn encode_call(&self, function: &str, args: &[Token]) -> Result<Bytes, SessionError> {
        Ok(self.abi.function(function)?.encode_call(args)?)
    }

    /// Runs a side-effect-free call and decodes its outputs.
    pub async fn call_view(
        &self,
        function: &str,
        args: &[Token],
    ) -> Result<Vec<Token>, SessionError> {
        let abi_fn = self.abi.function(function)?;
        let request = TransactionRequest {
            from: self.signer().map(Signer::address),
            to: self.address,
            data: abi_fn.encode_call(args)?,
        };
        let output: Bytes = rpc(
            self.provider().as_ref(),
            methods::CALL,
            json!([request, "latest"]),
        )
        .await?;
        Ok(abi_fn.decode_output(output.as_slice())?)
    }

    /// `owner() -> address`
    pub async fn owner(&self) -> Result<Address, SessionError> {
        self.call_view("owner", &[])
            .await?
            .into_iter()
            .next()
            .and_then(Token::into_address)
            .ok_or_else(|| SessionError::malformed("owner()", "expected an address"))
    }

    /// `getCounter() -> uint256`
    pub async fn get_counter(&self) -> Result<U256, SessionError> {
        self.call_view("getCounter", &[])
            .await?
            .into_iter()
            .next()
            .and_then(Token::into_uint)
            .ok_or_else(|| SessionError::malformed("getCounter()", "expected an integer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::InMemoryChain;
    use crate::domain::abi::AbiError;

    fn account(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn setup() -> (Arc<InMemoryChain>, Address, Arc<ContractAbi>) {
        let chain = Arc::new(InMemoryChain::new(31337, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xB));
        chain.set_counter(contract, U256::from(5u64));
        (chain, contract, Arc::new(ContractAbi::counter().unwrap()))
    }

    #[tokio::test]
    async fn test_read_only_binding() {
        let (chain, contract, abi) = setup();
        let handle = bind(contract, abi, SignerOrProvider::Provider(chain))
            .await
            .unwrap();

        assert!(handle.signer().is_none());
        assert_eq!(handle.get_counter().await.unwrap(), U256::from(5u64));
        assert_eq!(handle.owner().await.unwrap(), account(0xB));
    }

    #[tokio::test]
    async fn test_signer_binding() {
        let (chain, contract, abi) = setup();
        let signer = Signer::new(account(0xA), 31337, chain);
        let handle = bind(contract, abi, SignerOrProvider::Signer(signer))
            .await
            .unwrap();
        assert_eq!(handle.signer().unwrap().address(), account(0xA));
        assert_eq!(handle.address(), contract);
    }

    #[tokio::test]
    async fn test_undeployed_address() {
        let (chain, _, abi) = setup();
        let missing = account(0x42);
        let err = bind(missing, abi, SignerOrProvider::Provider(chain.clone()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::ContractNotDeployed { address } if address == missing
        ));
        // One deployment check, no calls
        assert_eq!(chain.request_count(methods::GET_CODE), 1);
        assert_eq!(chain.request_count(methods::CALL), 0);
    }

    #[tokio::test]
    async fn test_missing_owner_accessor_is_revert() {
        let (chain, contract, abi) = setup();
        chain.remove_owner_accessor(contract);
        let handle = bind(contract, abi, SignerOrProvider::Provider(chain))
            .await
            .unwrap();
        assert!(matches!(
            handle.owner().await,
            Err(SessionError::Reverted { .. })
        ));
        assert!(handle.get_counter().await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let (chain, contract, abi) = setup();
        let handle = bind(contract, abi, SignerOrProvider::Provider(chain))
            .await
            .unwrap();
        assert!(matches!(
            handle.encode_call("withdraw", &[]),
            Err(SessionError::Abi(AbiError::UnknownFunction(_)))
        ));
    }
}
