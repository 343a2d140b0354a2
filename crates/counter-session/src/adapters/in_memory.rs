//! # In-Memory Chain
//!
//! An in-process EIP-1193 provider hosting counter contracts. Drives the
//! test suite and `counterctl --demo`.
//!
//! Fault injection covers what a real wallet/node can do to the session:
//! rejected prompts and signatures, failing reads, missing `owner()`
//! accessor, reverts (mined or at submission), withheld receipts,
//! connectivity loss and pushed account/chain events.

use crate::domain::abi::{encode_panic, encode_revert_reason, selector};
use crate::domain::entities::ProviderEvent;
use crate::domain::value_objects::{keccak256, to_quantity, Address, Bytes, TxHash, U256};
use crate::errors::ProviderRpcError;
use crate::ports::outbound::{methods, Eip1193Provider, TransactionRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

/// Placeholder runtime bytecode reported by `eth_getCode`.
const COUNTER_RUNTIME: [u8; 12] = [
    0x60, 0x80, 0x60, 0x40, 0x52, 0x34, 0x80, 0x15, 0x60, 0x0f, 0x57, 0xfe,
];

/// Revert message of a non-owner `resetCounter()`.
pub const ONLY_OWNER_REASON: &str = "Only owner can reset";

/// Panic code for checked arithmetic failures.
const PANIC_ARITHMETIC: u64 = 0x11;

/// Where a failing transaction is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevertMode {
    /// Accepted, mined with status `0x0`.
    #[default]
    Mined,
    /// Rejected by `eth_sendTransaction` with code 3 and the revert payload.
    AtSubmission,
}

#[derive(Debug, Clone)]
struct CounterContract {
    owner: Address,
    counter: U256,
    has_owner_accessor: bool,
}

impl CounterContract {
    /// Runs a call; `Ok` carries return data, `Err` the revert payload.
    fn execute(&mut self, from: Option<Address>, data: &[u8]) -> Result<Vec<u8>, Vec<u8>> {
        if data.len() < 4 {
            return Err(Vec::new());
        }
        let sel = &data[..4];
        if sel == selector("getCounter()") {
            let mut word = [0u8; 32];
            self.counter.to_big_endian(&mut word);
            Ok(word.to_vec())
        } else if sel == selector("owner()") && self.has_owner_accessor {
            Ok(self.owner.to_word().to_vec())
        } else if sel == selector("incrementCounter()") {
            self.counter = self
                .counter
                .checked_add(U256::one())
                .ok_or_else(|| encode_panic(PANIC_ARITHMETIC))?;
            Ok(Vec::new())
        } else if sel == selector("decrementCounter()") {
            self.counter = self
                .counter
                .checked_sub(U256::one())
                .ok_or_else(|| encode_panic(PANIC_ARITHMETIC))?;
            Ok(Vec::new())
        } else if sel == selector("resetCounter()") {
            if from != Some(self.owner) {
                return Err(encode_revert_reason(ONLY_OWNER_REASON));
            }
            self.counter = U256::zero();
            Ok(Vec::new())
        } else {
            // No fallback function
            Err(Vec::new())
        }
    }
}

#[derive(Debug, Clone)]
struct QueuedTransaction {
    hash: TxHash,
    chain_id: u64,
    from: Address,
    to: Address,
    data: Bytes,
}

#[derive(Debug, Default)]
struct ChainState {
    chain_id: u64,
    accounts: Vec<Address>,
    authorized: bool,
    reject_authorization: bool,
    reject_signing: bool,
    revert_mode: RevertMode,
    contracts: HashMap<(u64, Address), CounterContract>,
    deployments: u64,
    block_number: u64,
    tx_count: u64,
    receipts: HashMap<TxHash, Value>,
    hold_receipts: bool,
    held: Vec<QueuedTransaction>,
    unobserved: HashSet<TxHash>,
    max_unobserved: usize,
    fail_owner_reads: bool,
    fail_counter_reads: bool,
    network_down: bool,
    latency: Option<Duration>,
    requests: Vec<String>,
}

impl ChainState {
    fn contract_mut(&mut self, address: Address) -> Option<&mut CounterContract> {
        self.contracts.get_mut(&(self.chain_id, address))
    }

    fn mine(&mut self, tx: QueuedTransaction) {
        self.block_number += 1;
        let outcome = match self.contracts.get_mut(&(tx.chain_id, tx.to)) {
            Some(contract) => {
                // Apply to a copy so a revert leaves storage untouched
                let mut next = contract.clone();
                let result = next.execute(Some(tx.from), tx.data.as_slice());
                if result.is_ok() {
                    *contract = next;
                }
                result.is_ok()
            }
            // Value-less call to an account without code
            None => true,
        };
        let receipt = json!({
            "transactionHash": tx.hash,
            "blockNumber": to_quantity(self.block_number),
            "status": if outcome { "0x1" } else { "0x0" },
        });
        self.receipts.insert(tx.hash, receipt);
    }
}

/// Simulated chain + wallet.
#[derive(Debug)]
pub struct InMemoryChain {
    state: Mutex<ChainState>,
    events: broadcast::Sender<ProviderEvent>,
}

impl InMemoryChain {
    /// Creates a chain whose wallet exposes `accounts` (first is active).
    pub fn new(chain_id: u64, accounts: Vec<Address>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(ChainState {
                chain_id,
                accounts,
                ..ChainState::default()
            }),
            events,
        }
    }

    /// Deploys a counter owned by `owner` on the current chain.
    pub fn deploy_counter(&self, owner: Address) -> Address {
        let mut state = self.state.lock();
        state.deployments += 1;
        let mut seed = owner.as_bytes().to_vec();
        seed.extend_from_slice(&state.deployments.to_be_bytes());
        let digest = keccak256(&seed);
        let address = Address::from_word(&digest);
        let chain_id = state.chain_id;
        state.contracts.insert(
            (chain_id, address),
            CounterContract {
                owner,
                counter: U256::zero(),
                has_owner_accessor: true,
            },
        );
        address
    }

    /// Makes `owner()` revert, as on a contract without that accessor.
    pub fn remove_owner_accessor(&self, contract: Address) {
        if let Some(c) = self.state.lock().contract_mut(contract) {
            c.has_owner_accessor = false;
        }
    }

    /// Overwrites the stored counter.
    pub fn set_counter(&self, contract: Address, value: U256) {
        if let Some(c) = self.state.lock().contract_mut(contract) {
            c.counter = value;
        }
    }

    /// Changes the stored owner behind the session's back.
    pub fn set_owner(&self, contract: Address, owner: Address) {
        if let Some(c) = self.state.lock().contract_mut(contract) {
            c.owner = owner;
        }
    }

    /// Stored counter, if the contract exists on the current chain.
    pub fn counter(&self, contract: Address) -> Option<U256> {
        self.state.lock().contract_mut(contract).map(|c| c.counter)
    }

    /// Makes `account` the active one and notifies subscribers.
    pub fn switch_account(&self, account: Address) {
        let accounts = {
            let mut state = self.state.lock();
            state.accounts.retain(|a| *a != account);
            state.accounts.insert(0, account);
            state.authorized.then(|| state.accounts.clone())
        };
        if let Some(accounts) = accounts {
            let _ = self.events.send(ProviderEvent::AccountsChanged(accounts));
        }
    }

    /// Revokes account access and notifies subscribers.
    pub fn revoke_accounts(&self) {
        self.state.lock().authorized = false;
        let _ = self.events.send(ProviderEvent::AccountsChanged(Vec::new()));
    }

    /// Moves the wallet to `chain_id` and notifies subscribers.
    pub fn switch_chain(&self, chain_id: u64) {
        self.state.lock().chain_id = chain_id;
        let _ = self.events.send(ProviderEvent::ChainChanged(chain_id));
    }

    /// Emits `disconnect`.
    pub fn disconnect(&self) {
        self.state.lock().authorized = false;
        let _ = self.events.send(ProviderEvent::Disconnect);
    }

    /// Declines every `eth_requestAccounts` prompt.
    pub fn set_reject_authorization(&self, reject: bool) {
        self.state.lock().reject_authorization = reject;
    }

    /// Declines every signature request.
    pub fn set_reject_signing(&self, reject: bool) {
        self.state.lock().reject_signing = reject;
    }

    /// Chooses where failing transactions are rejected.
    pub fn set_revert_mode(&self, mode: RevertMode) {
        self.state.lock().revert_mode = mode;
    }

    /// Makes `owner()` reads fail with an internal error.
    pub fn set_fail_owner_reads(&self, fail: bool) {
        self.state.lock().fail_owner_reads = fail;
    }

    /// Makes `getCounter()` reads fail with an internal error.
    pub fn set_fail_counter_reads(&self, fail: bool) {
        self.state.lock().fail_counter_reads = fail;
    }

    /// Fails every request with a disconnected error.
    pub fn set_network_down(&self, down: bool) {
        self.state.lock().network_down = down;
    }

    /// Delays every request.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().latency = latency;
    }

    /// Keeps submitted transactions unmined until [`Self::release_receipts`].
    pub fn hold_receipts(&self, hold: bool) {
        self.state.lock().hold_receipts = hold;
    }

    /// Mines every withheld transaction.
    pub fn release_receipts(&self) {
        let mut state = self.state.lock();
        let held = std::mem::take(&mut state.held);
        for tx in held {
            state.mine(tx);
        }
    }

    /// Transactions submitted and not yet mined.
    pub fn held_count(&self) -> usize {
        self.state.lock().held.len()
    }

    /// Number of requests for `method`.
    pub fn request_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|m| *m == method)
            .count()
    }

    /// Every method requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    /// Forgets the request log.
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    /// Peak number of submitted transactions whose receipt the client had
    /// not yet observed.
    pub fn max_outstanding_transactions(&self) -> usize {
        self.state.lock().max_unobserved
    }

    /// Number of live event subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn dispatch(&self, method: &str, params: &Value) -> Result<Value, ProviderRpcError> {
        let mut state = self.state.lock();
        if state.network_down {
            return Err(ProviderRpcError::disconnected("network unreachable"));
        }

        match method {
            methods::REQUEST_ACCOUNTS => {
                if state.reject_authorization {
                    return Err(ProviderRpcError::user_rejected());
                }
                state.authorized = true;
                Ok(json!(state.accounts))
            }
            methods::ACCOUNTS => {
                let accounts = if state.authorized {
                    state.accounts.clone()
                } else {
                    Vec::new()
                };
                Ok(json!(accounts))
            }
            methods::CHAIN_ID => Ok(json!(to_quantity(state.chain_id))),
            methods::GET_CODE => {
                let address: Address = param(params, 0)?;
                let code = if state.contract_mut(address).is_some() {
                    Bytes::from(&COUNTER_RUNTIME[..])
                } else {
                    Bytes::new()
                };
                Ok(json!(code))
            }
            methods::CALL => {
                let call: TransactionRequest = param(params, 0)?;
                let data = call.data.as_slice();
                let is_owner_read = data.starts_with(&selector("owner()"));
                let is_counter_read = data.starts_with(&selector("getCounter()"));
                if is_owner_read && state.fail_owner_reads {
                    return Err(ProviderRpcError::internal("owner read failed"));
                }
                if is_counter_read && state.fail_counter_reads {
                    return Err(ProviderRpcError::internal("counter read failed"));
                }
                let Some(contract) = state.contract_mut(call.to) else {
                    return Ok(json!(Bytes::new()));
                };
                // Calls never persist
                let mut scratch = contract.clone();
                match scratch.execute(call.from, data) {
                    Ok(output) => Ok(json!(Bytes::from(output))),
                    Err(revert) => Err(ProviderRpcError::execution_reverted(&revert)),
                }
            }
            methods::SEND_TRANSACTION => {
                let call: TransactionRequest = param(params, 0)?;
                let from = call
                    .from
                    .ok_or_else(|| ProviderRpcError::invalid_params("missing from"))?;
                if !state.authorized || !state.accounts.contains(&from) {
                    return Err(ProviderRpcError::new(
                        crate::errors::codes::UNAUTHORIZED,
                        "account not authorized",
                    ));
                }
                if state.reject_signing {
                    return Err(ProviderRpcError::user_rejected());
                }
                if state.revert_mode == RevertMode::AtSubmission {
                    if let Some(contract) = state.contract_mut(call.to) {
                        let mut scratch = contract.clone();
                        if let Err(revert) = scratch.execute(Some(from), call.data.as_slice()) {
                            return Err(ProviderRpcError::execution_reverted(&revert));
                        }
                    }
                }

                state.tx_count += 1;
                let mut preimage = from.as_bytes().to_vec();
                preimage.extend_from_slice(&state.tx_count.to_be_bytes());
                preimage.extend_from_slice(call.data.as_slice());
                let hash = TxHash::new(keccak256(&preimage));

                let tx = QueuedTransaction {
                    hash,
                    chain_id: state.chain_id,
                    from,
                    to: call.to,
                    data: call.data,
                };
                state.unobserved.insert(hash);
                state.max_unobserved = state.max_unobserved.max(state.unobserved.len());
                if state.hold_receipts {
                    state.held.push(tx);
                } else {
                    state.mine(tx);
                }
                Ok(json!(hash))
            }
            methods::GET_TRANSACTION_RECEIPT => {
                let hash: TxHash = param(params, 0)?;
                match state.receipts.get(&hash).cloned() {
                    Some(receipt) => {
                        state.unobserved.remove(&hash);
                        Ok(receipt)
                    }
                    None => Ok(Value::Null),
                }
            }
            other => Err(ProviderRpcError::unsupported_method(other)),
        }
    }
}

fn param<T: DeserializeOwned>(params: &Value, index: usize) -> Result<T, ProviderRpcError> {
    let value = params
        .get(index)
        .cloned()
        .ok_or_else(|| ProviderRpcError::invalid_params(format!("missing parameter {index}")))?;
    serde_json::from_value(value).map_err(|e| ProviderRpcError::invalid_params(e.to_string()))
}

#[async_trait]
impl Eip1193Provider for InMemoryChain {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        // Logged on arrival, so in-flight requests are visible
        let latency = {
            let mut state = self.state.lock();
            state.requests.push(method.to_string());
            state.latency
        };
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        let result = self.dispatch(method, &params);
        debug!(method, ok = result.is_ok(), "in-memory request");
        result
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        Some(self.events.subscribe())
    }
}

// =============================================================================
// TESTS
// =============================================================================
