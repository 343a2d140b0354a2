//! # Transaction Executor
//!
//! Submits one mutating call and resolves it to a [`TransactionResult`].
//!
//! ## Single Pending Transaction
//!
//! A mutation first takes the executor's pending slot with
//! [`TransactionExecutor::begin`]. A second `begin` while the slot is held
//! fails with `TransactionPending` without touching the provider. The slot
//! is released when the returned [`PendingSlot`] is dropped, so every exit
//! path (confirmation, revert, rejection, timeout, early `?`) clears it.
//!
//! ## Outcome Mapping
//!
//! | Provider response | Result |
//! |-------------------|--------|
//! | receipt, status `0x1` | `Confirmed` |
//! | receipt, status `0x0` | `Reverted` (reason replayed via `eth_call`) |
//! | code 3 / revert message on submission | `Reverted` |
//! | code 4001 / 4100 | `UserRejected` |
//! | anything else, or confirmation timeout | `NetworkError` |
//!
//! Nothing is retried.

use crate::adapters::provider::rpc;
use crate::binding::ContractHandle;
use crate::domain::abi::Token;
use crate::domain::entities::{MutationKind, PendingTransaction, TransactionResult};
use crate::domain::invariants;
use crate::domain::value_objects::{to_quantity, TxHash};
use crate::errors::SessionError;
use crate::ports::outbound::{methods, Eip1193Provider, TransactionReceipt, TransactionRequest};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Receipt polling and confirmation bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Delay between receipt polls.
    pub poll_interval: Duration,
    /// Upper bound on the confirmation wait; `None` waits indefinitely.
    pub confirmation_timeout: Option<Duration>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            confirmation_timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// Outcome counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Submissions attempted.
    pub submitted: u64,
    /// Confirmed transactions.
    pub confirmed: u64,
    /// Reverted transactions.
    pub reverted: u64,
    /// Signatures declined.
    pub rejected: u64,
    /// Network failures and timeouts.
    pub failed: u64,
}

/// Holds the executor's pending slot; dropping it clears the slot.
#[derive(Debug)]
pub struct PendingSlot<'a> {
    executor: &'a TransactionExecutor,
    kind: MutationKind,
}

impl PendingSlot<'_> {
    /// Mutation this slot was taken for.
    #[must_use]
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    fn set_tx_hash(&self, tx_hash: TxHash) {
        if let Some(pending) = &mut *self.executor.pending.lock() {
            pending.tx_hash = Some(tx_hash);
        }
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.executor.pending.lock().take();
    }
}

/// Submits mutations one at a time.
#[derive(Debug, Default)]
pub struct TransactionExecutor {
    settings: ExecutorSettings,
    pending: Mutex<Option<PendingTransaction>>,
    stats: Mutex<ExecutorStats>,
}

impl TransactionExecutor {
    /// Creates an executor with the given bounds.
    #[must_use]
    pub fn new(settings: ExecutorSettings) -> Self {
        Self {
            settings,
            pending: Mutex::new(None),
            stats: Mutex::new(ExecutorStats::default()),
        }
    }

    /// In-flight mutation, if any.
    #[must_use]
    pub fn pending(&self) -> Option<PendingTransaction> {
        self.pending.lock().clone()
    }

    /// Outcome counters so far.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().clone()
    }

    /// Takes the pending slot for `kind`.
    pub fn begin(&self, kind: MutationKind) -> Result<PendingSlot<'_>, SessionError> {
        let mut pending = self.pending.lock();
        if let Err(e) = invariants::check_no_pending((*pending).as_ref()) {
            warn!(kind = %kind, "mutation rejected, another transaction is pending");
            return Err(e);
        }
        *pending = Some(PendingTransaction::new(kind));
        Ok(PendingSlot {
            executor: self,
            kind,
        })
    }

    /// Sends `method(args)` through the handle's signer and waits for a
    /// definite outcome.
    ///
    /// `Err` is reserved for failures before anything reached the provider
    /// (no signer, unknown method); every provider outcome is an `Ok`.
    #[instrument(skip(self, slot, handle, args), fields(kind = %slot.kind()))]
    pub async fn submit(
        &self,
        slot: &PendingSlot<'_>,
        handle: &ContractHandle,
        method: &str,
        args: &[Token],
    ) -> Result<TransactionResult, SessionError> {
        let signer = handle.signer().ok_or(SessionError::NotConnected)?;
        let request = TransactionRequest {
            from: Some(signer.address()),
            to: handle.address(),
            data: handle.encode_call(method, args)?,
        };
        let provider = handle.provider().as_ref();

        self.stats.lock().submitted += 1;
        let tx_hash: TxHash =
            match rpc(provider, methods::SEND_TRANSACTION, json!([request])).await {
                Ok(hash) => hash,
                Err(e) => return Ok(self.record(failure_outcome(e, None))),
            };
        slot.set_tx_hash(tx_hash);
        info!(tx_hash = %tx_hash, method, "transaction submitted");

        let wait = self.wait_for_receipt(provider, &request, tx_hash);
        let outcome = match self.settings.confirmation_timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(outcome) => outcome,
                Err(_) => TransactionResult::NetworkError(format!(
                    "no confirmation for {tx_hash} within {}s",
                    limit.as_secs_f64()
                )),
            },
            None => wait.await,
        };
        Ok(self.record(outcome))
    }

    async fn wait_for_receipt(
        &self,
        provider: &dyn Eip1193Provider,
        request: &TransactionRequest,
        tx_hash: TxHash,
    ) -> TransactionResult {
        loop {
            let receipt: Option<TransactionReceipt> = match rpc(
                provider,
                methods::GET_TRANSACTION_RECEIPT,
                json!([tx_hash]),
            )
            .await
            {
                Ok(receipt) => receipt,
                Err(e) => return failure_outcome(e, Some(tx_hash)),
            };

            match receipt {
                Some(receipt) if receipt.succeeded() => {
                    return TransactionResult::Confirmed {
                        tx_hash,
                        block_number: receipt.block(),
                    };
                }
                Some(receipt) => {
                    let reason = replay_revert_reason(provider, request, receipt.block()).await;
                    return TransactionResult::Reverted {
                        tx_hash: Some(tx_hash),
                        reason,
                    };
                }
                None => {
                    debug!(tx_hash = %tx_hash, "receipt not yet available");
                    tokio::time::sleep(self.settings.poll_interval).await;
                }
            }
        }
    }

    fn record(&self, outcome: TransactionResult) -> TransactionResult {
        let mut stats = self.stats.lock();
        match &outcome {
            TransactionResult::Confirmed {
                tx_hash,
                block_number,
            } => {
                stats.confirmed += 1;
                info!(tx_hash = %tx_hash, block = ?block_number, "transaction confirmed");
            }
            TransactionResult::Reverted { tx_hash, reason } => {
                stats.reverted += 1;
                warn!(tx_hash = ?tx_hash, reason = %reason, "transaction reverted");
            }
            TransactionResult::UserRejected => {
                stats.rejected += 1;
                warn!("signature rejected in wallet");
            }
            TransactionResult::NetworkError(message) => {
                stats.failed += 1;
                warn!(error = %message, "transaction failed");
            }
        }
        outcome
    }
}

/// Maps a classified provider failure onto a submission outcome.
fn failure_outcome(error: SessionError, tx_hash: Option<TxHash>) -> TransactionResult {
    match error {
        SessionError::UserRejected => TransactionResult::UserRejected,
        SessionError::Reverted { reason } => TransactionResult::Reverted { tx_hash, reason },
        other => TransactionResult::NetworkError(other.to_string()),
    }
}

/// Re-runs a failed transaction as a call to recover its revert reason.
async fn replay_revert_reason(
    provider: &dyn Eip1193Provider,
    request: &TransactionRequest,
    block: Option<u64>,
) -> String {
    let tag = block.map_or_else(|| "latest".to_string(), to_quantity);
    match rpc::<Value>(provider, methods::CALL, json!([request, tag])).await {
        Err(SessionError::Reverted { reason }) if !reason.is_empty() => reason,
        _ => "transaction failed on-chain".to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
