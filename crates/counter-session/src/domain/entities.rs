//! # Domain Entities
//!
//! The observable session model: wallet session, counter snapshot, pending
//! transaction and the tagged outcome of a submission.

use crate::domain::invariants;
use crate::domain::value_objects::{Address, TxHash, U256};
use crate::errors::{ErrorKind, SessionError};
use std::fmt;
use std::time::Instant;

// =============================================================================
// MUTATIONS
// =============================================================================

/// State-changing counter operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// `incrementCounter()`
    Increment,
    /// `decrementCounter()`
    Decrement,
    /// `resetCounter()` (owner only on-chain)
    Reset,
}

impl MutationKind {
    /// All mutations, in UI order.
    pub const ALL: [Self; 3] = [Self::Increment, Self::Decrement, Self::Reset];

    /// Contract method invoked for this mutation.
    #[must_use]
    pub const fn method_name(self) -> &'static str {
        match self {
            Self::Increment => "incrementCounter",
            Self::Decrement => "decrementCounter",
            Self::Reset => "resetCounter",
        }
    }

    /// Short action label used in messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Increment => "increment",
            Self::Decrement => "decrement",
            Self::Reset => "reset",
        }
    }

    /// Whether the UI gates this mutation on ownership.
    #[must_use]
    pub const fn requires_owner(self) -> bool {
        matches!(self, Self::Reset)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// WALLET SESSION
// =============================================================================

/// Connected account, if any.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalletSession {
    /// First authorized account.
    pub address: Option<Address>,
    /// A connect request is awaiting the wallet prompt.
    pub is_connecting: bool,
}

impl WalletSession {
    /// Returns true once an account is authorized.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }

    /// Drops the account and any in-flight connect state.
    pub fn reset(&mut self) {
        self.address = None;
        self.is_connecting = false;
    }
}

// =============================================================================
// COUNTER SNAPSHOT
// =============================================================================

/// A displayed failure: its taxonomy class plus the human-readable line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionFault {
    /// Error class.
    pub kind: ErrorKind,
    /// Message shown to the user.
    pub message: String,
}

impl SessionFault {
    /// Builds the fault for an error raised by `action`.
    ///
    /// Guard rejections keep their bare message ("owner only"); everything
    /// else is prefixed with the action label ("increment failed: ...").
    #[must_use]
    pub fn for_action(action: &str, error: &SessionError) -> Self {
        let message = if error.is_guard() {
            error.user_message()
        } else {
            format!("{action} failed: {}", error.user_message())
        };
        Self {
            kind: error.kind(),
            message,
        }
    }
}

impl From<&SessionError> for SessionFault {
    fn from(error: &SessionError) -> Self {
        Self {
            kind: error.kind(),
            message: error.user_message(),
        }
    }
}

impl fmt::Display for SessionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Last reconciled view of the contract.
///
/// `value` and `owner_address` are only ever replaced together by
/// [`CounterSnapshot::replace`]; `last_error` is set independently.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Counter value from the last successful read.
    pub value: Option<U256>,
    /// Owner from the last successful read; `None` means unknown.
    pub owner_address: Option<Address>,
    /// Most recent failure, cleared by a successful reconciliation.
    pub last_error: Option<SessionFault>,
}

impl CounterSnapshot {
    /// Replaces both fields from a successful reconciliation.
    pub fn replace(&mut self, value: U256, owner_address: Option<Address>) {
        self.value = Some(value);
        self.owner_address = owner_address;
        self.last_error = None;
    }

    /// Records a failure without touching the reconciled fields.
    pub fn record_error(&mut self, fault: SessionFault) {
        self.last_error = Some(fault);
    }

    /// Kind of the last error, if any.
    #[must_use]
    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error.as_ref().map(|fault| fault.kind)
    }
}

// =============================================================================
// PENDING TRANSACTION
// =============================================================================

/// A submitted mutation awaiting its outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    /// What was submitted.
    pub kind: MutationKind,
    /// When the pending slot was taken.
    pub submitted_at: Instant,
    /// Hash once the provider accepted the transaction.
    pub tx_hash: Option<TxHash>,
}

impl PendingTransaction {
    /// Opens a pending record for `kind`.
    #[must_use]
    pub fn new(kind: MutationKind) -> Self {
        Self {
            kind,
            submitted_at: Instant::now(),
            tx_hash: None,
        }
    }
}

// =============================================================================
// TRANSACTION RESULT
// =============================================================================

/// Definite outcome of one submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionResult {
    /// Included with success status.
    Confirmed {
        /// Transaction hash.
        tx_hash: TxHash,
        /// Inclusion block, when reported.
        block_number: Option<u64>,
    },
    /// Rejected by the chain, either during pre-flight or mined with failure status.
    Reverted {
        /// Hash, when the transaction was mined.
        tx_hash: Option<TxHash>,
        /// Decoded revert reason.
        reason: String,
    },
    /// The signer declined to sign.
    UserRejected,
    /// RPC or connectivity failure before or while awaiting confirmation.
    NetworkError(String),
}

impl TransactionResult {
    /// True only for [`TransactionResult::Confirmed`].
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    /// Hash of the transaction, if it reached the chain.
    #[must_use]
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::Confirmed { tx_hash, .. } => Some(*tx_hash),
            Self::Reverted { tx_hash, .. } => *tx_hash,
            Self::UserRejected | Self::NetworkError(_) => None,
        }
    }

    /// Converts a failure outcome into the matching session error.
    ///
    /// Returns `Ok` with the hash and block for a confirmed transaction.
    pub fn into_result(self) -> Result<ConfirmedTransaction, SessionError> {
        match self {
            Self::Confirmed {
                tx_hash,
                block_number,
            } => Ok(ConfirmedTransaction {
                tx_hash,
                block_number,
            }),
            Self::Reverted { reason, .. } => Err(SessionError::Reverted { reason }),
            Self::UserRejected => Err(SessionError::UserRejected),
            Self::NetworkError(message) => Err(SessionError::Network(message)),
        }
    }
}

/// A confirmed mutation, returned by the session's mutating operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmedTransaction {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Inclusion block, when reported.
    pub block_number: Option<u64>,
}

// =============================================================================
// PROVIDER EVENTS
// =============================================================================

/// Notifications pushed by the wallet provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    /// `accountsChanged`; an empty list means access was revoked.
    AccountsChanged(Vec<Address>),
    /// `chainChanged` with the new chain id.
    ChainChanged(u64),
    /// `disconnect`
    Disconnect,
}

// =============================================================================
// SESSION VIEW
// =============================================================================

/// Coarse session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// No authorized account.
    Disconnected,
    /// Waiting on the wallet authorization prompt.
    Connecting,
    /// Account authorized, no transaction in flight.
    Connected(Address),
    /// A mutation is awaiting its outcome.
    Pending {
        /// Submitting account.
        address: Address,
        /// Mutation in flight.
        kind: MutationKind,
    },
}

/// Everything the UI collaborator renders, captured at one instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionView {
    /// Coarse state.
    pub phase: SessionPhase,
    /// Wallet connection.
    pub wallet: WalletSession,
    /// Reconciled contract state.
    pub snapshot: CounterSnapshot,
    /// In-flight mutation.
    pub pending: Option<PendingTransaction>,
    /// Contract the session is bound to.
    pub contract_address: Address,
}

impl SessionView {
    /// Connected account equals the owner (case-insensitive).
    #[must_use]
    pub fn is_owner(&self) -> bool {
        invariants::is_owner(self.wallet.address, self.snapshot.owner_address)
    }

    /// Increment/decrement controls are enabled.
    #[must_use]
    pub fn can_mutate(&self) -> bool {
        self.wallet.is_connected() && self.pending.is_none()
    }

    /// Reset control is enabled.
    #[must_use]
    pub fn can_reset(&self) -> bool {
        self.can_mutate() && self.is_owner()
    }

    /// Message of the last failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.snapshot.last_error.as_ref().map(|f| f.message.as_str())
    }
}

impl fmt::Display for SessionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "contract: {}", self.contract_address)?;
        match self.snapshot.owner_address {
            Some(owner) => writeln!(f, "owner:    {owner}")?,
            None => writeln!(f, "owner:    ...")?,
        }
        match (self.phase, self.wallet.address) {
            (SessionPhase::Connecting, _) => writeln!(f, "wallet:   connecting...")?,
            (_, Some(address)) if self.is_owner() => {
                writeln!(f, "wallet:   {address} (owner)")?;
            }
            (_, Some(address)) => writeln!(f, "wallet:   {address}")?,
            (_, None) => writeln!(f, "wallet:   not connected")?,
        }
        match self.snapshot.value {
            Some(value) => writeln!(f, "counter:  {value}")?,
            None => writeln!(f, "counter:  ...")?,
        }
        if let Some(pending) = &self.pending {
            writeln!(f, "pending:  {}", pending.kind)?;
        }
        if let Some(fault) = &self.snapshot.last_error {
            writeln!(f, "error:    {fault}")?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn view(address: Option<Address>, owner: Option<Address>) -> SessionView {
        SessionView {
            phase: address.map_or(SessionPhase::Disconnected, SessionPhase::Connected),
            wallet: WalletSession {
                address,
                is_connecting: false,
            },
            snapshot: CounterSnapshot {
                value: Some(U256::from(5u64)),
                owner_address: owner,
                last_error: None,
            },
            pending: None,
            contract_address: Address::new([0xCC; 20]),
        }
    }

    #[test]
    fn test_mutation_methods() {
        assert_eq!(MutationKind::Increment.method_name(), "incrementCounter");
        assert_eq!(MutationKind::Decrement.method_name(), "decrementCounter");
        assert_eq!(MutationKind::Reset.method_name(), "resetCounter");
        assert!(MutationKind::Reset.requires_owner());
        assert!(!MutationKind::Increment.requires_owner());
    }

    #[test]
    fn test_snapshot_replace_clears_error() {
        let mut snapshot = CounterSnapshot::default();
        snapshot.record_error(SessionFault::from(&SessionError::OwnerOnly));
        assert_eq!(snapshot.last_error_kind(), Some(ErrorKind::OwnerOnly));

        snapshot.replace(U256::from(7u64), None);
        assert_eq!(snapshot.value, Some(U256::from(7u64)));
        assert_eq!(snapshot.owner_address, None);
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_record_error_keeps_fields() {
        let owner = Address::new([1; 20]);
        let mut snapshot = CounterSnapshot::default();
        snapshot.replace(U256::from(3u64), Some(owner));
        snapshot.record_error(SessionFault::from(&SessionError::Network("down".into())));
        assert_eq!(snapshot.value, Some(U256::from(3u64)));
        assert_eq!(snapshot.owner_address, Some(owner));
    }

    #[test]
    fn test_fault_prefixes_action_failures_only() {
        let fault = SessionFault::for_action("increment", &SessionError::UserRejected);
        assert!(fault.message.starts_with("increment failed: "));

        let fault = SessionFault::for_action("reset", &SessionError::OwnerOnly);
        assert_eq!(fault.message, "owner only");
        assert_eq!(fault.kind, ErrorKind::OwnerOnly);
    }

    #[test]
    fn test_transaction_result_conversion() {
        let hash = TxHash::new([9; 32]);
        let ok = TransactionResult::Confirmed {
            tx_hash: hash,
            block_number: Some(4),
        };
        assert!(ok.is_confirmed());
        assert_eq!(ok.clone().into_result().unwrap().tx_hash, hash);

        let reverted = TransactionResult::Reverted {
            tx_hash: Some(hash),
            reason: "Only owner".into(),
        };
        assert_eq!(reverted.tx_hash(), Some(hash));
        assert!(matches!(
            reverted.into_result(),
            Err(SessionError::Reverted { .. })
        ));
        assert!(matches!(
            TransactionResult::UserRejected.into_result(),
            Err(SessionError::UserRejected)
        ));
    }

    #[test]
    fn test_view_owner_flags() {
        let a = Address::new([0xA0; 20]);
        let b = Address::new([0xB0; 20]);

        let v = view(Some(a), Some(b));
        assert!(v.can_mutate());
        assert!(!v.is_owner());
        assert!(!v.can_reset());

        let v = view(Some(b), Some(b));
        assert!(v.can_reset());

        let v = view(None, Some(b));
        assert!(!v.can_mutate());
        assert!(!v.is_owner());
    }

    #[test]
    fn test_view_display() {
        let a = Address::new([0xA0; 20]);
        let text = view(Some(a), None).to_string();
        assert!(text.contains("counter:  5"));
        assert!(text.contains("owner:    ..."));
    }
}
