//! # Session Invariants
//!
//! | Invariant | Check |
//! |-----------|-------|
//! | Reset only from the owner's account (advisory, UI level) | [`check_owner_gate`] |
//! | One pending transaction per session | [`check_no_pending`] |
//! | Mutations need a connected wallet | [`check_connected`] |
//!
//! The owner gate does not replace on-chain authorization; the contract
//! still rejects a non-owner reset that bypasses it.

use crate::domain::entities::{MutationKind, PendingTransaction};
use crate::domain::value_objects::Address;
use crate::errors::SessionError;

/// Both addresses are known and equal. Address equality is byte-wise,
/// which is case-insensitive on the hex form.
#[must_use]
pub fn is_owner(wallet: Option<Address>, owner: Option<Address>) -> bool {
    matches!((wallet, owner), (Some(w), Some(o)) if w == o)
}

/// Rejects a mutation when no wallet is connected.
pub fn check_connected(wallet: Option<Address>) -> Result<Address, SessionError> {
    wallet.ok_or(SessionError::NotConnected)
}

/// Rejects an owner-only mutation from a non-owner (or unknown owner).
pub fn check_owner_gate(
    kind: MutationKind,
    wallet: Address,
    owner: Option<Address>,
) -> Result<(), SessionError> {
    if kind.requires_owner() && !is_owner(Some(wallet), owner) {
        return Err(SessionError::OwnerOnly);
    }
    Ok(())
}

/// Rejects a second mutation while one is in flight.
pub fn check_no_pending(pending: Option<&PendingTransaction>) -> Result<(), SessionError> {
    match pending {
        Some(existing) => Err(SessionError::TransactionPending(existing.kind)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_comparison_is_case_insensitive() {
        let lower: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        let checksummed: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        assert!(is_owner(Some(lower), Some(checksummed)));
        assert!(!is_owner(Some(lower), None));
        assert!(!is_owner(None, None));
    }

    #[test]
    fn test_owner_gate() {
        let a = Address::new([0xA; 20]);
        let b = Address::new([0xB; 20]);
        assert!(check_owner_gate(MutationKind::Increment, a, Some(b)).is_ok());
        assert!(check_owner_gate(MutationKind::Reset, b, Some(b)).is_ok());
        assert!(matches!(
            check_owner_gate(MutationKind::Reset, a, Some(b)),
            Err(SessionError::OwnerOnly)
        ));
        // Unknown owner never passes the gate
        assert!(matches!(
            check_owner_gate(MutationKind::Reset, a, None),
            Err(SessionError::OwnerOnly)
        ));
    }

    #[test]
    fn test_pending_and_connected_checks() {
        assert!(check_no_pending(None).is_ok());
        let pending = PendingTransaction::new(MutationKind::Decrement);
        assert!(matches!(
            check_no_pending(Some(&pending)),
            Err(SessionError::TransactionPending(MutationKind::Decrement))
        ));
        assert!(matches!(check_connected(None), Err(SessionError::NotConnected)));
    }
}
