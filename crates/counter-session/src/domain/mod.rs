//! # Domain Layer
//!
//! Pure types and rules. No I/O happens here.

pub mod abi;
pub mod entities;
pub mod invariants;
pub mod value_objects;

pub use abi::{AbiError, AbiFunction, ContractAbi, Token};
pub use entities::{
    ConfirmedTransaction, CounterSnapshot, MutationKind, PendingTransaction, ProviderEvent,
    SessionFault, SessionPhase, SessionView, TransactionResult, WalletSession,
};
pub use value_objects::{Address, Bytes, HexError, TxHash, U256};
