//! # Counter Session
//!
//! Wallet/contract session manager for an on-chain counter with an
//! owner-restricted reset.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 CounterSessionApi (inbound)                   │
//! │   connect · refresh · increment · decrement · reset · view    │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 │
//!                       ┌─────────▼─────────┐
//!                       │  CounterSession   │  snapshot + reconciliation
//!                       └──┬───────┬──────┬─┘
//!              ┌───────────┘       │      └────────────┐
//!     ┌────────▼────────┐ ┌────────▼───────┐ ┌─────────▼─────────┐
//!     │ ProviderAdapter │ │ContractBinding │ │TransactionExecutor│
//!     └────────┬────────┘ └────────┬───────┘ └─────────┬─────────┘
//!              └───────────────────┼───────────────────┘
//!                       ┌──────────▼──────────┐
//!                       │   Eip1193Provider   │  request(method, params)
//!                       └──────────┬──────────┘
//!                  HttpProvider ───┴─── InMemoryChain
//! ```
//!
//! ## Components
//!
//! | Component | Responsibility |
//! |-----------|----------------|
//! | `adapters::provider` | account access, single shared signer |
//! | `binding` | deployment check, typed `owner()` / `getCounter()` reads |
//! | `executor` | one pending transaction, submit, await receipt |
//! | `service` | session state, reconciliation, provider events |
//! | `config` | environment / TOML configuration |
//! | `telemetry` | tracing subscriber |
//!
//! ## Error Taxonomy
//!
//! | Error | Recoverable |
//! |-------|-------------|
//! | `NoProvider` | no |
//! | `UserRejected` | yes |
//! | `ContractNotDeployed` | no |
//! | `Reverted` | yes |
//! | `Network` | yes |
//! | `ReadFailure` | yes (field degrades) |

#![warn(missing_docs)]

pub mod adapters;
pub mod binding;
pub mod config;
pub mod domain;
pub mod errors;
pub mod executor;
pub mod ports;
pub mod service;
pub mod telemetry;

/// Prelude for convenient imports.
pub mod prelude {
    // Entities
    pub use crate::domain::entities::{
        ConfirmedTransaction, CounterSnapshot, MutationKind, PendingTransaction, ProviderEvent,
        SessionFault, SessionPhase, SessionView, TransactionResult, WalletSession,
    };

    // Value objects
    pub use crate::domain::value_objects::{Address, Bytes, TxHash, U256};

    // Interface descriptor
    pub use crate::domain::abi::{AbiFunction, ContractAbi, Token};

    // Ports
    pub use crate::ports::inbound::CounterSessionApi;
    pub use crate::ports::outbound::{methods, Eip1193Provider};

    // Errors
    pub use crate::errors::{codes, ConfigError, ErrorKind, ProviderRpcError, SessionError};

    // Adapters
    pub use crate::adapters::{HttpProvider, InMemoryChain, ProviderAdapter, RevertMode, Signer};

    // Components
    pub use crate::binding::{bind, ContractHandle, SignerOrProvider};
    pub use crate::executor::{ExecutorSettings, ExecutorStats, TransactionExecutor};
    pub use crate::service::{CounterSession, SessionSettings};

    // Configuration
    pub use crate::config::SessionConfig;
    pub use crate::telemetry::{init_tracing, TelemetryConfig};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
