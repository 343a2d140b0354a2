//! # Adapters Layer (Outer Hexagon)
//!
//! - `provider`: account access and the shared signer
//! - `http`: JSON-RPC node provider
//! - `in_memory`: simulated chain for tests and demos

pub mod http;
pub mod in_memory;
pub mod provider;

pub use http::HttpProvider;
pub use in_memory::{InMemoryChain, RevertMode};
pub use provider::{ProviderAdapter, Signer, SignerChange};
