//! # Driving Ports (API - Inbound)
//!
//! What a UI collaborator calls. Every mutating operation returns only after
//! the transaction reached a definite outcome and the snapshot was
//! reconciled.

use crate::domain::entities::{ConfirmedTransaction, ProviderEvent, SessionView};
use crate::domain::value_objects::Address;
use crate::errors::SessionError;
use async_trait::async_trait;

/// Counter session API.
#[async_trait]
pub trait CounterSessionApi: Send + Sync {
    /// Requests account access and binds the contract to the signer.
    async fn connect(&self) -> Result<Address, SessionError>;

    /// Reads counter and owner and replaces the snapshot.
    async fn refresh(&self) -> Result<(), SessionError>;

    /// Submits `incrementCounter()`.
    async fn increment(&self) -> Result<ConfirmedTransaction, SessionError>;

    /// Submits `decrementCounter()`.
    async fn decrement(&self) -> Result<ConfirmedTransaction, SessionError>;

    /// Submits `resetCounter()` (owner only).
    async fn reset(&self) -> Result<ConfirmedTransaction, SessionError>;

    /// Applies an `accountsChanged` / `chainChanged` / `disconnect` event.
    async fn handle_provider_event(&self, event: ProviderEvent) -> Result<(), SessionError>;

    /// Consistent snapshot of the whole session.
    async fn view(&self) -> SessionView;
}
