//! # Counter Session Service
//!
//! Single source of truth for what the UI renders. Composes the provider
//! adapter, contract binding and transaction executor, and reconciles the
//! snapshot from chain state after every connection and every transaction
//! outcome.
//!
//! ## Mutation Flow
//!
//! 1. connected-wallet guard (`NotConnected`)
//! 2. owner gate for reset (`OwnerOnly`), before the executor is touched
//! 3. pending slot (`TransactionPending`), before the provider is touched
//! 4. submit and wait for a definite outcome
//! 5. reconcile, record any failure, then release the slot
//!
//! Failures are recorded in the snapshot for display and also returned.

use crate::adapters::provider::{ProviderAdapter, Signer, SignerChange};
use crate::binding::{bind, ContractHandle, SignerOrProvider};
use crate::config::SessionConfig;
use crate::domain::abi::ContractAbi;
use crate::domain::entities::{
    ConfirmedTransaction, CounterSnapshot, MutationKind, ProviderEvent, SessionFault,
    SessionPhase, SessionView, WalletSession,
};
use crate::domain::invariants;
use crate::domain::value_objects::Address;
use crate::errors::{ConfigError, SessionError};
use crate::executor::{ExecutorSettings, ExecutorStats, PendingSlot, TransactionExecutor};
use crate::ports::inbound::CounterSessionApi;
use crate::ports::outbound::Eip1193Provider;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Deployed counter.
    pub contract_address: Address,
    /// Chain the wallet must be on, if any.
    pub expected_chain_id: Option<u64>,
    /// Confirmation bounds.
    pub executor: ExecutorSettings,
}

impl SessionSettings {
    /// Settings for `contract_address` with default bounds.
    #[must_use]
    pub fn new(contract_address: Address) -> Self {
        Self {
            contract_address,
            expected_chain_id: None,
            executor: ExecutorSettings::default(),
        }
    }

    /// Validates `config` and derives the settings.
    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            contract_address: config.contract_address()?,
            expected_chain_id: config.expected_chain_id,
            executor: config.executor_settings(),
        })
    }
}

#[derive(Debug, Default)]
struct SessionInner {
    wallet: WalletSession,
    snapshot: CounterSnapshot,
    /// Bound to the current signer.
    handle: Option<ContractHandle>,
    /// Read-only binding used before a wallet connects.
    read_handle: Option<ContractHandle>,
}

/// The counter session.
pub struct CounterSession {
    settings: SessionSettings,
    abi: Arc<ContractAbi>,
    adapter: ProviderAdapter,
    executor: TransactionExecutor,
    state: RwLock<SessionInner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl CounterSession {
    /// Creates a disconnected session. `provider` is `None` when no wallet
    /// was injected.
    pub fn new(
        settings: SessionSettings,
        abi: ContractAbi,
        provider: Option<Arc<dyn Eip1193Provider>>,
    ) -> Self {
        Self {
            executor: TransactionExecutor::new(settings.executor),
            settings,
            abi: Arc::new(abi),
            adapter: ProviderAdapter::new(provider),
            state: RwLock::new(SessionInner::default()),
            listener: Mutex::new(None),
        }
    }

    /// Builds a session from validated configuration.
    pub fn from_config(
        config: &SessionConfig,
        provider: Option<Arc<dyn Eip1193Provider>>,
    ) -> Result<Self, ConfigError> {
        let settings = SessionSettings::from_config(config)?;
        let abi = config.load_abi()?;
        Ok(Self::new(settings, abi, provider))
    }

    /// Session parameters.
    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Executor outcome counters.
    #[must_use]
    pub fn executor_stats(&self) -> ExecutorStats {
        self.executor.stats()
    }

    /// Starts listening for provider events and connects immediately.
    pub async fn start(self: &Arc<Self>) -> Result<Address, SessionError> {
        if self.listen_for_events() {
            debug!("listening for provider events");
        }
        self.connect().await
    }

    /// Spawns the task applying provider-pushed events to this session,
    /// replacing any previous one.
    ///
    /// Returns `false` when the provider cannot push events. The task is
    /// aborted when the session is dropped.
    pub fn listen_for_events(self: &Arc<Self>) -> bool {
        let Some(mut events) = self.adapter.subscribe() else {
            return false;
        };
        let session = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(session) = session.upgrade() else {
                            break;
                        };
                        if let Err(e) = session.handle_provider_event(event).await {
                            debug!(error = %e, "provider event left an error");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "provider events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        if let Some(previous) = self.listener.lock().replace(task) {
            previous.abort();
        }
        true
    }

    /// True while the event listener task is running.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        matches!(&*self.listener.lock(), Some(task) if !task.is_finished())
    }

    /// Forgets the wallet. The snapshot stays on display.
    pub async fn disconnect(&self) {
        self.adapter.disconnect();
        let mut state = self.state.write().await;
        state.wallet.reset();
        state.handle = None;
        info!("wallet disconnected");
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn record(&self, fault: SessionFault) {
        self.state.write().await.snapshot.record_error(fault);
    }

    fn check_network(&self, chain_id: u64) -> Result<(), SessionError> {
        match self.settings.expected_chain_id {
            Some(expected) if expected != chain_id => {
                error!(expected, actual = chain_id, "wallet is on the wrong network");
                Err(SessionError::WrongNetwork {
                    expected,
                    actual: chain_id,
                })
            }
            _ => Ok(()),
        }
    }

    async fn bind_signer(&self, signer: Signer) -> Result<ContractHandle, SessionError> {
        self.check_network(signer.chain_id())?;
        let handle = bind(
            self.settings.contract_address,
            self.abi.clone(),
            SignerOrProvider::Signer(signer),
        )
        .await?;
        self.state.write().await.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Handle bound to the current signer, rebinding when needed.
    async fn signer_handle(&self) -> Result<ContractHandle, SessionError> {
        let cached = self.state.read().await.handle.clone();
        if let Some(handle) = cached {
            return Ok(handle);
        }
        let signer = self.adapter.signer().ok_or(SessionError::NotConnected)?;
        self.bind_signer(signer).await
    }

    /// Handle for reads: the signer's when connected, else read-only.
    async fn read_handle(&self) -> Result<ContractHandle, SessionError> {
        let cached = {
            let state = self.state.read().await;
            state.handle.clone().or_else(|| state.read_handle.clone())
        };
        if let Some(handle) = cached {
            return Ok(handle);
        }
        if let Some(signer) = self.adapter.signer() {
            return self.bind_signer(signer).await;
        }
        let handle = bind(
            self.settings.contract_address,
            self.abi.clone(),
            SignerOrProvider::Provider(self.adapter.read_provider()?),
        )
        .await?;
        self.state.write().await.read_handle = Some(handle.clone());
        Ok(handle)
    }

    /// Re-reads owner and counter.
    ///
    /// Both reads run concurrently. A failed owner read degrades to
    /// "unknown owner"; a failed counter read leaves the snapshot as it was
    /// and records a `ReadFailure`.
    async fn reconcile(&self) -> Result<(), SessionError> {
        let handle = match self.read_handle().await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "reconciliation could not bind the contract");
                self.record(SessionFault::from(&e)).await;
                return Err(e);
            }
        };

        let (owner, counter) = tokio::join!(handle.owner(), handle.get_counter());

        let mut state = self.state.write().await;
        match counter {
            Ok(value) => {
                let owner = match owner {
                    Ok(owner) => Some(owner),
                    Err(e) => {
                        warn!(error = %e, "owner unavailable, showing unknown owner");
                        None
                    }
                };
                state.snapshot.replace(value, owner);
                info!(counter = %value, owner = ?owner, "snapshot reconciled");
                Ok(())
            }
            Err(e) => {
                let err = SessionError::ReadFailure {
                    field: "counter",
                    reason: e.to_string(),
                };
                warn!(error = %err, "counter read failed, snapshot kept");
                state.snapshot.record_error(SessionFault::from(&err));
                Err(err)
            }
        }
    }

    /// Runs the guards and takes the pending slot.
    async fn admit(&self, kind: MutationKind) -> Result<PendingSlot<'_>, SessionError> {
        let (wallet, owner) = {
            let state = self.state.read().await;
            (state.wallet.address, state.snapshot.owner_address)
        };
        let wallet = invariants::check_connected(wallet)?;
        if let Err(e) = invariants::check_owner_gate(kind, wallet, owner) {
            warn!(address = %wallet, owner = ?owner, "reset blocked, wallet is not the owner");
            return Err(e);
        }
        self.executor.begin(kind)
    }

    #[instrument(skip(self))]
    async fn mutate(&self, kind: MutationKind) -> Result<ConfirmedTransaction, SessionError> {
        let slot = match self.admit(kind).await {
            Ok(slot) => slot,
            Err(e) => {
                self.record(SessionFault::for_action(kind.label(), &e)).await;
                return Err(e);
            }
        };

        let submitted = match self.signer_handle().await {
            Ok(handle) => {
                self.executor
                    .submit(&slot, &handle, kind.method_name(), &[])
                    .await
            }
            Err(e) => Err(e),
        };
        let outcome = match submitted {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record(SessionFault::for_action(kind.label(), &e)).await;
                return Err(e);
            }
        };

        // The slot stays taken until the snapshot reflects the outcome.
        // A read failure here is already recorded.
        let _ = self.reconcile().await;
        let result = outcome.into_result();
        if let Err(e) = &result {
            self.record(SessionFault::for_action(kind.label(), e)).await;
        }
        drop(slot);
        result
    }

    async fn rebind_and_reconcile(&self) -> Result<(), SessionError> {
        if self.adapter.signer().is_some() {
            if let Err(e) = self.signer_handle().await {
                self.record(SessionFault::from(&e)).await;
                return Err(e);
            }
        }
        self.reconcile().await
    }
}

impl Drop for CounterSession {
    fn drop(&mut self) {
        if let Some(task) = self.listener.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for CounterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterSession")
            .field("settings", &self.settings)
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CounterSessionApi for CounterSession {
    #[instrument(skip(self))]
    async fn connect(&self) -> Result<Address, SessionError> {
        self.state.write().await.wallet.is_connecting = true;

        let connected = self.adapter.connect().await;
        {
            let mut state = self.state.write().await;
            state.wallet.is_connecting = false;
            if let Ok(signer) = &connected {
                state.wallet.address = Some(signer.address());
                state.handle = None;
            }
        }

        let signer = match connected {
            Ok(signer) => signer,
            Err(e) => {
                warn!(error = %e, "connect failed");
                self.record(SessionFault::for_action("connect", &e)).await;
                return Err(e);
            }
        };
        let address = signer.address();

        if let Err(e) = self.bind_signer(signer).await {
            self.record(SessionFault::for_action("connect", &e)).await;
            return Err(e);
        }
        let _ = self.reconcile().await;
        Ok(address)
    }

    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<(), SessionError> {
        self.reconcile().await
    }

    async fn increment(&self) -> Result<ConfirmedTransaction, SessionError> {
        self.mutate(MutationKind::Increment).await
    }

    async fn decrement(&self) -> Result<ConfirmedTransaction, SessionError> {
        self.mutate(MutationKind::Decrement).await
    }

    async fn reset(&self) -> Result<ConfirmedTransaction, SessionError> {
        self.mutate(MutationKind::Reset).await
    }

    #[instrument(skip(self))]
    async fn handle_provider_event(&self, event: ProviderEvent) -> Result<(), SessionError> {
        match self.adapter.apply_event(&event) {
            SignerChange::Unchanged => Ok(()),
            SignerChange::Removed => {
                let mut state = self.state.write().await;
                state.wallet.reset();
                state.handle = None;
                Ok(())
            }
            SignerChange::Replaced(signer) => {
                {
                    let mut state = self.state.write().await;
                    state.wallet.address = Some(signer.address());
                    state.handle = None;
                }
                self.rebind_and_reconcile().await
            }
            SignerChange::ChainSwitched(_) => {
                {
                    let mut state = self.state.write().await;
                    state.handle = None;
                    state.read_handle = None;
                }
                self.rebind_and_reconcile().await
            }
        }
    }

    async fn view(&self) -> SessionView {
        let state = self.state.read().await;
        let pending = self.executor.pending();
        let phase = if state.wallet.is_connecting {
            SessionPhase::Connecting
        } else {
            match (state.wallet.address, &pending) {
                (Some(address), Some(tx)) => SessionPhase::Pending {
                    address,
                    kind: tx.kind,
                },
                (Some(address), None) => SessionPhase::Connected(address),
                (None, _) => SessionPhase::Disconnected,
            }
        };
        SessionView {
            phase,
            wallet: state.wallet.clone(),
            snapshot: state.snapshot.clone(),
            pending,
            contract_address: self.settings.contract_address,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::{InMemoryChain, ONLY_OWNER_REASON};
    use crate::domain::value_objects::U256;
    use crate::errors::ErrorKind;
    use crate::ports::outbound::methods;
    use std::time::Duration;

    fn account(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn session_for(chain: &Arc<InMemoryChain>, contract: Address) -> CounterSession {
        let mut settings = SessionSettings::new(contract);
        settings.executor.poll_interval = Duration::from_millis(5);
        CounterSession::new(
            settings,
            ContractAbi::counter().unwrap(),
            Some(chain.clone() as Arc<dyn Eip1193Provider>),
        )
    }

    #[tokio::test]
    async fn test_connect_reconciles() {
        let chain = Arc::new(InMemoryChain::new(31337, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xB));
        chain.set_counter(contract, U256::from(5u64));
        let session = session_for(&chain, contract);

        assert_eq!(session.connect().await.unwrap(), account(0xA));
        let view = session.view().await;
        assert_eq!(view.phase, SessionPhase::Connected(account(0xA)));
        assert_eq!(view.snapshot.value, Some(U256::from(5u64)));
        assert_eq!(view.snapshot.owner_address, Some(account(0xB)));
        assert!(!view.is_owner());
    }

    #[tokio::test]
    async fn test_no_provider() {
        let session = CounterSession::new(
            SessionSettings::new(account(0xC)),
            ContractAbi::counter().unwrap(),
            None,
        );
        assert!(matches!(
            session.connect().await,
            Err(SessionError::NoProvider)
        ));
        let view = session.view().await;
        assert_eq!(view.phase, SessionPhase::Disconnected);
        assert_eq!(view.snapshot.last_error_kind(), Some(ErrorKind::NoProvider));
    }

    #[tokio::test]
    async fn test_contract_not_deployed_on_connect() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let session = session_for(&chain, account(0x99));

        assert!(matches!(
            session.connect().await,
            Err(SessionError::ContractNotDeployed { .. })
        ));
        let view = session.view().await;
        assert_eq!(
            view.snapshot.last_error_kind(),
            Some(ErrorKind::ContractNotDeployed)
        );
        assert!(view.snapshot.value.is_none());
    }

    #[tokio::test]
    async fn test_wrong_network() {
        let chain = Arc::new(InMemoryChain::new(5, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        let mut settings = SessionSettings::new(contract);
        settings.expected_chain_id = Some(1);
        let session = CounterSession::new(
            settings,
            ContractAbi::counter().unwrap(),
            Some(chain.clone() as Arc<dyn Eip1193Provider>),
        );

        assert!(matches!(
            session.connect().await,
            Err(SessionError::WrongNetwork {
                expected: 1,
                actual: 5
            })
        ));
        assert_eq!(chain.request_count(methods::GET_CODE), 0);
    }

    #[tokio::test]
    async fn test_refresh_without_wallet_uses_read_only_binding() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xB));
        chain.set_counter(contract, U256::from(3u64));
        let session = session_for(&chain, contract);

        session.refresh().await.unwrap();
        let view = session.view().await;
        assert_eq!(view.phase, SessionPhase::Disconnected);
        assert_eq!(view.snapshot.value, Some(U256::from(3u64)));
        assert_eq!(chain.request_count(methods::REQUEST_ACCOUNTS), 0);
    }

    #[tokio::test]
    async fn test_mutation_requires_wallet() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        let session = session_for(&chain, contract);

        assert!(matches!(
            session.increment().await,
            Err(SessionError::NotConnected)
        ));
        assert!(chain.requests().is_empty());
        assert_eq!(
            session.view().await.last_error(),
            Some("connect a wallet first")
        );
    }

    #[tokio::test]
    async fn test_owner_reset() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        chain.set_counter(contract, U256::from(9u64));
        let session = session_for(&chain, contract);
        session.connect().await.unwrap();

        assert!(session.view().await.can_reset());
        session.reset().await.unwrap();
        assert_eq!(session.view().await.snapshot.value, Some(U256::zero()));
    }

    #[tokio::test]
    async fn test_decrement_underflow_reverts() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        let session = session_for(&chain, contract);
        session.connect().await.unwrap();

        assert!(matches!(
            session.decrement().await,
            Err(SessionError::Reverted { .. })
        ));
        let view = session.view().await;
        assert_eq!(view.snapshot.value, Some(U256::zero()));
        assert!(view
            .last_error()
            .unwrap()
            .starts_with("decrement failed: transaction reverted"));
    }

    #[tokio::test]
    async fn test_signature_rejection_recorded() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        let session = session_for(&chain, contract);
        session.connect().await.unwrap();
        chain.set_reject_signing(true);

        assert!(matches!(
            session.increment().await,
            Err(SessionError::UserRejected)
        ));
        let view = session.view().await;
        assert_eq!(view.last_error(), Some("increment failed: request rejected in wallet"));
        assert!(view.pending.is_none());
        assert_eq!(session.executor_stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_account_switch_rebinds() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA), account(0xB)]));
        let contract = chain.deploy_counter(account(0xB));
        let session = session_for(&chain, contract);
        session.connect().await.unwrap();
        assert!(!session.view().await.is_owner());

        session
            .handle_provider_event(ProviderEvent::AccountsChanged(vec![account(0xB)]))
            .await
            .unwrap();
        let view = session.view().await;
        assert_eq!(view.wallet.address, Some(account(0xB)));
        assert!(view.is_owner());

        // Owner can now reset through the rebound handle
        session.reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_accounts_revoked_disconnects() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        let session = session_for(&chain, contract);
        session.connect().await.unwrap();

        session
            .handle_provider_event(ProviderEvent::AccountsChanged(vec![]))
            .await
            .unwrap();
        let view = session.view().await;
        assert_eq!(view.phase, SessionPhase::Disconnected);
        // Last reconciled values stay visible
        assert_eq!(view.snapshot.value, Some(U256::zero()));
    }

    #[tokio::test]
    async fn test_chain_switch_rechecks_deployment() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        let session = session_for(&chain, contract);
        session.connect().await.unwrap();

        chain.switch_chain(5);
        let err = session
            .handle_provider_event(ProviderEvent::ChainChanged(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ContractNotDeployed { .. }));

        chain.switch_chain(1);
        session
            .handle_provider_event(ProviderEvent::ChainChanged(1))
            .await
            .unwrap();
        assert!(session.view().await.last_error().is_none());
    }

    #[tokio::test]
    async fn test_event_listener_applies_pushed_events() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        let session = Arc::new(session_for(&chain, contract));
        session.start().await.unwrap();

        chain.disconnect();
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.view().await.wallet.is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(session.view().await.phase, SessionPhase::Disconnected);
    }

    async fn wait_until<F: Fn(&SessionView) -> bool>(session: &CounterSession, done: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(&session.view().await) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_pushed_account_changes_are_applied() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA), account(0xB)]));
        let contract = chain.deploy_counter(account(0xB));
        let session = Arc::new(session_for(&chain, contract));
        session.start().await.unwrap();
        assert!(session.is_listening());
        assert!(!session.view().await.is_owner());

        chain.switch_account(account(0xB));
        wait_until(&session, |view| view.wallet.address == Some(account(0xB))).await;
        assert!(session.view().await.is_owner());
        session.reset().await.unwrap();

        chain.revoke_accounts();
        wait_until(&session, |view| !view.wallet.is_connected()).await;
        let view = session.view().await;
        assert_eq!(view.phase, SessionPhase::Disconnected);
        assert_eq!(view.snapshot.value, Some(U256::zero()));
    }

    #[tokio::test]
    async fn test_listener_stops_with_session() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        let session = Arc::new(session_for(&chain, contract));
        session.start().await.unwrap();
        assert_eq!(chain.subscriber_count(), 1);

        // A second listener replaces the first
        assert!(session.listen_for_events());
        tokio::time::timeout(Duration::from_secs(5), async {
            while chain.subscriber_count() != 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        drop(session);
        tokio::time::timeout(Duration::from_secs(5), async {
            while chain.subscriber_count() != 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_on_wrong_network_reports_it() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        chain.set_counter(contract, U256::from(4u64));
        let mut settings = SessionSettings::new(contract);
        settings.expected_chain_id = Some(1);
        let session = CounterSession::new(
            settings,
            ContractAbi::counter().unwrap(),
            Some(chain.clone() as Arc<dyn Eip1193Provider>),
        );
        session.connect().await.unwrap();

        session
            .handle_provider_event(ProviderEvent::ChainChanged(5))
            .await
            .unwrap_err();
        // No read-only fallback: the last snapshot stays and the error repeats
        assert!(matches!(
            session.refresh().await,
            Err(SessionError::WrongNetwork {
                expected: 1,
                actual: 5
            })
        ));
        let view = session.view().await;
        assert_eq!(view.snapshot.value, Some(U256::from(4u64)));
        assert_eq!(view.snapshot.last_error_kind(), Some(ErrorKind::WrongNetwork));
    }

    #[tokio::test]
    async fn test_explicit_disconnect() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xA));
        let session = session_for(&chain, contract);
        session.connect().await.unwrap();
        session.disconnect().await;

        assert_eq!(session.view().await.phase, SessionPhase::Disconnected);
        assert!(matches!(
            session.increment().await,
            Err(SessionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_revert_reason_in_message() {
        let chain = Arc::new(InMemoryChain::new(1, vec![account(0xA)]));
        let contract = chain.deploy_counter(account(0xB));
        let session = session_for(&chain, contract);
        session.connect().await.unwrap();

        // Let the local gate pass so the contract itself rejects the reset
        session.state.write().await.snapshot.owner_address = Some(account(0xA));
        assert!(matches!(
            session.reset().await,
            Err(SessionError::Reverted { .. })
        ));
        let message = session.view().await.last_error().unwrap().to_string();
        assert!(message.contains(ONLY_OWNER_REASON));
    }
}
