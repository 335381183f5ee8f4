// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Connection State Machine
//!
//! Owns the wallet session: connecting, proving control of the account,
//! network switching, and reacting to provider events.
//!
//! ## States
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ ConnectedUnauthenticated
//!      ▲                        │                  │            ▲
//!      │                      error             sign_in     account change,
//!      │                        ▼                  ▼         sign_out, failure
//!      └──────────────── Disconnected        Authenticating ──ok──▶ Authenticated
//! ```
//!
//! `disconnect()` and a provider `disconnect` event return to `Disconnected`
//! from any state. `FrameBlocked` is terminal for the process: inside an
//! embedded frame no wallet prompt is ever issued.
//!
//! ## Concurrency
//!
//! - At most one connect and one sign-in run at a time. Overlapping calls
//!   return immediately without touching the provider.
//! - State lives in a `watch` channel. Every commit re-reads the current
//!   state, so a late result never overwrites a newer account, chain or
//!   teardown. The active provider, the token and the persisted copy are
//!   updated under the same lock as the state they belong to.
//! - The provider event listener is attached before the first request of a
//!   connect or restore. Account and chain reports that arrive while
//!   `Connecting` are held back and applied when the connection commits.
//! - The listener holds a weak reference to the machine and is dropped on
//!   teardown, so listeners never stack across reconnects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::{json, Value};
use tokio::sync::watch;

use super::backend::AuthBackend;
use super::error::{codes, WalletError};
use super::guard::RequestGuard;
use super::network::{parse_chain_id, to_hex_chain_id, unsupported_chain_warning, WalletConfig};
use super::persistence::{PersistedSession, SessionPersistence};
use super::provider::{EventSubscription, ProviderEvent, RequestArguments};
use super::registry::{ProviderRecord, ProviderRegistry};
use super::session::{ConnectionState, ConnectionStatus, StateError, WalletSession};
use crate::models::AuthResponse;

/// Host environment facts detected once at start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeContext {
    /// Running inside an embedded frame (iframe).
    pub embedded_frame: bool,
}

/// RAII in-flight marker for connect / sign-in.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Provider reports received before a connection committed.
#[derive(Debug, Default)]
struct PendingEvents {
    account: Option<String>,
    chain_id: Option<u64>,
}

struct Inner {
    config: WalletConfig,
    registry: Arc<ProviderRegistry>,
    backend: Arc<dyn AuthBackend>,
    persistence: Arc<dyn SessionPersistence>,
    state: watch::Sender<ConnectionState>,
    guard: RequestGuard,
    connecting: AtomicBool,
    signing_in: AtomicBool,
    active: Mutex<Option<ProviderRecord>>,
    subscription: Mutex<Option<EventSubscription>>,
    credentials: Mutex<Option<AuthResponse>>,
    pending: Mutex<PendingEvents>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Plain slots; a poisoned lock still holds consistent data.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Wallet connection and sign-in state machine.
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct ConnectionStateMachine {
    inner: Arc<Inner>,
}

impl ConnectionStateMachine {
    pub fn new(
        config: WalletConfig,
        registry: Arc<ProviderRegistry>,
        backend: Arc<dyn AuthBackend>,
        persistence: Arc<dyn SessionPersistence>,
        context: RuntimeContext,
    ) -> Self {
        let initial = if context.embedded_frame {
            tracing::warn!("Embedded frame detected; wallet connections are disabled");
            ConnectionState {
                status: ConnectionStatus::FrameBlocked,
                session: None,
                error: Some(StateError::from(&WalletError::FrameBlocked)),
            }
        } else {
            ConnectionState::default()
        };

        let (state, receiver) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                backend,
                persistence,
                state,
                guard: RequestGuard::new(receiver),
                connecting: AtomicBool::new(false),
                signing_in: AtomicBool::new(false),
                active: Mutex::new(None),
                subscription: Mutex::new(None),
                credentials: Mutex::new(None),
                pending: Mutex::new(PendingEvents::default()),
            }),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Snapshot of the current state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Session token of the current sign-in, if any.
    pub fn access_token(&self) -> Option<String> {
        lock(&self.inner.credentials)
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    pub fn credentials(&self) -> Option<AuthResponse> {
        lock(&self.inner.credentials).clone()
    }

    fn is_frame_blocked(&self) -> bool {
        self.inner.state.borrow().status == ConnectionStatus::FrameBlocked
    }

    fn active(&self) -> Option<ProviderRecord> {
        lock(&self.inner.active).clone()
    }

    fn chain_warning(&self, chain_id: u64) -> Option<StateError> {
        let canonical = self.inner.config.canonical_chain_id;
        (chain_id != canonical).then(|| unsupported_chain_warning(chain_id, canonical))
    }

    // =========================================================================
    // Connect
    // =========================================================================

    /// Request account access from the preferred provider.
    ///
    /// A call made while another connect is in flight returns `Ok(())`
    /// immediately and issues no provider request.
    pub async fn connect(&self) -> Result<(), WalletError> {
        if self.is_frame_blocked() {
            return Err(WalletError::FrameBlocked);
        }
        let Some(_flight) = InFlight::acquire(&self.inner.connecting) else {
            tracing::debug!("connect() already in flight");
            return Ok(());
        };
        if self.inner.state.borrow().is_connected() {
            return Ok(());
        }

        self.inner.state.send_modify(|s| {
            s.status = ConnectionStatus::Connecting;
            s.session = None;
            s.error = None;
        });

        let result = async {
            let record = self.inner.registry.resolve().ok_or(WalletError::NoProvider)?;
            self.listen(&record);
            let accounts = self
                .dispatch(&record, RequestArguments::bare("eth_requestAccounts"))
                .await?;
            let address = first_account(&accounts, "eth_requestAccounts")?;
            let chain_id = self.read_chain_id(&record).await?;
            Ok::<_, WalletError>((record, address, chain_id))
        }
        .await;

        match result {
            Ok((record, address, chain_id)) => {
                let session = WalletSession::connected(address, chain_id, record.wallet_type());
                self.commit_connection(record, session)
            }
            Err(e) => {
                tracing::info!(code = e.code(), error = %e, "Wallet connection failed");
                self.abandon_connection(Some(StateError::from(&e)));
                self.clear_persisted();
                Err(e)
            }
        }
    }

    /// Re-establish a persisted session without prompting the user.
    ///
    /// Returns `Ok(true)` when the wallet still exposes the persisted account.
    /// The restored session always requires a fresh sign-in.
    pub async fn restore(&self) -> Result<bool, WalletError> {
        if self.is_frame_blocked() {
            return Ok(false);
        }
        let saved = match self.inner.persistence.get() {
            Ok(Some(saved)) if saved.connected => saved,
            Ok(_) => return Ok(false),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted session");
                self.clear_persisted();
                return Ok(false);
            }
        };

        let Some(_flight) = InFlight::acquire(&self.inner.connecting) else {
            return Ok(false);
        };
        let Some(record) = self.inner.registry.resolve() else {
            return Ok(false);
        };
        if record.wallet_type() != saved.wallet_type {
            tracing::info!(
                saved = %saved.wallet_type,
                found = %record.wallet_type(),
                "Persisted session belongs to another wallet"
            );
            self.clear_persisted();
            return Ok(false);
        }

        // Claim the session before the first await; a disconnect from here
        // on moves the state away from `Connecting` and the commit refuses.
        let claimed = self.inner.state.send_if_modified(|s| {
            if s.status != ConnectionStatus::Disconnected {
                return false;
            }
            *s = ConnectionState {
                status: ConnectionStatus::Connecting,
                session: None,
                error: None,
            };
            true
        });
        if !claimed {
            return Ok(false);
        }
        self.listen(&record);

        let result = async {
            let accounts = self
                .dispatch(&record, RequestArguments::bare("eth_accounts"))
                .await?;
            let exposed = accounts
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .find(|a| a.eq_ignore_ascii_case(&saved.address))
                .map(str::to_string);
            let Some(address) = exposed else {
                return Ok(None);
            };
            let chain_id = self.read_chain_id(&record).await?;
            Ok::<_, WalletError>(Some((address, chain_id)))
        }
        .await;

        match result {
            Ok(Some((address, chain_id))) => {
                let session = WalletSession::connected(address, chain_id, record.wallet_type());
                if self.commit_connection(record, session).is_err() {
                    tracing::info!("Wallet session torn down during restore");
                    return Ok(false);
                }
                Ok(true)
            }
            Ok(None) => {
                tracing::info!("Persisted account is no longer exposed by the wallet");
                self.abandon_connection(None);
                self.clear_persisted();
                Ok(false)
            }
            Err(e) => {
                tracing::info!(code = e.code(), error = %e, "Session restore failed");
                self.abandon_connection(None);
                self.clear_persisted();
                Err(e)
            }
        }
    }

    fn commit_connection(
        &self,
        record: ProviderRecord,
        mut session: WalletSession,
    ) -> Result<(), WalletError> {
        let mut committed = None;
        self.inner.state.send_if_modified(|s| {
            // A disconnect raced the request; honor it.
            if s.status != ConnectionStatus::Connecting {
                return false;
            }
            let pending = std::mem::take(&mut *lock(&self.inner.pending));
            if let Some(account) = pending.account {
                session.address = account;
            }
            if let Some(chain_id) = pending.chain_id {
                session.chain_id = chain_id;
            }

            *lock(&self.inner.active) = Some(record);
            self.persist(&session);
            *s = ConnectionState {
                status: ConnectionStatus::ConnectedUnauthenticated,
                session: Some(session.clone()),
                error: self.chain_warning(session.chain_id),
            };
            committed = Some(session);
            true
        });

        let Some(session) = committed else {
            return Err(WalletError::NotConnected);
        };
        tracing::info!(
            address = %session.address,
            chain_id = session.chain_id,
            wallet = %session.wallet_type,
            "Wallet connected"
        );
        Ok(())
    }

    /// Return a connection attempt that is still `Connecting` to
    /// `Disconnected`.
    fn abandon_connection(&self, error: Option<StateError>) {
        self.inner.state.send_if_modified(|s| {
            if s.status != ConnectionStatus::Connecting {
                return false;
            }
            lock(&self.inner.subscription).take();
            *s = ConnectionState {
                status: ConnectionStatus::Disconnected,
                session: None,
                error,
            };
            true
        });
    }

    /// Start forwarding `record`'s events to the machine.
    ///
    /// Only installed while a connection attempt is still `Connecting`.
    fn listen(&self, record: &ProviderRecord) {
        let events = record.provider.subscribe();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let subscription = EventSubscription::spawn(events, move |event| match weak.upgrade() {
            Some(inner) => {
                ConnectionStateMachine { inner }.handle_provider_event(event);
                true
            }
            None => false,
        });

        let state = self.inner.state.borrow();
        if state.status == ConnectionStatus::Connecting {
            *lock(&self.inner.pending) = PendingEvents::default();
            // Replacing the slot drops (and stops) any previous listener.
            *lock(&self.inner.subscription) = Some(subscription);
        }
    }

    // =========================================================================
    // Sign-in
    // =========================================================================

    /// Prove control of the connected account and obtain a session token.
    ///
    /// A call made while another sign-in is in flight returns `Ok(())`
    /// immediately and issues no provider request.
    pub async fn sign_in(&self) -> Result<(), WalletError> {
        if self.is_frame_blocked() {
            return Err(WalletError::FrameBlocked);
        }
        let Some(_flight) = InFlight::acquire(&self.inner.signing_in) else {
            tracing::debug!("sign_in() already in flight");
            return Ok(());
        };

        let (address, chain_id) = {
            let state = self.inner.state.borrow();
            match state.session.as_ref() {
                Some(session) if state.is_connected() => (session.address.clone(), session.chain_id),
                _ => return Err(WalletError::NotConnected),
            }
        };
        let record = self.active().ok_or(WalletError::NotConnected)?;

        let warning = self.chain_warning(chain_id);
        self.inner.state.send_modify(|s| {
            s.status = ConnectionStatus::Authenticating;
            s.error = warning;
        });

        match self.prove_control(&record, &address, chain_id).await {
            Ok(auth) => self.commit_sign_in(&address, chain_id, auth),
            Err(e) => {
                tracing::info!(code = e.code(), error = %e, "Sign-in failed");
                self.inner.state.send_if_modified(|s| {
                    if s.status != ConnectionStatus::Authenticating {
                        return false;
                    }
                    s.status = ConnectionStatus::ConnectedUnauthenticated;
                    if let Some(session) = s.session.as_mut() {
                        session.demote();
                        self.persist(session);
                    }
                    lock(&self.inner.credentials).take();
                    s.error = Some(StateError::from(&e));
                    true
                });
                Err(e)
            }
        }
    }

    async fn prove_control(
        &self,
        record: &ProviderRecord,
        address: &str,
        chain_id: u64,
    ) -> Result<AuthResponse, WalletError> {
        let challenge = self
            .inner
            .backend
            .create_challenge(address, chain_id, None)
            .await?;

        let hex_message = format!("0x{}", alloy::hex::encode(challenge.message.as_bytes()));
        let signature = self
            .dispatch(
                record,
                RequestArguments::new("personal_sign", json!([hex_message, address])),
            )
            .await?;
        let signature = signature.as_str().ok_or_else(|| WalletError::InvalidResponse {
            method: "personal_sign".to_string(),
            detail: "signature is not a string".to_string(),
        })?;

        let auth = self.inner.backend.verify(&challenge.message, signature).await?;
        if !auth.primary_wallet.eq_ignore_ascii_case(address) {
            return Err(WalletError::SessionChanged);
        }
        Ok(auth)
    }

    fn commit_sign_in(
        &self,
        address: &str,
        chain_id: u64,
        auth: AuthResponse,
    ) -> Result<(), WalletError> {
        let mut committed = None;
        self.inner.state.send_if_modified(|s| {
            // Account changes and teardowns have already settled the state.
            if s.status != ConnectionStatus::Authenticating {
                return false;
            }
            let Some(session) = s.session.as_mut() else {
                return false;
            };

            if session.is_same_account(address) && session.chain_id == chain_id {
                session.mark_authenticated();
                s.status = ConnectionStatus::Authenticated;
                *lock(&self.inner.credentials) = Some(auth);
                committed = Some(session.clone());
            } else {
                // Only the chain moved; the proof is for another network.
                session.demote();
                s.status = ConnectionStatus::ConnectedUnauthenticated;
                lock(&self.inner.credentials).take();
            }
            self.persist(session);
            true
        });

        let Some(session) = committed else {
            tracing::info!("Wallet session changed during sign-in; result discarded");
            return Err(WalletError::SessionChanged);
        };
        tracing::info!(address = %session.address, "Wallet signed in");
        Ok(())
    }

    /// Drop the session token but stay connected.
    pub fn sign_out(&self) {
        let mut demoted = None;
        self.inner.state.send_if_modified(|s| {
            lock(&self.inner.credentials).take();
            if !s.is_connected() {
                return false;
            }
            s.status = ConnectionStatus::ConnectedUnauthenticated;
            if let Some(session) = s.session.as_mut() {
                session.demote();
                self.persist(session);
                demoted = Some(session.address.clone());
            }
            true
        });
        if let Some(address) = demoted {
            tracing::info!(%address, "Signed out");
        }
    }

    // =========================================================================
    // Disconnect
    // =========================================================================

    /// Tear down the session, forget the preferred provider and clear
    /// persisted state.
    pub fn disconnect(&self) {
        tracing::info!("Wallet disconnect requested");
        self.teardown(None);
    }

    fn teardown(&self, error: Option<StateError>) {
        self.inner.state.send_if_modified(|s| {
            lock(&self.inner.subscription).take();
            lock(&self.inner.active).take();
            lock(&self.inner.credentials).take();
            *lock(&self.inner.pending) = PendingEvents::default();
            self.inner.registry.clear();
            self.clear_persisted();

            if s.status == ConnectionStatus::FrameBlocked {
                return false;
            }
            *s = ConnectionState {
                status: ConnectionStatus::Disconnected,
                session: None,
                error,
            };
            true
        });
    }

    // =========================================================================
    // Networks
    // =========================================================================

    /// Ask the wallet to switch to `chain_id`, adding the network first when
    /// the wallet does not know it.
    ///
    /// If adding fails, the original switch error is returned.
    pub async fn switch_to_network(&self, chain_id: u64) -> Result<(), WalletError> {
        if self.is_frame_blocked() {
            return Err(WalletError::FrameBlocked);
        }
        let record = self.active().ok_or(WalletError::NotConnected)?;
        let switch = RequestArguments::new(
            "wallet_switchEthereumChain",
            json!([{ "chainId": to_hex_chain_id(chain_id) }]),
        );

        match self.dispatch(&record, switch.clone()).await {
            Ok(_) => {}
            Err(WalletError::Provider(original)) if original.is_chain_not_added() => {
                let Some(descriptor) = self.inner.config.network(chain_id).cloned() else {
                    return Err(WalletError::Provider(original));
                };
                tracing::info!(chain_id, "Network unknown to wallet; adding it");

                let add = RequestArguments::new("wallet_addEthereumChain", json!([descriptor]));
                if let Err(e) = self.dispatch(&record, add).await {
                    tracing::info!(chain_id, code = e.code(), "Adding network failed");
                    return Err(WalletError::Provider(original));
                }
                self.dispatch(&record, switch).await?;
            }
            Err(e) => return Err(e),
        }

        self.apply_chain(chain_id);
        Ok(())
    }

    // =========================================================================
    // Provider Access
    // =========================================================================

    /// Forward a request to the active provider through the request guard.
    pub async fn request(&self, args: RequestArguments) -> Result<Value, WalletError> {
        self.inner.guard.check(&args.method)?;
        if self.is_frame_blocked() {
            return Err(WalletError::FrameBlocked);
        }
        let record = self.active().ok_or(WalletError::NotConnected)?;
        self.dispatch(&record, args).await
    }

    async fn dispatch(
        &self,
        record: &ProviderRecord,
        args: RequestArguments,
    ) -> Result<Value, WalletError> {
        self.inner
            .guard
            .request(record.provider.as_ref(), args)
            .await
    }

    async fn read_chain_id(&self, record: &ProviderRecord) -> Result<u64, WalletError> {
        let value = self
            .dispatch(record, RequestArguments::bare("eth_chainId"))
            .await?;
        match &value {
            Value::String(raw) => parse_chain_id(raw),
            Value::Number(n) => n.as_u64().ok_or_else(|| invalid_chain(&value)),
            _ => Err(invalid_chain(&value)),
        }
    }

    // =========================================================================
    // Provider Events
    // =========================================================================

    /// Apply a provider event to the current state.
    pub fn handle_provider_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                Some(address) => self.apply_account(address),
                None => {
                    tracing::info!("Wallet exposes no accounts; disconnecting");
                    self.teardown(Some(StateError::new(
                        codes::DISCONNECTED,
                        "Wallet locked or account access revoked",
                    )));
                }
            },
            ProviderEvent::ChainChanged(raw) => match parse_chain_id(&raw) {
                Ok(chain_id) => self.apply_chain(chain_id),
                Err(e) => tracing::warn!(raw = %raw, error = %e, "Ignoring malformed chainChanged"),
            },
            ProviderEvent::Disconnect(reason) => {
                tracing::info!(?reason, "Provider disconnected");
                self.teardown(Some(StateError::from(&WalletError::ProviderDisconnected)));
            }
        }
    }

    fn apply_account(&self, address: &str) {
        let mut changed = false;
        self.inner.state.send_if_modified(|s| {
            if s.status == ConnectionStatus::Connecting {
                lock(&self.inner.pending).account = Some(address.to_string());
                return false;
            }
            if !s.is_connected() {
                return false;
            }
            let Some(session) = s.session.as_mut() else {
                return false;
            };
            if session.is_same_account(address) {
                return false;
            }
            session.address = address.to_string();
            session.demote();
            s.status = ConnectionStatus::ConnectedUnauthenticated;
            lock(&self.inner.credentials).take();
            self.persist(session);
            changed = true;
            true
        });

        if changed {
            tracing::info!(%address, "Active account changed; sign-in required");
        }
    }

    fn apply_chain(&self, chain_id: u64) {
        let warning = self.chain_warning(chain_id);
        let mut changed = false;
        self.inner.state.send_if_modified(|s| {
            if s.status == ConnectionStatus::Connecting {
                lock(&self.inner.pending).chain_id = Some(chain_id);
                return false;
            }
            if !s.is_connected() {
                return false;
            }
            let Some(session) = s.session.as_mut() else {
                return false;
            };
            if session.chain_id == chain_id {
                return false;
            }
            session.chain_id = chain_id;
            self.persist(session);
            changed = true;

            match &warning {
                Some(w) => s.error = Some(w.clone()),
                None => {
                    if s.error_code() == Some(codes::UNSUPPORTED_CHAIN) {
                        s.error = None;
                    }
                }
            }
            true
        });

        if changed {
            tracing::info!(chain_id, "Active chain changed");
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn persist(&self, session: &WalletSession) {
        if let Err(e) = self.inner.persistence.set(&PersistedSession::from(session)) {
            tracing::warn!(error = %e, "Failed to persist wallet session");
        }
    }

    fn clear_persisted(&self) {
        if let Err(e) = self.inner.persistence.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted wallet session");
        }
    }
}

fn first_account(value: &Value, method: &str) -> Result<String, WalletError> {
    value
        .as_array()
        .and_then(|a| a.first())
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| WalletError::InvalidResponse {
            method: method.to_string(),
            detail: "no accounts returned".to_string(),
        })
}

fn invalid_chain(value: &Value) -> WalletError {
    WalletError::InvalidResponse {
        method: "eth_chainId".to_string(),
        detail: format!("unexpected chain id {value}"),
    }
}
