// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Client
//!
//! Client-side half of wallet sign-in, written against the EIP-1193
//! provider interface so it can drive any injected wallet.
//!
//! ## Components
//!
//! - [`ProviderRegistry`]: discovered providers and the preferred one
//! - [`RequestGuard`]: method denylist, auth gate and error normalization
//! - [`ConnectionStateMachine`]: connect, sign-in, network switching and
//!   provider event handling
//! - [`SessionPersistence`]: survives restarts without re-prompting
//! - [`AuthBackend`]: the challenge/verify endpoints of the auth server
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = Arc::new(ProviderRegistry::new());
//! registry.announce(provider, ProviderInfo::new("MetaMask", "io.metamask"));
//!
//! let machine = ConnectionStateMachine::new(
//!     WalletConfig::default(),
//!     registry,
//!     Arc::new(HttpAuthBackend::new("https://auth.example.com")?),
//!     Arc::new(FilePersistence::new(session_path)),
//!     RuntimeContext::default(),
//! );
//!
//! if !machine.restore().await? {
//!     machine.connect().await?;
//! }
//! machine.sign_in().await?;
//! ```

pub mod backend;
pub mod connection;
pub mod error;
pub mod guard;
pub mod network;
pub mod persistence;
pub mod provider;
pub mod registry;
pub mod session;

pub use backend::{AuthBackend, BackendError, HttpAuthBackend};
pub use connection::{ConnectionStateMachine, RuntimeContext};
pub use error::{codes, ProviderRpcError, RawProviderError, WalletError};
pub use guard::RequestGuard;
pub use network::{NetworkDescriptor, WalletConfig, CANONICAL_CHAIN_ID};
pub use persistence::{
    FilePersistence, InMemoryPersistence, PersistedSession, PersistenceError, SessionPersistence,
};
pub use provider::{
    BrandFlags, Eip1193Provider, EventSubscription, ProviderEvent, ProviderInfo, RequestArguments,
    WalletType,
};
pub use registry::{LegacySlot, ProviderRecord, ProviderRegistry};
pub use session::{ConnectionState, ConnectionStatus, StateError, WalletSession};
