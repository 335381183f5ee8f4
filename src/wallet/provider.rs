// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Injected signing provider abstraction (EIP-1193 shaped).
//!
//! A provider answers `request({method, params})` calls and emits
//! `accountsChanged`, `chainChanged` and `disconnect` events. Listeners are
//! modelled as [`EventSubscription`] handles that unsubscribe when dropped.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::error::RawProviderError;

/// Arguments of a provider `request` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestArguments {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RequestArguments {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// A call without parameters.
    pub fn bare(method: impl Into<String>) -> Self {
        Self::new(method, Value::Array(Vec::new()))
    }
}

/// Events pushed by a provider at any time.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    /// Hex-encoded chain id, e.g. `"0x38"`.
    ChainChanged(String),
    Disconnect(Option<Value>),
}

/// An injected signing provider.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    /// Issue an RPC call. May suspend until the user acts in the wallet UI.
    async fn request(&self, args: RequestArguments) -> Result<Value, RawProviderError>;

    /// Subscribe to provider events.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// Brand flags exposed by injected providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandFlags {
    pub is_meta_mask: bool,
    pub is_binance: bool,
    pub is_trust: bool,
    pub is_coinbase_wallet: bool,
}

/// Identity metadata announced alongside a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub uuid: String,
    pub name: String,
    /// Reverse-DNS identifier, e.g. `io.metamask`.
    pub rdns: String,
    #[serde(default)]
    pub flags: BrandFlags,
}

impl ProviderInfo {
    pub fn new(name: impl Into<String>, rdns: impl Into<String>) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            rdns: rdns.into(),
            flags: BrandFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: BrandFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Classify the wallet from its flags and announced identity.
    ///
    /// Several wallets also set `isMetaMask` for compatibility, so the more
    /// specific flags are checked first.
    pub fn wallet_type(&self) -> WalletType {
        let rdns = self.rdns.to_ascii_lowercase();
        if self.flags.is_binance || rdns.contains("binance") {
            WalletType::Binance
        } else if self.flags.is_trust || rdns.contains("trustwallet") {
            WalletType::TrustWallet
        } else if self.flags.is_coinbase_wallet || rdns.contains("coinbase") {
            WalletType::Coinbase
        } else if self.flags.is_meta_mask || rdns == "io.metamask" {
            WalletType::MetaMask
        } else {
            WalletType::Injected
        }
    }
}

/// Wallet family of the connected provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    MetaMask,
    Binance,
    TrustWallet,
    Coinbase,
    Injected,
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletType::MetaMask => write!(f, "metamask"),
            WalletType::Binance => write!(f, "binance"),
            WalletType::TrustWallet => write!(f, "trustwallet"),
            WalletType::Coinbase => write!(f, "coinbase"),
            WalletType::Injected => write!(f, "injected"),
        }
    }
}

/// Live listener on a provider's event stream.
///
/// Dropping the handle stops the listener, so a torn-down session never keeps
/// receiving events and reconnects never stack listeners.
pub struct EventSubscription {
    task: JoinHandle<()>,
}

impl EventSubscription {
    /// Forward every event to `on_event` until it returns `false` or the
    /// provider closes the stream.
    pub fn spawn<F>(mut events: broadcast::Receiver<ProviderEvent>, mut on_event: F) -> Self
    where
        F: FnMut(ProviderEvent) -> bool + Send + 'static,
    {
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if !on_event(event) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Provider event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Self { task }
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn binance_flag_wins_over_metamask_compat_flag() {
        let info = ProviderInfo::new("Binance Wallet", "com.binance.wallet").with_flags(BrandFlags {
            is_meta_mask: true,
            is_binance: true,
            ..Default::default()
        });
        assert_eq!(info.wallet_type(), WalletType::Binance);
    }

    #[test]
    fn metamask_by_rdns() {
        let info = ProviderInfo::new("MetaMask", "io.metamask");
        assert_eq!(info.wallet_type(), WalletType::MetaMask);
        assert_eq!(WalletType::MetaMask.to_string(), "metamask");
    }

    #[tokio::test]
    async fn dropping_subscription_stops_delivery() {
        let (tx, rx) = broadcast::channel(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let sub = EventSubscription::spawn(rx, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        tx.send(ProviderEvent::ChainChanged("0x38".into())).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        drop(sub);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        // The receiver was dropped with the aborted task.
        assert!(tx.send(ProviderEvent::ChainChanged("0x1".into())).is_err());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
