// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider discovery and selection.
//!
//! Wallet extensions announce themselves independently. The registry keeps
//! every announced candidate and exactly one preferred provider:
//!
//! - the first announcement becomes preferred
//! - a later announcement displaces it only if it is a favored brand and the
//!   current preferred provider is not
//! - repeated announcements of the same provider are ignored
//!
//! When nothing was announced, [`ProviderRegistry::resolve`] falls back to the
//! legacy global injection points in a fixed priority order.
//!
//! The registry is an explicit instance owned by the composition root, so
//! independent sessions never share a preferred provider.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::provider::{Eip1193Provider, ProviderInfo, WalletType};

/// A callable provider plus its identity metadata.
#[derive(Clone)]
pub struct ProviderRecord {
    pub info: ProviderInfo,
    pub provider: Arc<dyn Eip1193Provider>,
}

impl ProviderRecord {
    pub fn new(provider: Arc<dyn Eip1193Provider>, info: ProviderInfo) -> Self {
        Self { info, provider }
    }

    pub fn wallet_type(&self) -> WalletType {
        self.info.wallet_type()
    }
}

impl fmt::Debug for ProviderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRecord")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Legacy global injection points, in fallback priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LegacySlot {
    /// `window.ethereum`
    Ethereum,
    /// `window.BinanceChain`
    BinanceChain,
    /// `window.trustwallet`
    TrustWallet,
}

#[derive(Default)]
struct RegistryInner {
    announced: Vec<ProviderRecord>,
    preferred: Option<usize>,
    legacy: BTreeMap<LegacySlot, ProviderRecord>,
}

/// Registry of announced providers with a single preferred entry.
pub struct ProviderRegistry {
    favored: WalletType,
    inner: Mutex<RegistryInner>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Create a registry that favors MetaMask.
    pub fn new() -> Self {
        Self::with_favored(WalletType::MetaMask)
    }

    /// Create a registry that favors the given wallet family.
    pub fn with_favored(favored: WalletType) -> Self {
        Self {
            favored,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // Bookkeeping only; a poisoned lock still holds consistent data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_favored(&self, record: &ProviderRecord) -> bool {
        record.wallet_type() == self.favored
    }

    /// Register an announced provider and apply the promotion policy.
    pub fn announce(&self, provider: Arc<dyn Eip1193Provider>, info: ProviderInfo) {
        let record = ProviderRecord::new(provider, info);
        let mut inner = self.lock();

        if inner
            .announced
            .iter()
            .any(|existing| existing.info.uuid == record.info.uuid)
        {
            tracing::debug!(name = %record.info.name, "Ignoring repeated provider announcement");
            return;
        }

        let promote = match inner.preferred {
            None => true,
            Some(index) => {
                let current = &inner.announced[index];
                self.is_favored(&record) && !self.is_favored(current)
            }
        };

        tracing::debug!(
            name = %record.info.name,
            rdns = %record.info.rdns,
            promote,
            "Provider announced"
        );

        inner.announced.push(record);
        if promote {
            inner.preferred = Some(inner.announced.len() - 1);
        }
    }

    /// The preferred announced provider, if any.
    pub fn get(&self) -> Option<ProviderRecord> {
        let inner = self.lock();
        inner.preferred.map(|index| inner.announced[index].clone())
    }

    /// Register a provider found at a legacy global injection point.
    pub fn set_legacy(&self, slot: LegacySlot, provider: Arc<dyn Eip1193Provider>, info: ProviderInfo) {
        self.lock().legacy.insert(slot, ProviderRecord::new(provider, info));
    }

    /// The preferred provider, falling back to legacy injection points.
    pub fn resolve(&self) -> Option<ProviderRecord> {
        if let Some(record) = self.get() {
            return Some(record);
        }
        self.lock().legacy.values().next().cloned()
    }

    /// Drop the preference and every announced handle.
    ///
    /// Providers announce again on the next discovery round. Legacy slots
    /// survive: they mirror fixed injection points that the host rewrites in
    /// place, so `resolve()` still finds them after a teardown.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.preferred = None;
        inner.announced.clear();
    }

    pub fn announced_count(&self) -> usize {
        self.lock().announced.len()
    }
}
