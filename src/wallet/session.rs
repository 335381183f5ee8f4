// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Externally observable session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::WalletError;
use super::provider::WalletType;
use crate::models::ChainType;

/// Connection / authentication status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    ConnectedUnauthenticated,
    Authenticating,
    Authenticated,
    /// Running inside an embedded frame; wallet prompts are refused.
    FrameBlocked,
}

/// Non-fatal or terminal error attached to the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateError {
    pub code: i64,
    pub message: String,
}

impl StateError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&WalletError> for StateError {
    fn from(err: &WalletError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// The connected wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    pub address: String,
    pub chain_id: u64,
    pub chain_type: ChainType,
    pub wallet_type: WalletType,
    pub authenticated: bool,
    pub needs_auth: bool,
    pub connected_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticated_at: Option<DateTime<Utc>>,
}

impl WalletSession {
    /// A freshly connected EVM session; proof of control is still required.
    pub fn connected(address: impl Into<String>, chain_id: u64, wallet_type: WalletType) -> Self {
        Self {
            address: address.into(),
            chain_id,
            chain_type: ChainType::Evm,
            wallet_type,
            authenticated: false,
            needs_auth: true,
            connected_at: Utc::now(),
            authenticated_at: None,
        }
    }

    pub fn mark_authenticated(&mut self) {
        self.authenticated = true;
        self.needs_auth = false;
        self.authenticated_at = Some(Utc::now());
    }

    /// Force a new proof of control.
    pub fn demote(&mut self) {
        self.authenticated = false;
        self.needs_auth = true;
        self.authenticated_at = None;
    }

    pub fn is_same_account(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}

/// Snapshot published by the connection state machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub session: Option<WalletSession>,
    pub error: Option<StateError>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
            && matches!(
                self.status,
                ConnectionStatus::ConnectedUnauthenticated
                    | ConnectionStatus::Authenticating
                    | ConnectionStatus::Authenticated
            )
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == ConnectionStatus::Authenticated
            && self.session.as_ref().is_some_and(|s| s.authenticated)
    }

    pub fn needs_auth(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.needs_auth)
    }

    pub fn address(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.address.as_str())
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.chain_id)
    }

    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_disconnected() {
        let state = ConnectionState::default();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(!state.is_connected());
        assert!(!state.is_authenticated());
        assert_eq!(state.address(), None);
    }

    #[test]
    fn demote_requires_new_proof() {
        let mut session = WalletSession::connected("0xAbC", 56, WalletType::MetaMask);
        session.mark_authenticated();
        assert!(session.authenticated && !session.needs_auth);

        session.demote();
        assert!(!session.authenticated);
        assert!(session.needs_auth);
        assert!(session.is_same_account("0xabc"));
    }

    #[test]
    fn authenticated_requires_status_and_flag() {
        let mut session = WalletSession::connected("0xabc", 56, WalletType::Injected);
        session.mark_authenticated();
        let state = ConnectionState {
            status: ConnectionStatus::ConnectedUnauthenticated,
            session: Some(session),
            error: None,
        };
        assert!(!state.is_authenticated());
        assert!(state.is_connected());
    }
}
