// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side error types.
//!
//! Every failure that originates in a wallet provider is normalized into a
//! [`ProviderRpcError`] by the request guard before any caller sees it.
//! [`WalletError`] is the single error type returned by the connection
//! state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::BackendError;
use super::persistence::PersistenceError;

/// EIP-1193 / EIP-1474 error codes used across the client.
pub mod codes {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The method or account has not been authorized.
    pub const UNAUTHORIZED: i64 = 4100;
    /// The provider does not support (or refuses) the method.
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    /// The provider is disconnected from all chains.
    pub const DISCONNECTED: i64 = 4900;
    /// The provider is not connected to the requested / supported chain.
    pub const UNSUPPORTED_CHAIN: i64 = 4901;
    /// The requested chain has not been added to the wallet.
    pub const CHAIN_NOT_ADDED: i64 = 4902;
    /// A request of the same kind is already pending in the wallet UI.
    pub const RESOURCE_UNAVAILABLE: i64 = -32002;
    /// Invalid parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal provider error.
    pub const INTERNAL: i64 = -32603;
}

/// Normalized provider error: `{code, message, data?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_user_rejected(&self) -> bool {
        self.code == codes::USER_REJECTED
    }

    pub fn is_chain_not_added(&self) -> bool {
        self.code == codes::CHAIN_NOT_ADDED
    }
}

/// Raw, vendor-specific error as handed back by a provider implementation.
///
/// The shape is arbitrary (`{code, message}`, nested `data.originalError`,
/// bare strings, string codes, ...). Only the request guard inspects it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProviderError(pub Value);

impl From<Value> for RawProviderError {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for RawProviderError {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

/// Errors returned by the connection state machine.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// The method is on the hard denylist. Never retried.
    #[error("method `{method}` is blocked for security reasons")]
    SecurityViolation { method: String },

    /// The method requires a completed sign-in.
    #[error("method `{method}` requires an authenticated session")]
    AuthRequired { method: String },

    /// Normalized failure reported by the provider.
    #[error(transparent)]
    Provider(#[from] ProviderRpcError),

    /// No injected provider was found.
    #[error("no wallet provider found")]
    NoProvider,

    /// The operation requires a connected wallet.
    #[error("wallet is not connected")]
    NotConnected,

    /// Wallet prompts are disabled inside embedded frames.
    #[error("wallet connections are disabled inside embedded frames")]
    FrameBlocked,

    /// The provider disconnected and the session was torn down.
    #[error("wallet provider disconnected")]
    ProviderDisconnected,

    /// The connected account or chain changed while sign-in was in flight.
    #[error("wallet session changed during sign-in; sign in again")]
    SessionChanged,

    /// The provider answered with an unexpected payload.
    #[error("unexpected provider response for `{method}`: {detail}")]
    InvalidResponse { method: String, detail: String },

    /// The authentication backend rejected or failed the request.
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl WalletError {
    /// Numeric code exposed on the state's `error` slot.
    pub fn code(&self) -> i64 {
        match self {
            WalletError::SecurityViolation { .. } => codes::UNSUPPORTED_METHOD,
            WalletError::AuthRequired { .. } | WalletError::FrameBlocked => codes::UNAUTHORIZED,
            WalletError::Provider(e) => e.code,
            WalletError::NoProvider | WalletError::ProviderDisconnected => codes::DISCONNECTED,
            WalletError::NotConnected => codes::UNAUTHORIZED,
            WalletError::SessionChanged => codes::UNAUTHORIZED,
            WalletError::InvalidResponse { .. } => codes::INTERNAL,
            WalletError::Backend(_) => codes::UNAUTHORIZED,
            WalletError::Persistence(_) => codes::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_violation_maps_to_unsupported_method() {
        let err = WalletError::SecurityViolation {
            method: "eth_sign".to_string(),
        };
        assert_eq!(err.code(), codes::UNSUPPORTED_METHOD);
        assert!(err.to_string().contains("eth_sign"));
    }

    #[test]
    fn provider_error_keeps_its_code() {
        let err: WalletError = ProviderRpcError::new(codes::USER_REJECTED, "denied").into();
        assert_eq!(err.code(), 4001);
    }

    #[test]
    fn provider_error_serializes_without_empty_data() {
        let json = serde_json::to_string(&ProviderRpcError::new(4902, "add it")).unwrap();
        assert_eq!(json, r#"{"code":4902,"message":"add it"}"#);
    }
}
