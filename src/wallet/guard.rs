// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The single code path allowed to call into a provider.
//!
//! Before dispatch:
//! - methods on [`DENIED_METHODS`] fail with `SecurityViolation`, in every
//!   session state
//! - methods on [`GATED_METHODS`] fail with `AuthRequired` unless the session
//!   is authenticated
//!
//! After dispatch, whatever error shape the provider produced is normalized
//! into a [`ProviderRpcError`]. Raw vendor errors never leave this module.

use serde_json::Value;
use tokio::sync::watch;

use super::error::{codes, ProviderRpcError, RawProviderError, WalletError};
use super::provider::{Eip1193Provider, RequestArguments};
use super::session::ConnectionState;

/// Methods with ambiguous or unsafe signing semantics. Never dispatched.
pub const DENIED_METHODS: &[&str] = &["eth_sign", "eth_signTypedData"];

/// Typed-data signing, allowed only after sign-in.
pub const GATED_METHODS: &[&str] = &["eth_signTypedData_v3", "eth_signTypedData_v4"];

/// Fallback `(method, code, message)` when the raw error carries neither a
/// usable code nor a recognizable message.
const METHOD_FALLBACKS: &[(&str, i64, &str)] = &[
    ("eth_requestAccounts", codes::USER_REJECTED, "Account access was not granted"),
    ("eth_accounts", codes::UNAUTHORIZED, "Accounts are not available"),
    ("eth_chainId", codes::DISCONNECTED, "Chain id could not be read"),
    ("personal_sign", codes::USER_REJECTED, "Signature request was not completed"),
    ("eth_signTypedData_v3", codes::USER_REJECTED, "Signature request was not completed"),
    ("eth_signTypedData_v4", codes::USER_REJECTED, "Signature request was not completed"),
    ("wallet_switchEthereumChain", codes::CHAIN_NOT_ADDED, "Chain is not available in the wallet"),
    ("wallet_addEthereumChain", codes::USER_REJECTED, "Chain was not added"),
];

const GENERIC_CODES: &[i64] = &[codes::INTERNAL, -32000];

const REJECTED_HINTS: &[&str] = &[
    "user rejected",
    "user denied",
    "rejected by user",
    "user cancel",
    "cancelled",
    "canceled",
];
const CHAIN_NOT_ADDED_HINTS: &[&str] = &[
    "unrecognized chain",
    "unknown chain",
    "not been added",
    "try adding the chain",
    "not supported chainid",
];
const PENDING_HINTS: &[&str] = &["already pending", "already processing"];
const DISCONNECTED_HINTS: &[&str] = &["disconnected"];

pub fn is_denied(method: &str) -> bool {
    DENIED_METHODS.contains(&method)
}

pub fn is_gated(method: &str) -> bool {
    GATED_METHODS.contains(&method)
}

/// Gatekeeper in front of the active provider.
#[derive(Clone)]
pub struct RequestGuard {
    session: watch::Receiver<ConnectionState>,
}

impl RequestGuard {
    pub fn new(session: watch::Receiver<ConnectionState>) -> Self {
        Self { session }
    }

    /// Check the method against the denylist and the auth gate.
    pub fn check(&self, method: &str) -> Result<(), WalletError> {
        if is_denied(method) {
            tracing::warn!(method, "Blocked denylisted provider method");
            return Err(WalletError::SecurityViolation {
                method: method.to_string(),
            });
        }

        if is_gated(method) && !self.session.borrow().is_authenticated() {
            tracing::debug!(method, "Gated provider method called before sign-in");
            return Err(WalletError::AuthRequired {
                method: method.to_string(),
            });
        }

        Ok(())
    }

    /// Dispatch a call to the provider after the security checks.
    pub async fn request(
        &self,
        provider: &dyn Eip1193Provider,
        args: RequestArguments,
    ) -> Result<Value, WalletError> {
        self.check(&args.method)?;

        let method = args.method.clone();
        provider.request(args).await.map_err(|raw| {
            let normalized = normalize_error(&method, &raw);
            tracing::debug!(
                method = %method,
                code = normalized.code,
                "Provider request failed"
            );
            WalletError::Provider(normalized)
        })
    }
}

/// Normalize any provider error shape into `{code, message, data?}`.
pub fn normalize_error(method: &str, raw: &RawProviderError) -> ProviderRpcError {
    let value = &raw.0;
    let message = extract_message(value);
    let explicit = extract_code(value);
    let hinted = message.as_deref().and_then(code_from_message);

    let code = match (explicit, hinted) {
        (Some(code), Some(hint)) if GENERIC_CODES.contains(&code) => hint,
        (Some(code), _) => code,
        (None, Some(hint)) => hint,
        (None, None) => fallback_for(method).0,
    };

    let message = message.unwrap_or_else(|| fallback_for(method).1.to_string());
    let mut error = ProviderRpcError::new(code, message);
    if let Some(data) = value.get("data").filter(|d| !d.is_null()) {
        error = error.with_data(data.clone());
    }
    error
}

fn fallback_for(method: &str) -> (i64, &'static str) {
    METHOD_FALLBACKS
        .iter()
        .find(|(m, _, _)| *m == method)
        .map(|(_, code, message)| (*code, *message))
        .unwrap_or((codes::INTERNAL, "Internal provider error"))
}

fn extract_message(value: &Value) -> Option<String> {
    if let Value::String(s) = value {
        return Some(s.clone());
    }
    ["/data/originalError/message", "/message", "/error/message", "/reason"]
        .iter()
        .filter_map(|ptr| value.pointer(ptr))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract_code(value: &Value) -> Option<i64> {
    ["/data/originalError/code", "/code", "/error/code"]
        .iter()
        .filter_map(|ptr| value.pointer(ptr))
        .find_map(|code| match code {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

fn code_from_message(message: &str) -> Option<i64> {
    let lower = message.to_ascii_lowercase();
    let matches = |hints: &[&str]| hints.iter().any(|h| lower.contains(h));

    if matches(REJECTED_HINTS) {
        Some(codes::USER_REJECTED)
    } else if matches(CHAIN_NOT_ADDED_HINTS) {
        Some(codes::CHAIN_NOT_ADDED)
    } else if matches(PENDING_HINTS) {
        Some(codes::RESOURCE_UNAVAILABLE)
    } else if matches(DISCONNECTED_HINTS) {
        Some(codes::DISCONNECTED)
    } else {
        None
    }
}
