// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the sign-in API. They are shared by the
//! axum handlers and by the client's HTTP backend, so both ends agree on the
//! wire format (camelCase JSON).
//!
//! ## Model Categories
//!
//! - **Challenges**: nonce-bound sign-in messages (EVM and Solana)
//! - **Verification**: signed challenges exchanged for a session token
//! - **Users**: the authenticated user record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Chain Type
// =============================================================================

/// Signature scheme family of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// secp256k1 `personal_sign`, address recovered from the signature
    Evm,
    /// ed25519 signature over the raw message bytes
    Solana,
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainType::Evm => write!(f, "evm"),
            ChainType::Solana => write!(f, "solana"),
        }
    }
}

// =============================================================================
// Challenge Models
// =============================================================================

/// Request a sign-in challenge for an EVM address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiweChallengeRequest {
    /// 0x-prefixed address (any case).
    pub address: String,
    /// Numeric chain id the wallet is connected to.
    pub chain_id: u64,
    /// Optional human-readable statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
}

/// Request a sign-in challenge for a Solana account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolanaChallengeRequest {
    /// Base58 ed25519 public key.
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
}

/// An issued challenge. `message` must be signed byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
    pub message: String,
}

// =============================================================================
// Verification Models
// =============================================================================

/// Signed EVM challenge.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiweVerifyRequest {
    pub message: String,
    /// 65-byte hex signature from `personal_sign`.
    pub signature: String,
}

/// Signed Solana challenge.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolanaVerifyRequest {
    pub message: String,
    /// 64-byte ed25519 signature (base58 or hex).
    pub signature: String,
    /// Must match the public key embedded in the message.
    pub public_key: String,
}

/// Successful sign-in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user_id: String,
    pub primary_wallet: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("access_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("primary_wallet", &self.primary_wallet)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

// =============================================================================
// User Models
// =============================================================================

/// The user behind a session token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: String,
    pub primary_wallet: String,
    pub chain_type: ChainType,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_request_accepts_missing_statement() {
        let req: SiweChallengeRequest =
            serde_json::from_str(r#"{"address":"0xabc","chainId":56}"#).unwrap();
        assert_eq!(req.chain_id, 56);
        assert!(req.statement.is_none());
    }

    #[test]
    fn auth_response_uses_camel_case_and_redacts_debug() {
        let resp = AuthResponse {
            access_token: "secret-token".into(),
            user_id: "u1".into(),
            primary_wallet: "0xabc".into(),
            expires_in: 3600,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["accessToken"], "secret-token");
        assert_eq!(json["primaryWallet"], "0xabc");
        assert_eq!(json["expiresIn"], 3600);
        assert!(!format!("{resp:?}").contains("secret-token"));
    }

    #[test]
    fn chain_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChainType::Solana).unwrap(), "\"solana\"");
        assert_eq!(ChainType::Evm.to_string(), "evm");
    }
}
