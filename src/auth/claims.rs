// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims and the authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ChainType;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user id.
    pub sub: String,
    /// Normalized primary wallet.
    pub wallet: String,
    pub chain_type: ChainType,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    /// Unique token id.
    pub jti: String,
}

/// Authenticated user information extracted from a session token.
///
/// This is the type handlers receive from the [`Auth`](super::Auth)
/// extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub wallet: String,
    pub chain_type: ChainType,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl From<SessionClaims> for AuthenticatedUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            wallet: claims.wallet,
            chain_type: claims.chain_type,
            expires_at: claims.exp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_claims_maps_subject_and_wallet() {
        let claims = SessionClaims {
            sub: "user_123".to_string(),
            wallet: "0xabc".to_string(),
            chain_type: ChainType::Evm,
            iat: 1_700_000_000,
            exp: 1_700_003_600,
            iss: "wallet-auth".to_string(),
            jti: "t1".to_string(),
        };
        let user = AuthenticatedUser::from(claims);
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.wallet, "0xabc");
        assert_eq!(user.expires_at, 1_700_003_600);
    }

    #[test]
    fn claims_serialize_chain_type_lowercase() {
        let json = serde_json::to_value(SessionClaims {
            sub: "u".into(),
            wallet: "w".into(),
            chain_type: ChainType::Solana,
            iat: 0,
            exp: 1,
            iss: "i".into(),
            jti: "j".into(),
        })
        .unwrap();
        assert_eq!(json["chain_type"], "solana");
    }
}
