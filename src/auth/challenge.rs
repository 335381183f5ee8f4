// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Challenge issuance.
//!
//! A challenge binds a random nonce to one account and one sign-in message.
//! It lives for [`CHALLENGE_TTL_SECS`] and can be consumed at most once.

use chrono::{DateTime, Duration, Utc};

use super::error::AuthError;
use super::message::{normalize_evm, parse_evm_address, parse_solana_key, SignInMessage};
use crate::models::{ChainType, ChallengeResponse};
use crate::storage::{ChallengeStore, StoredChallenge};

/// Challenge lifetime: 10 minutes.
pub const CHALLENGE_TTL_SECS: i64 = 600;

/// Message fields shared by every challenge.
#[derive(Debug, Clone)]
pub struct ChallengeSettings {
    pub domain: String,
    pub uri: String,
    pub default_statement: Option<String>,
    /// Chain id placed in Solana messages.
    pub solana_cluster: String,
}

/// Issues nonce-bound sign-in challenges.
#[derive(Clone)]
pub struct ChallengeService {
    store: ChallengeStore,
    settings: ChallengeSettings,
}

impl ChallengeService {
    pub fn new(store: ChallengeStore, settings: ChallengeSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &ChallengeStore {
        &self.store
    }

    /// Issue a challenge for an EVM address on `chain_id`.
    pub fn create_evm_challenge(
        &self,
        address: &str,
        chain_id: u64,
        statement: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ChallengeResponse, AuthError> {
        let parsed = parse_evm_address(address)?;
        self.issue(
            ChainType::Evm,
            normalize_evm(&parsed),
            parsed.to_checksum(None),
            chain_id.to_string(),
            statement,
            now,
        )
    }

    /// Issue a challenge for a base58 Solana public key.
    pub fn create_solana_challenge(
        &self,
        public_key: &str,
        statement: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ChallengeResponse, AuthError> {
        parse_solana_key(public_key)?;
        let key = public_key.trim().to_string();
        self.issue(
            ChainType::Solana,
            key.clone(),
            key,
            self.settings.solana_cluster.clone(),
            statement,
            now,
        )
    }

    fn issue(
        &self,
        chain_type: ChainType,
        normalized: String,
        display: String,
        chain_id: String,
        statement: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ChallengeResponse, AuthError> {
        let nonce = generate_nonce();
        let expires_at = now + Duration::seconds(CHALLENGE_TTL_SECS);

        let message = SignInMessage {
            domain: self.settings.domain.clone(),
            chain_type,
            account: display,
            statement: statement
                .map(str::to_string)
                .or_else(|| self.settings.default_statement.clone()),
            uri: self.settings.uri.clone(),
            chain_id,
            nonce: nonce.clone(),
            issued_at: now,
            expiration_time: expires_at,
        }
        .to_string();

        self.store.insert(&StoredChallenge {
            nonce: nonce.clone(),
            chain_type,
            address: normalized,
            message: message.clone(),
            issued_at: now,
            expires_at,
            used: false,
        })?;

        tracing::debug!(%chain_type, %expires_at, "Issued sign-in challenge");

        Ok(ChallengeResponse {
            nonce,
            expires_at,
            message,
        })
    }
}

/// Random v4 UUID in simple form (32 lowercase hex characters).
pub fn generate_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::AuthDatabase;

    const ADDR: &str = "0xF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266";

    fn service() -> ChallengeService {
        let store = ChallengeStore::new(AuthDatabase::in_memory().unwrap());
        ChallengeService::new(
            store,
            ChallengeSettings {
                domain: "example.com".to_string(),
                uri: "https://example.com".to_string(),
                default_statement: Some("Sign in to Example.".to_string()),
                solana_cluster: "mainnet".to_string(),
            },
        )
    }

    #[test]
    fn nonces_are_unique_and_alphanumeric() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn evm_challenge_embeds_nonce_and_checksummed_address() {
        let service = service();
        let now = Utc::now();
        let challenge = service.create_evm_challenge(ADDR, 56, None, now).unwrap();

        assert!(challenge.message.contains(&format!("Nonce: {}", challenge.nonce)));
        assert!(challenge
            .message
            .contains("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(challenge.message.contains("Chain ID: 56"));
        assert!(challenge.message.contains("Sign in to Example."));
        assert_eq!(challenge.expires_at, now + Duration::minutes(10));

        let stored = service
            .store()
            .get(ChainType::Evm, &ADDR.to_lowercase(), &challenge.message)
            .unwrap()
            .unwrap();
        assert_eq!(stored.nonce, challenge.nonce);
        assert!(!stored.used);
    }

    #[test]
    fn custom_statement_overrides_default() {
        let challenge = service()
            .create_evm_challenge(ADDR, 1, Some("Custom."), Utc::now())
            .unwrap();
        assert!(challenge.message.contains("Custom."));
        assert!(!challenge.message.contains("Sign in to Example."));
    }

    #[test]
    fn invalid_evm_address_is_rejected() {
        let err = service()
            .create_evm_challenge("0x1234", 56, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAddress(_)));
    }

    #[test]
    fn solana_challenge_uses_cluster() {
        let key = bs58::encode([3u8; 32]).into_string();
        let challenge = service()
            .create_solana_challenge(&key, None, Utc::now())
            .unwrap();
        assert!(challenge
            .message
            .contains("wants you to sign in with your Solana account:"));
        assert!(challenge.message.contains("Chain ID: mainnet"));
        assert!(challenge.message.contains(&key));
    }
}
