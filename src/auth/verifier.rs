// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed-challenge verification.
//!
//! ## Verification Steps
//!
//! 1. Extract the claimed account from the message (400 if malformed)
//! 2. Atomically consume the matching challenge (401 if unknown, used or
//!    expired)
//! 3. Check the signature against the claimed account (401 on mismatch)
//! 4. Find or create the user and stamp the login time
//! 5. Issue a session token
//!
//! The challenge is consumed before the signature is checked, so a failed
//! attempt still burns it.

use alloy::primitives::Signature as EvmSignature;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey};

use super::error::AuthError;
use super::message::{normalize_evm, parse_account, parse_solana_key, ClaimedAccount};
use super::token::TokenIssuer;
use crate::models::{AuthResponse, ChainType};
use crate::storage::{ChallengeStore, ConsumeOutcome, UserRepository};

#[derive(Clone)]
pub struct SignatureVerifier {
    challenges: ChallengeStore,
    users: UserRepository,
    tokens: TokenIssuer,
}

impl SignatureVerifier {
    pub fn new(challenges: ChallengeStore, users: UserRepository, tokens: TokenIssuer) -> Self {
        Self {
            challenges,
            users,
            tokens,
        }
    }

    /// Verify a `personal_sign` signature over an EVM challenge.
    pub fn verify_evm(
        &self,
        message: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthResponse, AuthError> {
        let claimed = claimed_account(message, ChainType::Evm)?;
        self.consume(&claimed, message, now)?;

        let recovered = recover_evm_signer(message, signature)?;
        if recovered != claimed.address {
            tracing::warn!(claimed = %claimed.address, "EVM signature recovered a different signer");
            return Err(AuthError::SignatureMismatch);
        }

        self.complete(&claimed, now)
    }

    /// Verify an ed25519 signature over a Solana challenge.
    pub fn verify_solana(
        &self,
        message: &str,
        signature: &str,
        public_key: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthResponse, AuthError> {
        let claimed = claimed_account(message, ChainType::Solana)?;
        if claimed.address != public_key.trim() {
            return Err(AuthError::MalformedMessage(
                "publicKey does not match the message account".to_string(),
            ));
        }
        self.consume(&claimed, message, now)?;

        verify_ed25519(message, signature, &claimed.address)?;

        self.complete(&claimed, now)
    }

    fn consume(
        &self,
        claimed: &ClaimedAccount,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        match self
            .challenges
            .consume(claimed.chain_type, &claimed.address, message, now)?
        {
            ConsumeOutcome::Consumed(_) => Ok(()),
            ConsumeOutcome::Expired => Err(AuthError::ChallengeExpired),
            ConsumeOutcome::NotFound | ConsumeOutcome::AlreadyUsed => {
                Err(AuthError::ChallengeNotFound)
            }
        }
    }

    fn complete(&self, claimed: &ClaimedAccount, now: DateTime<Utc>) -> Result<AuthResponse, AuthError> {
        let user = self
            .users
            .record_login(&claimed.address, claimed.chain_type, now)?;
        let issued = self.tokens.issue(&user, now)?;

        tracing::info!(
            user_id = %user.user_id,
            chain_type = %claimed.chain_type,
            "Wallet sign-in verified"
        );

        Ok(AuthResponse {
            access_token: issued.token,
            user_id: user.user_id,
            primary_wallet: user.primary_wallet,
            expires_in: issued.expires_in,
        })
    }
}

fn claimed_account(message: &str, expected: ChainType) -> Result<ClaimedAccount, AuthError> {
    let claimed = parse_account(message)?;
    if claimed.chain_type != expected {
        return Err(AuthError::MalformedMessage(format!(
            "expected a {expected} sign-in message"
        )));
    }
    Ok(claimed)
}

/// Recover the lowercase signer address of an EIP-191 personal message.
pub fn recover_evm_signer(message: &str, signature: &str) -> Result<String, AuthError> {
    let bytes = alloy::hex::decode(signature.trim()).map_err(|_| AuthError::SignatureMismatch)?;
    let signature = EvmSignature::from_raw(&bytes).map_err(|_| AuthError::SignatureMismatch)?;
    let address = signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|_| AuthError::SignatureMismatch)?;
    Ok(normalize_evm(&address))
}

/// Check an ed25519 signature (base58 or hex) over the raw message bytes.
pub fn verify_ed25519(message: &str, signature: &str, public_key: &str) -> Result<(), AuthError> {
    let key_bytes = parse_solana_key(public_key).map_err(|_| AuthError::SignatureMismatch)?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| AuthError::SignatureMismatch)?;

    let sig_bytes = decode_signature(signature.trim()).ok_or(AuthError::SignatureMismatch)?;
    let sig = Ed25519Signature::from_slice(&sig_bytes).map_err(|_| AuthError::SignatureMismatch)?;

    key.verify_strict(message.as_bytes(), &sig)
        .map_err(|_| AuthError::SignatureMismatch)
}

fn decode_signature(raw: &str) -> Option<Vec<u8>> {
    let hex = raw.strip_prefix("0x").unwrap_or(raw);
    if hex.len() == 128 {
        if let Ok(bytes) = alloy::hex::decode(hex) {
            return Some(bytes);
        }
    }
    bs58::decode(raw).into_vec().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::challenge::{ChallengeService, ChallengeSettings};
    use crate::storage::AuthDatabase;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};
    use ed25519_dalek::{Signer, SigningKey};

    struct Fixture {
        challenges: ChallengeService,
        verifier: SignatureVerifier,
        users: UserRepository,
    }

    fn fixture() -> Fixture {
        let db = AuthDatabase::in_memory().unwrap();
        let store = ChallengeStore::new(db.clone());
        let users = UserRepository::new(db);
        let tokens = TokenIssuer::new(b"0123456789abcdef0123456789abcdef", "wallet-auth", 3600);
        Fixture {
            challenges: ChallengeService::new(
                store.clone(),
                ChallengeSettings {
                    domain: "example.com".to_string(),
                    uri: "https://example.com".to_string(),
                    default_statement: None,
                    solana_cluster: "mainnet".to_string(),
                },
            ),
            verifier: SignatureVerifier::new(store, users.clone(), tokens),
            users,
        }
    }

    fn sign_evm(signer: &PrivateKeySigner, message: &str) -> String {
        let sig = signer.sign_message_sync(message.as_bytes()).unwrap();
        format!("0x{}", alloy::hex::encode(sig.as_bytes()))
    }

    #[test]
    fn valid_evm_signature_signs_in() {
        let fx = fixture();
        let signer = PrivateKeySigner::random();
        let address = signer.address().to_string();

        let challenge = fx
            .challenges
            .create_evm_challenge(&address, 56, None, Utc::now())
            .unwrap();
        let signature = sign_evm(&signer, &challenge.message);

        let auth = fx
            .verifier
            .verify_evm(&challenge.message, &signature, Utc::now())
            .unwrap();
        assert_eq!(auth.primary_wallet, address.to_lowercase());
        assert!(!auth.access_token.is_empty());
        assert_eq!(auth.expires_in, 3600);

        let user = fx.users.find_by_id(&auth.user_id).unwrap().unwrap();
        assert!(user.last_login_at.is_some());
    }

    #[test]
    fn replay_is_rejected() {
        let fx = fixture();
        let signer = PrivateKeySigner::random();
        let challenge = fx
            .challenges
            .create_evm_challenge(&signer.address().to_string(), 56, None, Utc::now())
            .unwrap();
        let signature = sign_evm(&signer, &challenge.message);

        fx.verifier
            .verify_evm(&challenge.message, &signature, Utc::now())
            .unwrap();
        let err = fx
            .verifier
            .verify_evm(&challenge.message, &signature, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthError::ChallengeNotFound));
    }

    #[test]
    fn wrong_signer_burns_the_challenge() {
        let fx = fixture();
        let owner = PrivateKeySigner::random();
        let attacker = PrivateKeySigner::random();
        let challenge = fx
            .challenges
            .create_evm_challenge(&owner.address().to_string(), 56, None, Utc::now())
            .unwrap();

        let forged = sign_evm(&attacker, &challenge.message);
        let err = fx
            .verifier
            .verify_evm(&challenge.message, &forged, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));

        // The legitimate signature no longer works either.
        let genuine = sign_evm(&owner, &challenge.message);
        let err = fx
            .verifier
            .verify_evm(&challenge.message, &genuine, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthError::ChallengeNotFound));
    }

    #[test]
    fn expired_challenge_is_rejected() {
        let fx = fixture();
        let signer = PrivateKeySigner::random();
        let issued_at = Utc::now() - chrono::Duration::minutes(11);
        let challenge = fx
            .challenges
            .create_evm_challenge(&signer.address().to_string(), 56, None, issued_at)
            .unwrap();
        let signature = sign_evm(&signer, &challenge.message);

        let err = fx
            .verifier
            .verify_evm(&challenge.message, &signature, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthError::ChallengeExpired));
    }

    #[test]
    fn tampered_message_finds_no_challenge() {
        let fx = fixture();
        let signer = PrivateKeySigner::random();
        let challenge = fx
            .challenges
            .create_evm_challenge(&signer.address().to_string(), 56, None, Utc::now())
            .unwrap();
        let tampered = challenge.message.replace("Chain ID: 56", "Chain ID: 1");
        let signature = sign_evm(&signer, &tampered);

        let err = fx
            .verifier
            .verify_evm(&tampered, &signature, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthError::ChallengeNotFound));
    }

    #[test]
    fn malformed_message_is_bad_request() {
        let err = fixture()
            .verifier
            .verify_evm("hello world", "0x00", Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedMessage(_)));
    }

    #[test]
    fn valid_solana_signature_signs_in() {
        let fx = fixture();
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let public_key = bs58::encode(key.verifying_key().to_bytes()).into_string();

        let challenge = fx
            .challenges
            .create_solana_challenge(&public_key, None, Utc::now())
            .unwrap();
        let signature = key.sign(challenge.message.as_bytes());
        let encoded = bs58::encode(signature.to_bytes()).into_string();

        let auth = fx
            .verifier
            .verify_solana(&challenge.message, &encoded, &public_key, Utc::now())
            .unwrap();
        assert_eq!(auth.primary_wallet, public_key);
    }

    #[test]
    fn solana_public_key_must_match_message() {
        let fx = fixture();
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let public_key = bs58::encode(key.verifying_key().to_bytes()).into_string();
        let other = bs58::encode([1u8; 32]).into_string();

        let challenge = fx
            .challenges
            .create_solana_challenge(&public_key, None, Utc::now())
            .unwrap();
        let err = fx
            .verifier
            .verify_solana(&challenge.message, "sig", &other, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedMessage(_)));
    }

    #[test]
    fn ed25519_accepts_hex_signatures() {
        let key = SigningKey::from_bytes(&[5u8; 32]);
        let public_key = bs58::encode(key.verifying_key().to_bytes()).into_string();
        let signature = key.sign(b"hello");
        let hex = alloy::hex::encode(signature.to_bytes());

        verify_ed25519("hello", &hex, &public_key).unwrap();
        assert!(verify_ed25519("hellO", &hex, &public_key).is_err());
    }
}
