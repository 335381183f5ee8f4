// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-4361 style sign-in messages.
//!
//! ```text
//! example.com wants you to sign in with your Ethereum account:
//! 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266
//!
//! Sign in to Example.
//!
//! URI: https://example.com
//! Version: 1
//! Chain ID: 56
//! Nonce: 5f1c0a7d2e9b4c3a8d6f0e1b2a3c4d5e
//! Issued At: 2026-01-01T00:00:00.000Z
//! Expiration Time: 2026-01-01T00:10:00.000Z
//! ```
//!
//! Solana messages use the same layout with a `Solana account` header, a
//! base58 public key, and the cluster name as the chain id.

use std::fmt;

use alloy::primitives::Address;
use chrono::{DateTime, SecondsFormat, Utc};

use super::error::AuthError;
use crate::models::ChainType;

const EVM_HEADER: &str = " wants you to sign in with your Ethereum account:";
const SOLANA_HEADER: &str = " wants you to sign in with your Solana account:";

/// A structured sign-in message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInMessage {
    pub domain: String,
    pub chain_type: ChainType,
    /// Display form: checksummed EVM address or base58 public key.
    pub account: String,
    pub statement: Option<String>,
    pub uri: String,
    /// Numeric chain id (EVM) or cluster name (Solana).
    pub chain_id: String,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
}

impl fmt::Display for SignInMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = match self.chain_type {
            ChainType::Evm => EVM_HEADER,
            ChainType::Solana => SOLANA_HEADER,
        };
        writeln!(f, "{}{header}", self.domain)?;
        writeln!(f, "{}", self.account)?;
        writeln!(f)?;
        if let Some(statement) = self.statement.as_deref().filter(|s| !s.is_empty()) {
            writeln!(f, "{statement}")?;
            writeln!(f)?;
        }
        writeln!(f, "URI: {}", self.uri)?;
        writeln!(f, "Version: 1")?;
        writeln!(f, "Chain ID: {}", self.chain_id)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        writeln!(f, "Issued At: {}", timestamp(&self.issued_at))?;
        write!(f, "Expiration Time: {}", timestamp(&self.expiration_time))
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Account claimed by a sign-in message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedAccount {
    pub chain_type: ChainType,
    /// Normalized form used as the storage key.
    pub address: String,
}

/// Extract the claimed account from the first two lines of a message.
pub fn parse_account(message: &str) -> Result<ClaimedAccount, AuthError> {
    let mut lines = message.lines();
    let header = lines
        .next()
        .ok_or_else(|| AuthError::MalformedMessage("empty message".to_string()))?;
    let account = lines
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| AuthError::MalformedMessage("missing account line".to_string()))?;

    if header.ends_with(EVM_HEADER) {
        let address = parse_evm_address(account)
            .map_err(|_| AuthError::MalformedMessage(format!("invalid address `{account}`")))?;
        Ok(ClaimedAccount {
            chain_type: ChainType::Evm,
            address: normalize_evm(&address),
        })
    } else if header.ends_with(SOLANA_HEADER) {
        parse_solana_key(account)
            .map_err(|_| AuthError::MalformedMessage(format!("invalid public key `{account}`")))?;
        Ok(ClaimedAccount {
            chain_type: ChainType::Solana,
            address: account.to_string(),
        })
    } else {
        Err(AuthError::MalformedMessage(
            "missing sign-in header".to_string(),
        ))
    }
}

/// Parse a 0x-prefixed EVM address in any letter case.
pub fn parse_evm_address(raw: &str) -> Result<Address, AuthError> {
    let raw = raw.trim();
    if !raw.starts_with("0x") || raw.len() != 42 {
        return Err(AuthError::InvalidAddress(raw.to_string()));
    }
    raw.parse::<Address>()
        .map_err(|_| AuthError::InvalidAddress(raw.to_string()))
}

/// Lowercase storage form of an EVM address.
pub fn normalize_evm(address: &Address) -> String {
    address.to_string().to_ascii_lowercase()
}

/// Decode a base58 ed25519 public key.
pub fn parse_solana_key(raw: &str) -> Result<[u8; 32], AuthError> {
    let bytes = bs58::decode(raw.trim())
        .into_vec()
        .map_err(|_| AuthError::InvalidAddress(raw.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| AuthError::InvalidAddress(raw.to_string()))
}
