// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Challenge records.
//!
//! Records are keyed by `sha256(chain_type | address | message)`, so a
//! verification request can only reach the record whose exact message it
//! carries. [`ChallengeStore::consume`] performs lookup, expiry check and
//! the used flag update in one write transaction: of two concurrent
//! verifications of the same challenge, exactly one observes it unused.

use std::time::Duration;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::db::{AuthDatabase, DbResult, CHALLENGES};
use crate::models::ChainType;

/// A persisted sign-in challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChallenge {
    pub nonce: String,
    pub chain_type: ChainType,
    /// Normalized account (lowercase EVM address or base58 public key).
    pub address: String,
    pub message: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used: bool,
}

impl StoredChallenge {
    pub fn key(&self) -> String {
        challenge_key(self.chain_type, &self.address, &self.message)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of an atomic consume attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The challenge was valid and is now marked used.
    Consumed(StoredChallenge),
    NotFound,
    /// Expired before use; the record has been removed.
    Expired,
    AlreadyUsed,
}

/// Derive the lookup key of a challenge.
pub fn challenge_key(chain_type: ChainType, address: &str, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chain_type.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(address.as_bytes());
    hasher.update([0u8]);
    hasher.update(message.as_bytes());
    alloy::hex::encode(hasher.finalize())
}

/// Challenge table accessor.
#[derive(Clone)]
pub struct ChallengeStore {
    db: AuthDatabase,
}

impl ChallengeStore {
    pub fn new(db: AuthDatabase) -> Self {
        Self { db }
    }

    pub fn insert(&self, challenge: &StoredChallenge) -> DbResult<()> {
        let key = challenge.key();
        let json = serde_json::to_vec(challenge)?;

        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(CHALLENGES)?;
            table.insert(key.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Raw lookup, including used records.
    pub fn get(
        &self,
        chain_type: ChainType,
        address: &str,
        message: &str,
    ) -> DbResult<Option<StoredChallenge>> {
        let key = challenge_key(chain_type, address, message);
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(CHALLENGES)?;
        match table.get(key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Atomically locate, validate and mark a challenge as used.
    pub fn consume(
        &self,
        chain_type: ChainType,
        address: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> DbResult<ConsumeOutcome> {
        let key = challenge_key(chain_type, address, message);

        let write_txn = self.db.inner().begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(CHALLENGES)?;
            let existing: Option<StoredChallenge> = match table.get(key.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            match existing {
                None => ConsumeOutcome::NotFound,
                // Key collision guard; the hash covers the message already.
                Some(record) if record.message != message => ConsumeOutcome::NotFound,
                Some(record) if record.used => ConsumeOutcome::AlreadyUsed,
                Some(record) if record.is_expired(now) => {
                    table.remove(key.as_str())?;
                    ConsumeOutcome::Expired
                }
                Some(mut record) => {
                    record.used = true;
                    let json = serde_json::to_vec(&record)?;
                    table.insert(key.as_str(), json.as_slice())?;
                    ConsumeOutcome::Consumed(record)
                }
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Remove expired and used records. Returns the number removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> DbResult<usize> {
        let write_txn = self.db.inner().begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(CHALLENGES)?;

            let mut stale = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let record: StoredChallenge = serde_json::from_slice(value.value())?;
                if record.used || record.is_expired(now) {
                    stale.push(key.value().to_string());
                }
            }

            for key in &stale {
                table.remove(key.as_str())?;
            }
            stale.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }

    pub fn count(&self) -> DbResult<u64> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(CHALLENGES)?;
        Ok(table.len()?)
    }
}

// =============================================================================
// Background Sweeper
// =============================================================================

/// Periodically purge stale challenges until `shutdown` is cancelled.
pub fn spawn_purge_task(
    store: ChallengeStore,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Challenge sweeper started");
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Challenge sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match store.purge_expired(Utc::now()) {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!(removed, "Purged stale challenges"),
                        Err(e) => tracing::warn!(error = %e, "Challenge purge failed"),
                    }
                }
            }
        }
    })
}
