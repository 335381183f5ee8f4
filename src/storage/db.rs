// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded auth database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `challenges`: challenge key → serialized StoredChallenge
//! - `users`: normalized address → serialized UserRecord
//! - `user_ids`: user_id → normalized address
//!
//! redb serializes write transactions, so a read-check-write inside one write
//! transaction is atomic with respect to every other writer.

use std::path::Path;
use std::sync::Arc;

use redb::{backends::InMemoryBackend, Database, TableDefinition};

// =============================================================================
// Table Definitions
// =============================================================================

/// challenge key (hex sha256) → serialized StoredChallenge (JSON bytes).
pub(crate) const CHALLENGES: TableDefinition<&str, &[u8]> = TableDefinition::new("challenges");

/// lowercase address / base58 public key → serialized UserRecord (JSON bytes).
pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// user_id → lowercase address / base58 public key.
pub(crate) const USER_IDS: TableDefinition<&str, &str> = TableDefinition::new("user_ids");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// AuthDatabase
// =============================================================================

/// Shared handle to the auth database.
#[derive(Clone)]
pub struct AuthDatabase {
    db: Arc<Database>,
}

impl AuthDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Database::create(path)?)
    }

    /// Volatile database, for tests and ephemeral deployments.
    pub fn in_memory() -> DbResult<Self> {
        Self::init(Database::builder().create_with_backend(InMemoryBackend::new())?)
    }

    fn init(db: Database) -> DbResult<Self> {
        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CHALLENGES)?;
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_IDS)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    pub(crate) fn inner(&self) -> &Database {
        &self.db
    }

    /// Read-only probe used by the readiness check.
    pub fn health_check(&self) -> DbResult<()> {
        use redb::ReadableDatabase;

        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(CHALLENGES)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn in_memory_database_is_healthy() {
        let db = AuthDatabase::in_memory().unwrap();
        db.health_check().unwrap();
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("auth.redb");
        let db = AuthDatabase::open(&path).unwrap();
        db.health_check().unwrap();
        assert!(path.exists());
    }
}
