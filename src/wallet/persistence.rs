// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable client-side session shape.
//!
//! Only `{connected, address, chainId, walletType, needsAuth}` survives a
//! reload. Tokens are never persisted.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::provider::WalletType;
use super::session::WalletSession;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Persisted subset of a wallet session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub connected: bool,
    pub address: String,
    pub chain_id: u64,
    pub wallet_type: WalletType,
    pub needs_auth: bool,
}

impl From<&WalletSession> for PersistedSession {
    fn from(session: &WalletSession) -> Self {
        Self {
            connected: true,
            address: session.address.clone(),
            chain_id: session.chain_id,
            wallet_type: session.wallet_type,
            needs_auth: session.needs_auth,
        }
    }
}

/// Storage backend for the persisted session.
pub trait SessionPersistence: Send + Sync {
    fn get(&self) -> PersistenceResult<Option<PersistedSession>>;
    fn set(&self, session: &PersistedSession) -> PersistenceResult<()>;
    fn clear(&self) -> PersistenceResult<()>;
}

/// Process-local persistence, for tests and non-browser hosts.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    slot: Mutex<Option<PersistedSession>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionPersistence for InMemoryPersistence {
    fn get(&self) -> PersistenceResult<Option<PersistedSession>> {
        Ok(self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn set(&self, session: &PersistedSession) -> PersistenceResult<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> PersistenceResult<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// JSON file persistence (atomic write via rename).
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionPersistence for FilePersistence {
    fn get(&self) -> PersistenceResult<Option<PersistedSession>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, session: &PersistedSession) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, session)?;
            writer.flush()?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> PersistenceResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> PersistedSession {
        PersistedSession {
            connected: true,
            address: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string(),
            chain_id: 56,
            wallet_type: WalletType::MetaMask,
            needs_auth: true,
        }
    }

    #[test]
    fn in_memory_set_get_clear() {
        let store = InMemoryPersistence::new();
        assert!(store.get().unwrap().is_none());
        store.set(&sample()).unwrap();
        assert_eq!(store.get().unwrap(), Some(sample()));
        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn file_persistence_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallet").join("session.json");

        FilePersistence::new(&path).set(&sample()).unwrap();
        let reopened = FilePersistence::new(&path);
        assert_eq!(reopened.get().unwrap(), Some(sample()));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"walletType\":\"metamask\""));
        assert!(raw.contains("\"needsAuth\":true"));

        reopened.clear().unwrap();
        assert!(reopened.get().unwrap().is_none());
        // Clearing twice is fine.
        reopened.clear().unwrap();
    }
}
