// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User records, one per sign-in account.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};

use super::db::{AuthDatabase, DbError, DbResult, USERS, USER_IDS};
use crate::models::{ChainType, UserResponse};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    /// Normalized account the user signs in with.
    pub primary_wallet: String,
    pub chain_type: ChainType,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<UserRecord> for UserResponse {
    fn from(record: UserRecord) -> Self {
        Self {
            user_id: record.user_id,
            primary_wallet: record.primary_wallet,
            chain_type: record.chain_type,
            created_at: record.created_at,
            last_login_at: record.last_login_at,
        }
    }
}

#[derive(Clone)]
pub struct UserRepository {
    db: AuthDatabase,
}

impl UserRepository {
    pub fn new(db: AuthDatabase) -> Self {
        Self { db }
    }

    pub fn find_by_address(&self, address: &str) -> DbResult<Option<UserRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(address)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn find_by_id(&self, user_id: &str) -> DbResult<Option<UserRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let ids = read_txn.open_table(USER_IDS)?;
        let address = match ids.get(user_id)? {
            Some(value) => value.value().to_string(),
            None => return Ok(None),
        };

        let users = read_txn.open_table(USERS)?;
        match users.get(address.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Find or create the user for `address` and stamp the login time.
    ///
    /// Runs in one write transaction, so two first-time logins for the same
    /// address still produce a single user.
    pub fn record_login(
        &self,
        address: &str,
        chain_type: ChainType,
        now: DateTime<Utc>,
    ) -> DbResult<UserRecord> {
        let write_txn = self.db.inner().begin_write()?;
        let record = {
            let mut users = write_txn.open_table(USERS)?;
            let existing: Option<UserRecord> = match users.get(address)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            let mut record = match existing {
                Some(record) => record,
                None => {
                    let record = UserRecord {
                        user_id: uuid::Uuid::new_v4().to_string(),
                        primary_wallet: address.to_string(),
                        chain_type,
                        created_at: now,
                        last_login_at: None,
                    };
                    let mut ids = write_txn.open_table(USER_IDS)?;
                    ids.insert(record.user_id.as_str(), address)?;
                    tracing::info!(user_id = %record.user_id, %chain_type, "Created user");
                    record
                }
            };
            record.last_login_at = Some(now);

            let json = serde_json::to_vec(&record)?;
            users.insert(address, json.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    pub fn update_last_login(&self, user_id: &str, now: DateTime<Utc>) -> DbResult<UserRecord> {
        let write_txn = self.db.inner().begin_write()?;
        let record = {
            let ids = write_txn.open_table(USER_IDS)?;
            let address = match ids.get(user_id)? {
                Some(value) => value.value().to_string(),
                None => return Err(DbError::NotFound(format!("user {user_id}"))),
            };

            let mut users = write_txn.open_table(USERS)?;
            let mut record: UserRecord = match users.get(address.as_str())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(DbError::NotFound(format!("user {user_id}"))),
            };
            record.last_login_at = Some(now);

            let json = serde_json::to_vec(&record)?;
            users.insert(address.as_str(), json.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    pub fn count(&self) -> DbResult<u64> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        Ok(table.len()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    fn repo() -> UserRepository {
        UserRepository::new(AuthDatabase::in_memory().unwrap())
    }

    #[test]
    fn first_login_creates_user() {
        let repo = repo();
        assert!(repo.find_by_address(ADDR).unwrap().is_none());

        let now = Utc::now();
        let user = repo.record_login(ADDR, ChainType::Evm, now).unwrap();
        assert_eq!(user.primary_wallet, ADDR);
        assert_eq!(user.last_login_at, Some(now));

        let by_id = repo.find_by_id(&user.user_id).unwrap().unwrap();
        assert_eq!(by_id, user);
    }

    #[test]
    fn repeat_login_keeps_identity() {
        let repo = repo();
        let first = repo.record_login(ADDR, ChainType::Evm, Utc::now()).unwrap();
        let later = Utc::now() + chrono::Duration::minutes(5);
        let second = repo.record_login(ADDR, ChainType::Evm, later).unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.last_login_at, Some(later));
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn update_last_login_for_unknown_user_fails() {
        let err = repo().update_last_login("missing", Utc::now()).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }
}
