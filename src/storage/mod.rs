// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent server state in an embedded redb database under `DATA_DIR`.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   auth.redb
//!     challenges   # pending and used sign-in challenges
//!     users        # one record per sign-in account
//!     user_ids     # user_id → account index
//! ```
//!
//! ## Important Notes
//!
//! - Challenge consumption is a single write transaction
//! - Used and expired challenges are purged by a background sweeper
//! - Tokens are never stored

pub mod challenges;
pub mod db;
pub mod users;

pub use challenges::{
    challenge_key, spawn_purge_task, ChallengeStore, ConsumeOutcome, StoredChallenge,
};
pub use db::{AuthDatabase, DbError, DbResult};
pub use users::{UserRecord, UserRepository};

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "auth.redb";
