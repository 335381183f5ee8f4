// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::auth::{ChallengeService, ChallengeSettings, SignatureVerifier, TokenIssuer};
use crate::config::ServerConfig;
use crate::storage::{AuthDatabase, ChallengeStore, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub db: AuthDatabase,
    pub challenges: ChallengeService,
    pub verifier: SignatureVerifier,
    pub tokens: TokenIssuer,
    pub users: UserRepository,
}

impl AppState {
    pub fn new(db: AuthDatabase, settings: ChallengeSettings, tokens: TokenIssuer) -> Self {
        let store = ChallengeStore::new(db.clone());
        let users = UserRepository::new(db.clone());
        Self {
            challenges: ChallengeService::new(store.clone(), settings),
            verifier: SignatureVerifier::new(store, users.clone(), tokens.clone()),
            tokens,
            users,
            db,
        }
    }

    pub fn from_config(db: AuthDatabase, config: &ServerConfig) -> Self {
        let tokens = TokenIssuer::new(&config.jwt_secret, config.issuer.clone(), config.token_ttl_secs);
        Self::new(db, config.challenge_settings(), tokens)
    }
}
