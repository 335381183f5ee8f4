// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Extractor for authenticated users.
///
/// Validates the session token from the `Authorization: Bearer` header.
/// Missing or invalid credentials always reject with 401.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;

        let user = state.tokens.verify(token)?;
        Ok(Auth(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ChallengeSettings, TokenIssuer};
    use crate::models::ChainType;
    use crate::storage::{AuthDatabase, UserRecord};
    use axum::http::Request;
    use chrono::Utc;

    fn state() -> AppState {
        AppState::new(
            AuthDatabase::in_memory().unwrap(),
            ChallengeSettings {
                domain: "example.com".to_string(),
                uri: "https://example.com".to_string(),
                default_statement: None,
                solana_cluster: "mainnet".to_string(),
            },
            TokenIssuer::new(b"0123456789abcdef0123456789abcdef", "wallet-auth", 3600),
        )
    }

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/auth/me");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let state = state();
        let result = Auth::from_request_parts(&mut parts(None), &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_non_bearer_scheme() {
        let state = state();
        let result = Auth::from_request_parts(&mut parts(Some("Basic abc")), &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_unsigned_tokens() {
        let state = state();
        let forged = "eyJhbGciOiJub25lIn0.eyJzdWIiOiJ4In0.";
        let result =
            Auth::from_request_parts(&mut parts(Some(&format!("Bearer {forged}"))), &state).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn auth_extractor_accepts_issued_token() {
        let state = state();
        let user = UserRecord {
            user_id: "user_123".to_string(),
            primary_wallet: "0xabc".to_string(),
            chain_type: ChainType::Evm,
            created_at: Utc::now(),
            last_login_at: None,
        };
        let token = state.tokens.issue(&user, Utc::now()).unwrap().token;

        let Auth(authed) =
            Auth::from_request_parts(&mut parts(Some(&format!("Bearer {token}"))), &state)
                .await
                .unwrap();
        assert_eq!(authed.user_id, "user_123");
        assert_eq!(authed.wallet, "0xabc");
    }
}
