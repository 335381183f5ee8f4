// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in endpoints.
//!
//! - `POST /auth/siwe/challenge` / `POST /auth/siwe/verify`: EVM accounts
//! - `POST /auth/solana/challenge` / `POST /auth/solana/verify`: Solana accounts
//! - `GET /auth/me`: the user behind a session token

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::Utc;

use crate::auth::{Auth, AuthError};
use crate::error::ApiError;
use crate::models::{
    AuthResponse, ChallengeResponse, SiweChallengeRequest, SiweVerifyRequest,
    SolanaChallengeRequest, SolanaVerifyRequest, UserResponse,
};
use crate::state::AppState;

/// Issue a sign-in challenge for an EVM address.
#[utoipa::path(
    post,
    path = "/auth/siwe/challenge",
    tag = "Auth",
    request_body = SiweChallengeRequest,
    responses(
        (status = 200, description = "Challenge issued", body = ChallengeResponse),
        (status = 400, description = "Invalid address or body")
    )
)]
pub async fn siwe_challenge(
    State(state): State<AppState>,
    payload: Result<Json<SiweChallengeRequest>, JsonRejection>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let Json(request) = payload?;
    let challenge = state.challenges.create_evm_challenge(
        &request.address,
        request.chain_id,
        request.statement.as_deref(),
        Utc::now(),
    )?;
    Ok(Json(challenge))
}

/// Exchange a signed EVM challenge for a session token.
#[utoipa::path(
    post,
    path = "/auth/siwe/verify",
    tag = "Auth",
    request_body = SiweVerifyRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Malformed message"),
        (status = 401, description = "Unknown, used or expired challenge, or signature mismatch")
    )
)]
pub async fn siwe_verify(
    State(state): State<AppState>,
    payload: Result<Json<SiweVerifyRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(request) = payload?;
    let auth = state
        .verifier
        .verify_evm(&request.message, &request.signature, Utc::now())
        .inspect_err(|e| tracing::info!(error_code = e.error_code(), "SIWE verification rejected"))?;
    Ok(Json(auth))
}

/// Issue a sign-in challenge for a Solana public key.
#[utoipa::path(
    post,
    path = "/auth/solana/challenge",
    tag = "Auth",
    request_body = SolanaChallengeRequest,
    responses(
        (status = 200, description = "Challenge issued", body = ChallengeResponse),
        (status = 400, description = "Invalid public key or body")
    )
)]
pub async fn solana_challenge(
    State(state): State<AppState>,
    payload: Result<Json<SolanaChallengeRequest>, JsonRejection>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let Json(request) = payload?;
    let challenge = state.challenges.create_solana_challenge(
        &request.public_key,
        request.statement.as_deref(),
        Utc::now(),
    )?;
    Ok(Json(challenge))
}

/// Exchange a signed Solana challenge for a session token.
#[utoipa::path(
    post,
    path = "/auth/solana/verify",
    tag = "Auth",
    request_body = SolanaVerifyRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Malformed message or public key mismatch"),
        (status = 401, description = "Unknown, used or expired challenge, or signature mismatch")
    )
)]
pub async fn solana_verify(
    State(state): State<AppState>,
    payload: Result<Json<SolanaVerifyRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(request) = payload?;
    let auth = state
        .verifier
        .verify_solana(
            &request.message,
            &request.signature,
            &request.public_key,
            Utc::now(),
        )
        .inspect_err(|e| {
            tracing::info!(error_code = e.error_code(), "Solana verification rejected")
        })?;
    Ok(Json(auth))
}

/// Get the user behind the presented session token.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserResponse),
        (status = 401, description = "Unauthorized - invalid or missing token")
    )
)]
pub async fn me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let record = state
        .users
        .find_by_id(&user.user_id)?
        .ok_or(AuthError::UnknownUser)?;
    Ok(Json(record.into()))
}
