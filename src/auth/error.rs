// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Covers both halves of the server's auth surface: challenge issuance and
//! verification, and bearer-token validation on protected routes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::DbError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // -------------------------------------------------------------------------
    // Bearer tokens
    // -------------------------------------------------------------------------
    #[error("Authorization header is required")]
    MissingAuthHeader,

    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,

    #[error("Token is malformed")]
    MalformedToken,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token issuer is invalid")]
    InvalidIssuer,

    #[error("Token is not yet valid")]
    TokenNotYetValid,

    /// The token is valid but its user no longer exists.
    #[error("Unknown user")]
    UnknownUser,

    // -------------------------------------------------------------------------
    // Challenges
    // -------------------------------------------------------------------------
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Malformed sign-in message: {0}")]
    MalformedMessage(String),

    #[error("No matching challenge (unknown or already used)")]
    ChallengeNotFound,

    #[error("Challenge has expired")]
    ChallengeExpired,

    #[error("Signature does not match the challenge account")]
    SignatureMismatch,

    // -------------------------------------------------------------------------
    // Infrastructure
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Internal authentication error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::UnknownUser => "unknown_user",
            AuthError::InvalidAddress(_) => "invalid_address",
            AuthError::MalformedMessage(_) => "malformed_message",
            AuthError::ChallengeNotFound => "challenge_not_found",
            AuthError::ChallengeExpired => "challenge_expired",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::Storage(_) => "storage_error",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidAddress(_) | AuthError::MalformedMessage(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::InvalidIssuer
            | AuthError::TokenNotYetValid
            | AuthError::UnknownUser
            | AuthError::ChallengeNotFound
            | AuthError::ChallengeExpired
            | AuthError::SignatureMismatch => StatusCode::UNAUTHORIZED,
            AuthError::Storage(_) | AuthError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Storage(_) => "Internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Authentication failed with internal error");
        }

        let body = Json(AuthErrorBody {
            error: self.public_message(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
