// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client view of the sign-in server.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::{AuthResponse, ChallengeResponse, SiweChallengeRequest, SiweVerifyRequest};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The server refused the request (expired challenge, bad signature, ...).
    #[error("auth server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("auth server unreachable: {0}")]
    Transport(String),

    #[error("invalid auth server response: {0}")]
    InvalidResponse(String),
}

/// Challenge issuance and verification, as seen from the client.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn create_challenge(
        &self,
        address: &str,
        chain_id: u64,
        statement: Option<&str>,
    ) -> Result<ChallengeResponse, BackendError>;

    async fn verify(&self, message: &str, signature: &str) -> Result<AuthResponse, BackendError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// `reqwest` implementation against `/auth/siwe/*`.
#[derive(Clone)]
pub struct HttpAuthBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAuthBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, BackendError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn create_challenge(
        &self,
        address: &str,
        chain_id: u64,
        statement: Option<&str>,
    ) -> Result<ChallengeResponse, BackendError> {
        let body = SiweChallengeRequest {
            address: address.to_string(),
            chain_id,
            statement: statement.map(str::to_string),
        };
        self.post("/auth/siwe/challenge", &body).await
    }

    async fn verify(&self, message: &str, signature: &str) -> Result<AuthResponse, BackendError> {
        let body = SiweVerifyRequest {
            message: message.to_string(),
            signature: signature.to_string(),
        };
        self.post("/auth/siwe/verify", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let backend = HttpAuthBackend::new("https://api.example.com/").unwrap();
        assert_eq!(backend.base_url(), "https://api.example.com");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let backend = HttpAuthBackend::new("http://127.0.0.1:1").unwrap();
        let err = backend.create_challenge("0xabc", 56, None).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
