// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test doubles shared by the client tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use alloy::signers::{local::PrivateKeySigner, SignerSync};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::auth::{AuthError, ChallengeService, ChallengeSettings, SignatureVerifier, TokenIssuer};
use crate::models::{AuthResponse, ChallengeResponse};
use crate::storage::{AuthDatabase, ChallengeStore, UserRepository};
use crate::wallet::backend::{AuthBackend, BackendError};
use crate::wallet::error::RawProviderError;
use crate::wallet::provider::{Eip1193Provider, ProviderEvent, RequestArguments};

/// Well-known development accounts.
pub const ADDRESS_A: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const ADDRESS_B: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

const DEV_KEYS: &[&str] = &[
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
];

fn signer_for(address: &str) -> PrivateKeySigner {
    DEV_KEYS
        .iter()
        .map(|key| key.parse::<PrivateKeySigner>().unwrap())
        .find(|signer| signer.address().to_string().eq_ignore_ascii_case(address))
        .unwrap_or_else(|| panic!("no development key for {address}"))
}

struct ScriptedError {
    error: Value,
    once: bool,
}

/// Scripted EIP-1193 provider.
pub struct MockProvider {
    address: String,
    chain_id: String,
    signer: Option<PrivateKeySigner>,
    errors: Mutex<HashMap<String, ScriptedError>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<RequestArguments>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockProvider {
    pub fn new(address: &str, chain_id: &str) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            address: address.to_string(),
            chain_id: chain_id.to_string(),
            signer: None,
            errors: Mutex::new(HashMap::new()),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            events,
        }
    }

    /// A provider that answers `personal_sign` with a real signature.
    pub fn signing(address: &str, chain_id: &str) -> Self {
        let mut provider = Self::new(address, chain_id);
        provider.signer = Some(signer_for(address));
        provider
    }

    /// Fail every call to `method` with `error`.
    pub fn with_error(self, method: &str, error: Value) -> Self {
        self.script_error(method, error, false)
    }

    /// Fail only the next call to `method`.
    pub fn with_error_once(self, method: &str, error: Value) -> Self {
        self.script_error(method, error, true)
    }

    fn script_error(self, method: &str, error: Value, once: bool) -> Self {
        self.fail_next(method, error, once);
        self
    }

    /// Script an error on a provider that is already shared.
    pub fn fail_next(&self, method: &str, error: Value, once: bool) {
        self.errors
            .lock()
            .unwrap()
            .insert(method.to_string(), ScriptedError { error, once });
    }

    pub fn with_delay(mut self, method: &str, delay: Duration) -> Self {
        self.delays.insert(method.to_string(), delay);
        self
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.method.clone())
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.method == method)
            .map(|c| c.params.clone())
    }

    fn sign(&self, params: &Value) -> Result<Value, RawProviderError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| RawProviderError::from("personal_sign is not available"))?;
        let hex_message = params[0]
            .as_str()
            .ok_or_else(|| RawProviderError(json!({"code": -32602, "message": "missing message"})))?;
        let bytes = alloy::hex::decode(hex_message)
            .map_err(|e| RawProviderError(json!({"code": -32602, "message": e.to_string()})))?;
        let signature = signer
            .sign_message_sync(&bytes)
            .map_err(|e| RawProviderError(json!({"code": -32603, "message": e.to_string()})))?;
        Ok(json!(format!("0x{}", alloy::hex::encode(signature.as_bytes()))))
    }
}

#[async_trait]
impl Eip1193Provider for MockProvider {
    async fn request(&self, args: RequestArguments) -> Result<Value, RawProviderError> {
        self.calls.lock().unwrap().push(args.clone());

        if let Some(delay) = self.delays.get(&args.method) {
            tokio::time::sleep(*delay).await;
        }

        {
            let mut errors = self.errors.lock().unwrap();
            if let Some(scripted) = errors.get(&args.method) {
                let error = scripted.error.clone();
                if scripted.once {
                    errors.remove(&args.method);
                }
                return Err(RawProviderError(error));
            }
        }

        match args.method.as_str() {
            "eth_requestAccounts" | "eth_accounts" => Ok(json!([self.address])),
            "eth_chainId" => Ok(json!(self.chain_id)),
            "personal_sign" => self.sign(&args.params),
            "eth_signTypedData_v4" => Ok(json!("0xtyped")),
            _ => Ok(Value::Null),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

/// Auth backend running the server-side services in process.
pub struct LocalAuthBackend {
    challenges: ChallengeService,
    verifier: SignatureVerifier,
}

impl LocalAuthBackend {
    pub fn new() -> Self {
        let db = AuthDatabase::in_memory().unwrap();
        let store = ChallengeStore::new(db.clone());
        let settings = ChallengeSettings {
            domain: "wallet.test".to_string(),
            uri: "https://wallet.test".to_string(),
            default_statement: Some("Sign in to the test app.".to_string()),
            solana_cluster: "devnet".to_string(),
        };
        let tokens = TokenIssuer::new(b"test-secret-test-secret-test-secret", "wallet-auth-test", 600);
        Self {
            challenges: ChallengeService::new(store.clone(), settings),
            verifier: SignatureVerifier::new(store, UserRepository::new(db), tokens),
        }
    }
}

fn rejected(err: AuthError) -> BackendError {
    BackendError::Rejected {
        status: err.status_code().as_u16(),
        message: err.public_message(),
    }
}

#[async_trait]
impl AuthBackend for LocalAuthBackend {
    async fn create_challenge(
        &self,
        address: &str,
        chain_id: u64,
        statement: Option<&str>,
    ) -> Result<ChallengeResponse, BackendError> {
        self.challenges
            .create_evm_challenge(address, chain_id, statement, Utc::now())
            .map_err(rejected)
    }

    async fn verify(&self, message: &str, signature: &str) -> Result<AuthResponse, BackendError> {
        self.verifier
            .verify_evm(message, signature, Utc::now())
            .map_err(rejected)
    }
}
