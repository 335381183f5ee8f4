// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the server. Configuration is loaded from the environment at
//! startup (an optional `.env` file is read first).
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory of the auth database | `./data` |
//! | `AUTH_DOMAIN` | Domain embedded in sign-in messages | `localhost` |
//! | `AUTH_URI` | URI embedded in sign-in messages | `http://localhost` |
//! | `AUTH_STATEMENT` | Default statement line | see [`DEFAULT_STATEMENT`] |
//! | `AUTH_JWT_SECRET` | HS256 secret for session tokens (≥ 32 bytes) | Required |
//! | `AUTH_TOKEN_TTL_SECS` | Session token lifetime | `86400` |
//! | `AUTH_ISSUER` | Session token `iss` claim | `wallet-auth` |
//! | `SOLANA_CLUSTER` | Chain id placed in Solana messages | `mainnet` |
//! | `CHALLENGE_PURGE_INTERVAL_SECS` | Sweep period for stale challenges | `60` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::ChallengeSettings;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Directory holding `auth.redb`.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const AUTH_DOMAIN_ENV: &str = "AUTH_DOMAIN";
pub const AUTH_URI_ENV: &str = "AUTH_URI";
pub const AUTH_STATEMENT_ENV: &str = "AUTH_STATEMENT";

/// HS256 signing secret. Never logged.
pub const AUTH_JWT_SECRET_ENV: &str = "AUTH_JWT_SECRET";
pub const AUTH_TOKEN_TTL_ENV: &str = "AUTH_TOKEN_TTL_SECS";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const SOLANA_CLUSTER_ENV: &str = "SOLANA_CLUSTER";
pub const CHALLENGE_PURGE_INTERVAL_ENV: &str = "CHALLENGE_PURGE_INTERVAL_SECS";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_DOMAIN: &str = "localhost";
pub const DEFAULT_URI: &str = "http://localhost";
pub const DEFAULT_STATEMENT: &str = "Sign in to prove control of this wallet.";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;
pub const DEFAULT_ISSUER: &str = "wallet-auth";
pub const DEFAULT_SOLANA_CLUSTER: &str = "mainnet";
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Minimum HS256 secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Server configuration resolved from the environment.
#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub domain: String,
    pub uri: String,
    pub statement: Option<String>,
    pub jwt_secret: Vec<u8>,
    pub token_ttl_secs: u64,
    pub issuer: String,
    pub solana_cluster: String,
    pub purge_interval: Duration,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("data_dir", &self.data_dir)
            .field("domain", &self.domain)
            .field("uri", &self.uri)
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("issuer", &self.issuer)
            .field("solana_cluster", &self.solana_cluster)
            .field("purge_interval", &self.purge_interval)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let jwt_secret = get(AUTH_JWT_SECRET_ENV)
            .ok_or(ConfigError::Missing(AUTH_JWT_SECRET_ENV))?
            .into_bytes();
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: AUTH_JWT_SECRET_ENV,
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let uri = get(AUTH_URI_ENV).unwrap_or_else(|| DEFAULT_URI.to_string());
        url::Url::parse(&uri).map_err(|e| ConfigError::Invalid {
            name: AUTH_URI_ENV,
            reason: e.to_string(),
        })?;

        let token_ttl_secs = parse_or(get(AUTH_TOKEN_TTL_ENV), AUTH_TOKEN_TTL_ENV, DEFAULT_TOKEN_TTL_SECS)?;
        if token_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: AUTH_TOKEN_TTL_ENV,
                reason: "must be positive".to_string(),
            });
        }

        let purge_secs = parse_or(
            get(CHALLENGE_PURGE_INTERVAL_ENV),
            CHALLENGE_PURGE_INTERVAL_ENV,
            DEFAULT_PURGE_INTERVAL_SECS,
        )?;

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            bind_addr,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            domain: get(AUTH_DOMAIN_ENV).unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            uri,
            statement: Some(get(AUTH_STATEMENT_ENV).unwrap_or_else(|| DEFAULT_STATEMENT.to_string())),
            jwt_secret,
            token_ttl_secs,
            issuer: get(AUTH_ISSUER_ENV).unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            solana_cluster: get(SOLANA_CLUSTER_ENV)
                .unwrap_or_else(|| DEFAULT_SOLANA_CLUSTER.to_string()),
            purge_interval: Duration::from_secs(purge_secs.max(1)),
            log_format,
        })
    }

    pub fn challenge_settings(&self) -> ChallengeSettings {
        ChallengeSettings {
            domain: self.domain.clone(),
            uri: self.uri.clone(),
            default_statement: self.statement.clone(),
            solana_cluster: self.solana_cluster.clone(),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(crate::storage::DB_FILE_NAME)
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
