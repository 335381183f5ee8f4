// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network descriptors and the canonical chain.

use serde::{Deserialize, Serialize};

use super::error::{codes, WalletError};

/// BNB Smart Chain mainnet.
pub const CANONICAL_CHAIN_ID: u64 = 56;

/// Native currency of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Network descriptor sent with `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    /// Hex chain id, e.g. `0x38`.
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl NetworkDescriptor {
    pub fn numeric_chain_id(&self) -> Option<u64> {
        parse_chain_id(&self.chain_id).ok()
    }
}

pub fn bsc_mainnet() -> NetworkDescriptor {
    NetworkDescriptor {
        chain_id: to_hex_chain_id(56),
        chain_name: "BNB Smart Chain".to_string(),
        native_currency: NativeCurrency {
            name: "BNB".to_string(),
            symbol: "BNB".to_string(),
            decimals: 18,
        },
        rpc_urls: vec![
            "https://bsc-dataseed.binance.org/".to_string(),
            "https://bsc-dataseed1.defibit.io/".to_string(),
        ],
        block_explorer_urls: vec!["https://bscscan.com".to_string()],
    }
}

pub fn bsc_testnet() -> NetworkDescriptor {
    NetworkDescriptor {
        chain_id: to_hex_chain_id(97),
        chain_name: "BNB Smart Chain Testnet".to_string(),
        native_currency: NativeCurrency {
            name: "tBNB".to_string(),
            symbol: "tBNB".to_string(),
            decimals: 18,
        },
        rpc_urls: vec!["https://data-seed-prebsc-1-s1.binance.org:8545/".to_string()],
        block_explorer_urls: vec!["https://testnet.bscscan.com".to_string()],
    }
}

/// Client-side configuration for the connection state machine.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub canonical_chain_id: u64,
    pub networks: Vec<NetworkDescriptor>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            canonical_chain_id: CANONICAL_CHAIN_ID,
            networks: vec![bsc_mainnet(), bsc_testnet()],
        }
    }
}

impl WalletConfig {
    pub fn network(&self, chain_id: u64) -> Option<&NetworkDescriptor> {
        self.networks
            .iter()
            .find(|n| n.numeric_chain_id() == Some(chain_id))
    }

    pub fn is_canonical(&self, chain_id: u64) -> bool {
        chain_id == self.canonical_chain_id
    }
}

pub fn to_hex_chain_id(chain_id: u64) -> String {
    format!("0x{chain_id:x}")
}

/// Parse a chain id as reported by providers (`"0x38"`, `"56"`).
pub fn parse_chain_id(raw: &str) -> Result<u64, WalletError> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|_| WalletError::InvalidResponse {
        method: "eth_chainId".to_string(),
        detail: format!("unparsable chain id `{raw}`"),
    })
}

/// The non-fatal warning attached while connected to a non-canonical chain.
pub fn unsupported_chain_warning(chain_id: u64, canonical: u64) -> super::session::StateError {
    super::session::StateError::new(
        codes::UNSUPPORTED_CHAIN,
        format!("Connected to chain {chain_id}; switch to chain {canonical} to continue"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal_chain_ids() {
        assert_eq!(parse_chain_id("0x38").unwrap(), 56);
        assert_eq!(parse_chain_id("0x1").unwrap(), 1);
        assert_eq!(parse_chain_id("97").unwrap(), 97);
        assert!(parse_chain_id("bsc").is_err());
    }

    #[test]
    fn descriptor_serializes_in_wallet_shape() {
        let json = serde_json::to_value(bsc_mainnet()).unwrap();
        assert_eq!(json["chainId"], "0x38");
        assert_eq!(json["nativeCurrency"]["symbol"], "BNB");
        assert_eq!(json["nativeCurrency"]["decimals"], 18);
        assert!(json["rpcUrls"].as_array().unwrap().len() >= 1);
        assert_eq!(json["blockExplorerUrls"][0], "https://bscscan.com");
    }

    #[test]
    fn default_config_knows_canonical_network() {
        let config = WalletConfig::default();
        assert!(config.is_canonical(56));
        assert_eq!(config.network(56).unwrap().chain_name, "BNB Smart Chain");
        assert!(config.network(1).is_none());
    }
}
