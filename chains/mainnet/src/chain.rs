use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

use crate::config::ChainSettings;

/// Chain names the engine refers to by string. Kept in one place so typos in
/// route maps fail loudly against the registry.
pub const ETHEREUM: &str = "Ethereum";
pub const POLYGON: &str = "Polygon";
pub const BSC: &str = "BSC";
pub const CELO: &str = "Celo";
pub const GNOSIS: &str = "Gnosis";

/// One EVM network: identity, LayerZero endpoint id and RPC/explorer URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub name: String,
    pub chain_id: u64,
    pub lz_chain_id: u16,
    pub rpc_url: String,
    pub explorer: String,
    pub coin_symbol: String,
}

/// All configured chains, keyed by name.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: BTreeMap<String, Chain>,
}

impl ChainRegistry {
    pub fn from_config(settings: &BTreeMap<String, ChainSettings>) -> Result<Self> {
        let mut chains = BTreeMap::new();

        for (name, s) in settings {
            if s.rpc_url.is_empty() {
                // Chains without an RPC stay addressable as bridge
                // destinations but cannot act as a source.
                tracing::debug!("Chain {} configured without an RPC endpoint", name);
            }
            chains.insert(
                name.clone(),
                Chain {
                    name: name.clone(),
                    chain_id: s.chain_id,
                    lz_chain_id: s.lz_chain_id,
                    rpc_url: s.rpc_url.clone(),
                    explorer: s.explorer.clone(),
                    coin_symbol: s.coin_symbol.clone(),
                },
            );
        }

        Ok(Self { chains })
    }

    pub fn get(&self, name: &str) -> Result<&Chain> {
        self.chains
            .get(name)
            .ok_or_else(|| anyhow!("Unknown chain: {}", name))
    }

    /// Like [`get`], but additionally requires a usable RPC endpoint.
    pub fn require_rpc(&self, name: &str) -> Result<&Chain> {
        let chain = self.get(name)?;
        if chain.rpc_url.is_empty() {
            return Err(anyhow!("No RPC endpoint configured for chain {}", name));
        }
        Ok(chain)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(name: &str, rpc: &str) -> (String, ChainSettings) {
        (
            name.to_string(),
            ChainSettings {
                chain_id: 137,
                lz_chain_id: 109,
                rpc_url: rpc.to_string(),
                explorer: "https://polygonscan.com/".to_string(),
                coin_symbol: "MATIC".to_string(),
            },
        )
    }

    #[test]
    fn test_registry_lookup() {
        let map = BTreeMap::from([settings(POLYGON, "https://rpc.example")]);
        let registry = ChainRegistry::from_config(&map).unwrap();
        assert_eq!(registry.get(POLYGON).unwrap().chain_id, 137);
        assert!(registry.get("Plasma").is_err());
    }

    #[test]
    fn test_require_rpc_rejects_empty_endpoint() {
        let map = BTreeMap::from([settings(GNOSIS, "")]);
        let registry = ChainRegistry::from_config(&map).unwrap();
        assert!(registry.get(GNOSIS).is_ok());
        assert!(registry.require_rpc(GNOSIS).is_err());
    }
}
