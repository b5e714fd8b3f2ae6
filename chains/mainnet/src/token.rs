use anyhow::{anyhow, Result};
use ethers::types::{Address, U256};
use std::collections::BTreeMap;

use crate::chain;

/// An ERC-20 (or native coin sentinel) with its per-chain deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: String,
    pub decimals: u32,
    pub is_native: bool,
    contracts: BTreeMap<String, Address>,
}

impl Token {
    fn erc20(symbol: &str, decimals: u32, contracts: &[(&str, &str)]) -> Self {
        let contracts = contracts
            .iter()
            .map(|(chain, addr)| {
                (
                    chain.to_string(),
                    addr.parse().expect("hardcoded token address"),
                )
            })
            .collect();
        Self {
            symbol: symbol.to_string(),
            decimals,
            is_native: false,
            contracts,
        }
    }

    /// Native coin of a chain; has no contract address.
    pub fn native(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals: 18,
            is_native: true,
            contracts: BTreeMap::new(),
        }
    }

    pub fn usdc() -> Self {
        Self::erc20(
            "USDC",
            6,
            &[
                (chain::POLYGON, "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
                (chain::GNOSIS, "0xDDAfbb505ad214D7b80b1f830fcCc89B60fb7A83"),
            ],
        )
    }

    pub fn ageur() -> Self {
        Self::erc20(
            "agEUR",
            18,
            &[
                (chain::POLYGON, "0xE0B52e49357Fd4DAf2c15e02058DCE6BC0057db4"),
                (chain::CELO, "0xC16B81Af351BA9e64C1a069E3Ab18c244A1E3049"),
                (chain::GNOSIS, "0x4b1E2c2762667331Bc91648052F646d1b0d35984"),
            ],
        )
    }

    pub fn stg() -> Self {
        Self::erc20(
            "STG",
            18,
            &[(chain::POLYGON, "0x2F6F07CDcf3588944Bf4C42aC74ff24bF56e7590")],
        )
    }

    /// Binance-pegged USDT uses 18 decimals, unlike the usual 6.
    pub fn usdt_bsc() -> Self {
        Self::erc20(
            "USDT",
            18,
            &[(chain::BSC, "0x55d398326f99059fF775485246999027B3197955")],
        )
    }

    pub fn contract_on(&self, chain_name: &str) -> Result<Address> {
        self.contracts
            .get(chain_name)
            .copied()
            .ok_or_else(|| anyhow!("{} has no deployment on {}", self.symbol, chain_name))
    }

    pub fn to_wei(&self, amount: f64) -> U256 {
        let scaled = amount * 10f64.powi(self.decimals as i32);
        U256::from(scaled.max(0.0) as u128)
    }

    pub fn from_wei(&self, amount: U256) -> f64 {
        amount.as_u128() as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// `balance * (1 - fraction)` in integer math; used to leave dust behind
/// when spending "everything".
pub fn fraction_remaining(balance: U256, fraction: f64) -> U256 {
    let keep_ppb = (fraction * 1e9) as u128;
    balance - balance * U256::from(keep_ppb) / U256::from(1_000_000_000u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usdc_decimals_and_contracts() {
        let usdc = Token::usdc();
        assert_eq!(usdc.decimals, 6);
        assert!(usdc.contract_on(chain::POLYGON).is_ok());
        assert!(usdc.contract_on(chain::BSC).is_err());
    }

    #[test]
    fn test_wei_round_trip() {
        let ageur = Token::ageur();
        let wei = ageur.to_wei(1.5);
        assert_eq!(wei, U256::from(1_500_000_000_000_000_000u128));
        assert!((ageur.from_wei(wei) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_native_token_has_no_contract() {
        let matic = Token::native("MATIC");
        assert!(matic.is_native);
        assert!(matic.contract_on(chain::POLYGON).is_err());
    }

    #[test]
    fn test_fraction_remaining_leaves_dust() {
        let balance = U256::from(1_000_000_000u64);
        let spend = fraction_remaining(balance, 0.1);
        assert_eq!(spend, U256::from(900_000_000u64));
        assert_eq!(fraction_remaining(balance, 0.0), balance);
    }
}
