use anyhow::{Context, Result};
use ethers::types::{Address, Bytes, U256};
use std::env;
use tracing::{error, info};

use crate::client::EvmClient;
use crate::token::Token;

/// 0x aggregator, used by the warmup products to enter a bridgeable token
/// from the chain's native coin before bridging.
pub struct ZeroX {
    api_key: String,
}

impl ZeroX {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("ZEROX_API_KEY").unwrap_or_default(),
        }
    }

    fn api_host(chain_name: &str) -> String {
        match chain_name {
            "BSC" => "https://bsc.api.0x.org".to_string(),
            "Polygon" => "https://polygon.api.0x.org".to_string(),
            other => format!("https://{}.api.0x.org", other.to_lowercase()),
        }
    }

    /// Sells `sell_amount` of the native coin for `buy_token` on the
    /// client's current chain.
    pub async fn swap_native_for(
        &self,
        client: &EvmClient,
        buy_token: &Token,
        sell_amount: U256,
    ) -> Result<bool> {
        let chain = client.chain().clone();

        if sell_amount.is_zero() {
            error!("[0x] Sell amount on {} is zero", chain.name);
            return Ok(false);
        }

        let url = format!(
            "{}/swap/v1/quote?buyToken={:?}&sellToken={}&sellAmount={}&takerAddress={:?}",
            Self::api_host(&chain.name),
            buy_token.contract_on(&chain.name)?,
            chain.coin_symbol,
            sell_amount,
            client.address,
        );

        let headers = [("0x-api-key", self.api_key.clone())];
        let Some(quote) = client.get_json(&url, &headers).await else {
            return Ok(false);
        };

        let to: Address = quote
            .get("to")
            .and_then(|v| v.as_str())
            .context("0x quote missing 'to'")?
            .parse()?;
        let calldata = quote
            .get("data")
            .and_then(|v| v.as_str())
            .context("0x quote missing 'data'")?;
        let data = Bytes::from(hex::decode(calldata.trim_start_matches("0x"))?);

        info!(
            "[0x] Swapping {} {} into {} on {}",
            ethers::utils::format_units(sell_amount, 18).unwrap_or_default(),
            chain.coin_symbol,
            buy_token.symbol,
            chain.name
        );

        let Some(tx_hash) = client
            .send_transaction(to, Some(data), Some(sell_amount))
            .await?
        else {
            return Ok(false);
        };

        Ok(client.verify_tx(tx_hash).await)
    }
}
