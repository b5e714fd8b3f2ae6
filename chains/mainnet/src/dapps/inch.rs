use anyhow::{Context, Result};
use ethers::types::{Address, Bytes, U256};
use std::env;
use std::sync::Arc;
use tracing::{error, info};

use crate::chain::Chain;
use crate::client::EvmClient;
use crate::config::AppConfig;
use crate::token::{fraction_remaining, Token};

const INCH_BASE_URL: &str = "https://api.1inch.dev/swap/v5.2";
const INCH_ROUTER: &str = "0x1111111254EEB25477B68fb85Ed929f73A960582";

/// 1inch aggregator swaps on Polygon. The API returns ready-to-send calldata
/// for its router; the client only approves and submits.
pub struct Inch {
    api_key: String,
    cfg: Arc<AppConfig>,
}

impl Inch {
    pub fn from_env(cfg: Arc<AppConfig>) -> Self {
        Self {
            api_key: env::var("INCH_API_KEY").unwrap_or_default(),
            cfg,
        }
    }

    fn router() -> Address {
        INCH_ROUTER.parse().expect("hardcoded router address")
    }

    async fn get_swap_calldata(
        &self,
        client: &EvmClient,
        amount: U256,
        token_in: &Token,
        token_out: &Token,
        slippage: f64,
    ) -> Result<Option<Bytes>> {
        let chain = client.chain();
        let url = format!(
            "{}/{}/swap?src={:?}&dst={:?}&amount={}&from={:?}&slippage={}",
            INCH_BASE_URL,
            chain.chain_id,
            token_in.contract_on(&chain.name)?,
            token_out.contract_on(&chain.name)?,
            amount,
            client.address,
            slippage,
        );

        let headers = [
            ("Authorization", self.api_key.clone()),
            ("accept", "application/json".to_string()),
        ];

        let Some(data) = client.get_json(&url, &headers).await else {
            return Ok(None);
        };

        let calldata = data
            .pointer("/tx/data")
            .and_then(|v| v.as_str())
            .context("1inch response missing tx.data")?;
        let raw = hex::decode(calldata.trim_start_matches("0x"))
            .context("1inch returned non-hex calldata")?;

        Ok(Some(Bytes::from(raw)))
    }

    /// Swaps `token_in` -> `token_out` on Polygon; spends the full balance
    /// minus dust unless an explicit amount is given.
    pub async fn swap(
        &self,
        client: &mut EvmClient,
        polygon: &Chain,
        token_in: &Token,
        token_out: &Token,
        amount: Option<U256>,
    ) -> Result<bool> {
        client.change_chain(polygon)?;

        let amount = match amount {
            Some(amount) => amount,
            None => {
                let balance = client.get_token_balance(token_in).await?;
                fraction_remaining(balance, self.cfg.swap.max_left_token_percentage)
            }
        };

        if amount.is_zero() {
            error!(
                "[1INCH] {} balance on {} is zero, nothing to swap",
                token_in.symbol, polygon.name
            );
            return Ok(false);
        }

        if !client.approve(Self::router(), token_in, amount).await? {
            return Ok(false);
        }

        let Some(calldata) = self
            .get_swap_calldata(client, amount, token_in, token_out, self.cfg.swap.max_slippage)
            .await?
        else {
            return Ok(false);
        };

        info!(
            "[1INCH] Swapping {} {} to {}",
            token_in.from_wei(amount),
            token_in.symbol,
            token_out.symbol
        );

        let Some(tx_hash) = client
            .send_transaction(Self::router(), Some(calldata), None)
            .await?
        else {
            return Ok(false);
        };

        Ok(client.verify_tx(tx_hash).await)
    }
}
