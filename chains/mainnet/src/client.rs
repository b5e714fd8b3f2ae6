use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers::abi;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::to_checksum;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use core_logic::{
    AddressDeriver, DelayRange, FeeProbe, MetricsCollector, ProxyConfig, Randomizer, RequestBudget,
};
use core_logic::utils::delay::sleep_range;
use tracing::{error, info, warn};

use crate::chain::Chain;
use crate::config::AppConfig;
use crate::token::{fraction_remaining, Token};

/// Minimal ERC-20 surface used across the dapps.
pub const ERC20_ABI: &str = r#"[
    {"constant":true,"inputs":[{"name":"_owner","type":"address"}],"name":"balanceOf","outputs":[{"name":"balance","type":"uint256"}],"type":"function"},
    {"constant":false,"inputs":[{"name":"_spender","type":"address"},{"name":"_value","type":"uint256"}],"name":"approve","outputs":[{"name":"","type":"bool"}],"type":"function"},
    {"constant":true,"inputs":[{"name":"_owner","type":"address"},{"name":"_spender","type":"address"}],"name":"allowance","outputs":[{"name":"","type":"uint256"}],"type":"function"},
    {"constant":false,"inputs":[{"name":"_to","type":"address"},{"name":"_value","type":"uint256"}],"name":"transfer","outputs":[{"name":"","type":"bool"}],"type":"function"},
    {"constant":true,"inputs":[{"name":"_owner","type":"address"}],"name":"nonces","outputs":[{"name":"","type":"uint256"}],"type":"function"}
]"#;

const GAS_MULTIPLIER: f64 = 1.2;
const BSC_FIXED_GAS_PRICE_GWEI: f64 = 1.5;
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(600);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const HTTP_TIMEOUT: Duration = Duration::from_secs(100);

pub fn parse_erc20_abi() -> abi::Abi {
    serde_json::from_str(ERC20_ABI).expect("static ERC-20 ABI")
}

/// Per-wallet EVM access: a signer plus a provider that routes every RPC and
/// API request through the wallet's assigned proxy.
pub struct EvmClient {
    wallet: LocalWallet,
    pub address: Address,
    chain: Chain,
    provider: Provider<Http>,
    http: reqwest::Client,
    budget: Arc<RequestBudget>,
    cfg: Arc<AppConfig>,
    rng: Randomizer,
}

impl EvmClient {
    pub fn new(
        private_key: &str,
        proxy: Option<&str>,
        chain: Chain,
        cfg: Arc<AppConfig>,
        budget: Arc<RequestBudget>,
        rng: Randomizer,
    ) -> Result<Self> {
        let wallet = private_key
            .parse::<LocalWallet>()
            .context("Invalid private key")?;
        let address = wallet.address();

        let http = build_http_client(proxy)?;
        let provider = provider_with_client(&chain, http.clone())?;

        Ok(Self {
            wallet,
            address,
            chain,
            provider,
            http,
            budget,
            cfg,
            rng,
        })
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }

    pub fn http_client(&self) -> reqwest::Client {
        self.http.clone()
    }

    pub fn provider(&self) -> &Provider<Http> {
        &self.provider
    }

    /// Points the client at another chain; subsequent calls use its RPC.
    pub fn change_chain(&mut self, chain: &Chain) -> Result<()> {
        if self.chain != *chain {
            self.provider = provider_with_client(chain, self.http.clone())?;
            self.chain = chain.clone();
        }
        Ok(())
    }

    fn provider_for(&self, chain: &Chain) -> Result<Provider<Http>> {
        provider_with_client(chain, self.http.clone())
    }

    async fn tx_params(
        &self,
        to: Address,
        data: Option<Bytes>,
        value: Option<U256>,
    ) -> Result<TransactionRequest> {
        let nonce = self
            .provider
            .get_transaction_count(self.address, None)
            .await?;

        // BSC pins a flat gas price; everywhere else the node's quote is used.
        let gas_price = if self.chain.chain_id == 56 {
            ethers::utils::parse_units(BSC_FIXED_GAS_PRICE_GWEI, "gwei")?.into()
        } else {
            self.provider.get_gas_price().await?
        };

        let mut tx = TransactionRequest::new()
            .from(self.address)
            .to(to)
            .nonce(nonce)
            .chain_id(self.chain.chain_id)
            .gas_price(gas_price);

        if let Some(data) = data {
            tx = tx.data(data);
        }
        if let Some(value) = value {
            tx = tx.value(value);
        }

        Ok(tx)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Option<U256> {
        let typed: TypedTransaction = tx.clone().into();
        match self.provider.estimate_gas(&typed, None).await {
            Ok(gas) => Some(gas * U256::from((GAS_MULTIPLIER * 100.0) as u64) / U256::from(100u64)),
            Err(e) => {
                warn!("Transaction estimate failed: {e:#}");
                None
            }
        }
    }

    /// Signs and submits one transaction. Estimation or submission failures
    /// are logged and surface as `None` so the caller can treat the step as
    /// failed without tearing down the cycle.
    pub async fn send_transaction(
        &self,
        to: Address,
        data: Option<Bytes>,
        value: Option<U256>,
    ) -> Result<Option<TxHash>> {
        let tx = self.tx_params(to, data, value).await?;

        let Some(gas) = self.estimate_gas(&tx).await else {
            return Ok(None);
        };
        let tx = tx.gas(gas);

        let signer = SignerMiddleware::new(
            self.provider.clone(),
            self.wallet.clone().with_chain_id(self.chain.chain_id),
        );

        let result = match signer.send_transaction(tx, None).await {
            Ok(pending) => Ok(Some(pending.tx_hash())),
            Err(e) => {
                error!("Error while sending transaction: {e:#}");
                Ok(None)
            }
        };
        result
    }

    /// Waits for the receipt and reports on-chain success.
    pub async fn verify_tx(&self, tx_hash: TxHash) -> bool {
        let started = Instant::now();

        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    MetricsCollector::global().record_rpc_latency(started.elapsed());
                    let link = format!("{}tx/{:?}", self.chain.explorer, tx_hash);
                    return if receipt.status == Some(U64::from(1)) {
                        info!(target: "step_result", "Transaction SUCCESS: {}", link);
                        true
                    } else {
                        error!(target: "step_result", "Transaction FAILED: {}", link);
                        false
                    };
                }
                Ok(None) => {
                    if started.elapsed() > RECEIPT_TIMEOUT {
                        error!("Receipt for {:?} not found within timeout", tx_hash);
                        return false;
                    }
                    tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
                }
                Err(e) => {
                    error!("Unexpected error while verifying {:?}: {e:#}", tx_hash);
                    return false;
                }
            }
        }
    }

    pub async fn block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    /// Native balance on an arbitrary chain, without switching the client.
    pub async fn get_native_balance(&self, chain: &Chain) -> Result<U256> {
        let provider = self.provider_for(chain)?;
        let started = Instant::now();
        let balance = provider
            .get_balance(self.address, None)
            .await
            .with_context(|| format!("Could not get balance of {:?}", self.address))?;
        MetricsCollector::global().record_rpc_latency(started.elapsed());
        Ok(balance)
    }

    /// Balance of a token on the current chain, in wei.
    pub async fn get_token_balance(&self, token: &Token) -> Result<U256> {
        if token.is_native {
            return self.get_native_balance(&self.chain.clone()).await;
        }

        let contract = Contract::new(
            token.contract_on(&self.chain.name)?,
            parse_erc20_abi(),
            Arc::new(self.provider.clone()),
        );

        let balance: U256 = contract
            .method("balanceOf", self.address)?
            .call()
            .await
            .context("balanceOf call failed")?;
        Ok(balance)
    }

    pub async fn allowance(&self, token: &Token, spender: Address) -> Result<U256> {
        let contract = Contract::new(
            token.contract_on(&self.chain.name)?,
            parse_erc20_abi(),
            Arc::new(self.provider.clone()),
        );
        let allowance: U256 = contract
            .method("allowance", (self.address, spender))?
            .call()
            .await
            .context("allowance call failed")?;
        Ok(allowance)
    }

    /// Approves `spender` for `value`, skipping the transaction when the
    /// current allowance already covers it. Native tokens never need one.
    pub async fn approve(&self, spender: Address, token: &Token, value: U256) -> Result<bool> {
        if token.is_native {
            return Ok(true);
        }

        let allowance = self.allowance(token, spender).await?;
        if allowance >= value {
            warn!(
                "Allowance is greater than approve value: {} >= {}",
                token.from_wei(allowance),
                token.from_wei(value)
            );
            return Ok(true);
        }

        info!(
            "Approving {} {} for spender: {:?}",
            token.from_wei(value),
            token.symbol,
            spender
        );

        let contract_addr = token.contract_on(&self.chain.name)?;
        let contract = Contract::new(
            contract_addr,
            parse_erc20_abi(),
            Arc::new(self.provider.clone()),
        );
        let data = contract.encode("approve", (spender, value))?;

        let Some(tx_hash) = self.send_transaction(contract_addr, Some(data), None).await? else {
            error!("Error in approve transaction");
            return Ok(false);
        };

        if self.verify_tx(tx_hash).await {
            sleep_range(self.cfg.delays.after_approve_delay_range, &self.rng).await;
            return Ok(true);
        }

        error!("Error in approve transaction");
        Ok(false)
    }

    /// Transfers a token, defaulting to the full balance minus dust.
    pub async fn send_erc20(
        &self,
        token: &Token,
        recipient: &str,
        amount: Option<U256>,
    ) -> Result<bool> {
        let amount = match amount {
            Some(amount) => amount,
            None => {
                let balance = self.get_token_balance(token).await?;
                fraction_remaining(balance, self.cfg.swap.max_left_token_percentage)
            }
        };

        let recipient: Address = recipient.parse().context("Invalid recipient address")?;
        let contract_addr = token.contract_on(&self.chain.name)?;
        let contract = Contract::new(
            contract_addr,
            parse_erc20_abi(),
            Arc::new(self.provider.clone()),
        );
        let data = contract.encode("transfer", (recipient, amount))?;

        info!(
            "Sending {} {} to {:?}",
            token.from_wei(amount),
            token.symbol,
            recipient
        );

        let Some(tx_hash) = self.send_transaction(contract_addr, Some(data), None).await? else {
            return Ok(false);
        };

        Ok(self.verify_tx(tx_hash).await)
    }

    /// Polls the destination chain until the token balance grows past the
    /// recorded initial value. Unbounded: bridged funds always land
    /// eventually or the operator interrupts.
    pub async fn wait_for_funds(
        &mut self,
        initial_balance: U256,
        chain: &Chain,
        token: &Token,
        check_range: DelayRange,
    ) -> Result<bool> {
        self.change_chain(chain)?;
        info!("Waiting for funds on {}", chain.name);

        loop {
            match self.get_token_balance(token).await {
                Ok(balance) if balance > initial_balance => {
                    info!(
                        target: "step_result",
                        "Funds on {} received: SUCCESS ({} {})",
                        chain.name,
                        token.from_wei(balance),
                        token.symbol
                    );
                    return Ok(true);
                }
                Ok(_) => {}
                Err(e) => warn!("Balance check on {} failed: {e:#}", chain.name),
            }
            sleep_range(check_range, &self.rng).await;
        }
    }

    /// Blocks until `confirmations + extra` blocks elapsed past `sent_block`.
    pub async fn wait_for_block_confirmations(
        &self,
        sent_block: u64,
        confirmations: u64,
        extra_blocks: u64,
        check_range: DelayRange,
    ) -> bool {
        info!("Waiting for {} blockchain confirmations", confirmations);

        loop {
            match self.block_number().await {
                Ok(current) if current.saturating_sub(sent_block) > confirmations + extra_blocks => {
                    info!(
                        target: "step_result",
                        "Reached {} confirmations: SUCCESS", confirmations
                    );
                    return true;
                }
                Ok(_) => {}
                Err(e) => error!("Failed to get current block number: {e:#}"),
            }
            sleep_range(check_range, &self.rng).await;
        }
    }

    /// Rate-budgeted JSON GET through the wallet's proxy. All failures are
    /// logged and collapse to `None` for the retry wrapper to handle.
    pub async fn get_json(&self, url: &str, headers: &[(&str, String)]) -> Option<Value> {
        self.budget.acquire().await;

        let mut request = self.http.get(url).timeout(HTTP_TIMEOUT);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Connection error: {e:#}");
                return None;
            }
        };

        if !response.status().is_success() {
            error!("Received non-200 response from {}: {}", url, response.status());
            return None;
        }

        match response.json::<Value>().await {
            Ok(json) => Some(json),
            Err(e) => {
                error!("Invalid JSON from {}: {e:#}", url);
                None
            }
        }
    }

    /// Unix deadline `seconds` from now, for permit and swap expiries.
    pub fn deadline(&self, seconds: i64) -> u64 {
        (chrono::Utc::now().timestamp() + seconds) as u64
    }
}

#[async_trait]
impl FeeProbe for EvmClient {
    async fn gas_price_wei(&self) -> Result<u128> {
        Ok(self.provider.get_gas_price().await?.as_u128())
    }
}

fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    if let Some(line) = proxy {
        let proxy_conf = ProxyConfig::parse(line)
            .ok_or_else(|| anyhow!("Invalid proxy line: {}", line))?;
        let mut proxy = reqwest::Proxy::all(&proxy_conf.url)?;
        if let (Some(user), Some(pass)) = (&proxy_conf.username, &proxy_conf.password) {
            proxy = proxy.basic_auth(user, pass);
        }
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

fn provider_with_client(chain: &Chain, client: reqwest::Client) -> Result<Provider<Http>> {
    if chain.rpc_url.is_empty() {
        return Err(anyhow!("No RPC endpoint configured for chain {}", chain.name));
    }
    let url = reqwest::Url::parse(&chain.rpc_url)
        .with_context(|| format!("Invalid RPC URL for {}", chain.name))?;
    Ok(Provider::new(Http::new_with_client(url, client)))
}

/// Checksummed address derivation for the wallet store.
pub struct EthersDeriver;

impl AddressDeriver for EthersDeriver {
    fn derive(&self, private_key: &str) -> Result<String> {
        let wallet = private_key
            .parse::<LocalWallet>()
            .context("Invalid private key")?;
        Ok(to_checksum(&wallet.address(), None))
    }
}

/// Fee probe pinned to one chain's RPC, used for the global mainnet gas gate.
pub struct FeeOracle {
    provider: Provider<Http>,
}

impl FeeOracle {
    pub fn new(chain: &Chain) -> Result<Self> {
        Ok(Self {
            provider: provider_with_client(chain, reqwest::Client::new())?,
        })
    }
}

#[async_trait]
impl FeeProbe for FeeOracle {
    async fn gas_price_wei(&self) -> Result<u128> {
        Ok(self.provider.get_gas_price().await?.as_u128())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deriver_produces_checksummed_address() {
        // Well-known test vector key.
        let key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        let address = EthersDeriver.derive(key).unwrap();
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42);
        // Checksummed form is stable.
        assert_eq!(address, EthersDeriver.derive(key).unwrap());
    }

    #[test]
    fn test_deriver_rejects_garbage() {
        assert!(EthersDeriver.derive("not-a-key").is_err());
    }

    #[test]
    fn test_erc20_abi_parses() {
        let abi = parse_erc20_abi();
        assert!(abi.function("approve").is_ok());
        assert!(abi.function("transfer").is_ok());
    }
}
