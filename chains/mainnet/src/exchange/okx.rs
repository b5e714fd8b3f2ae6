use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};

use core_logic::{DelayRange, Randomizer, RequestBudget};
use core_logic::utils::delay::sleep_range;

use crate::chain::Chain;

const OKX_BASE_URL: &str = "https://www.okx.com";
const WITHDRAWAL_STATUS_ATTEMPTS: u32 = 100;
const WITHDRAWAL_STATUS_SLEEP: DelayRange = DelayRange(10, 10);
/// OKX funding account id, used on both sides of a sub-account transfer.
const FUNDING_ACCOUNT: &str = "6";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct OkxCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl OkxCredentials {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: env::var("OKX_API_KEY").context("OKX_API_KEY is not set")?,
            api_secret: env::var("OKX_API_SECRET").context("OKX_API_SECRET is not set")?,
            passphrase: env::var("OKX_API_PASSWORD").context("OKX_API_PASSWORD is not set")?,
        })
    }
}

/// OKX REST v5 client scoped to one wallet: withdrawals always target that
/// wallet's address, and requests go out through its proxy.
pub struct Okx {
    creds: OkxCredentials,
    http: reqwest::Client,
    budget: Arc<RequestBudget>,
    rng: Randomizer,
    wallet_address: String,
}

impl Okx {
    pub fn new(
        creds: OkxCredentials,
        http: reqwest::Client,
        budget: Arc<RequestBudget>,
        rng: Randomizer,
        wallet_address: String,
    ) -> Self {
        Self {
            creds,
            http,
            budget,
            rng,
            wallet_address,
        }
    }

    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> Result<String> {
        let prehash = format!("{timestamp}{method}{path}{body}");
        let mut mac = HmacSha256::new_from_slice(self.creds.api_secret.as_bytes())
            .map_err(|_| anyhow!("Invalid OKX secret length"))?;
        mac.update(prehash.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> Result<Value> {
        self.budget.acquire().await;

        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let body_str = body
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_default();
        let signature = self.sign(&timestamp, method, path, &body_str)?;

        let url = format!("{OKX_BASE_URL}{path}");
        let mut request = match method {
            "GET" => self.http.get(&url),
            "POST" => self.http.post(&url).body(body_str.clone()),
            other => bail!("Unsupported OKX method: {}", other),
        };

        request = request
            .header("OK-ACCESS-KEY", &self.creds.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", &self.creds.passphrase)
            .header("Content-Type", "application/json");

        let response = request.send().await.context("OKX request failed")?;
        let status = response.status();
        let payload: Value = response.json().await.context("OKX returned non-JSON")?;

        if !status.is_success() {
            bail!("OKX returned HTTP {}: {}", status, payload);
        }

        let code = payload.get("code").and_then(|c| c.as_str()).unwrap_or("");
        if code != "0" {
            bail!(
                "OKX error {}: {}",
                code,
                payload.get("msg").and_then(|m| m.as_str()).unwrap_or("?")
            );
        }

        Ok(payload.get("data").cloned().unwrap_or(Value::Null))
    }

    /// Moves every sub-account's funding balance of `ccy` into the main
    /// funding account. Individual transfer failures are logged and skipped.
    pub async fn consolidate_sub_accounts(&self, ccy: &str) -> Result<bool> {
        let subs = self
            .request("GET", "/api/v5/users/subaccount/list", None)
            .await?;

        for sub in subs.as_array().map(Vec::as_slice).unwrap_or_default() {
            let Some(name) = sub.get("subAcct").and_then(|v| v.as_str()) else {
                continue;
            };

            let path = format!(
                "/api/v5/asset/subaccount/balances?subAcct={}&ccy={}",
                name, ccy
            );
            let balances = match self.request("GET", &path, None).await {
                Ok(balances) => balances,
                Err(e) => {
                    warn!("[OKX] Couldn't read balances of sub-account {}: {e:#}", name);
                    continue;
                }
            };

            for balance in balances.as_array().map(Vec::as_slice).unwrap_or_default() {
                let avail: f64 = balance
                    .get("availBal")
                    .and_then(|v| v.as_str())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.0);
                if avail <= 0.0 {
                    continue;
                }

                let transfer = json!({
                    "ccy": ccy,
                    "amt": avail.to_string(),
                    "from": FUNDING_ACCOUNT,
                    "to": FUNDING_ACCOUNT,
                    "type": "2",
                    "subAcct": name,
                });
                match self.request("POST", "/api/v5/asset/transfer", Some(transfer)).await {
                    Ok(_) => info!("[OKX] Collected {} {} from sub-account {}", avail, ccy, name),
                    Err(e) => warn!("[OKX] Transfer from {} failed: {e:#}", name),
                }
            }
        }

        Ok(true)
    }

    async fn withdrawal_fee(&self, token: &str, chain: &Chain, configured: Option<f64>) -> Result<f64> {
        if let Some(fee) = configured {
            return Ok(fee);
        }

        let path = format!("/api/v5/asset/currencies?ccy={}", token);
        let currencies = self.request("GET", &path, None).await?;
        let wanted = format!("{}-{}", token, chain.name);

        currencies
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .find(|c| c.get("chain").and_then(|v| v.as_str()) == Some(wanted.as_str()))
            .and_then(|c| c.get("minFee").and_then(|v| v.as_str()))
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| anyhow!("No withdrawal fee found for {}", wanted))
    }

    /// Withdraws `amount` of `token` to the wallet's on-chain address and
    /// waits for the withdrawal to reach a final exchange-side state.
    pub async fn withdraw(
        &self,
        amount: f64,
        token: &str,
        chain: &Chain,
        configured_fee: Option<f64>,
    ) -> Result<bool> {
        let fee = self.withdrawal_fee(token, chain, configured_fee).await?;

        info!(
            "[OKX] Withdrawing {} {} to {} on {}",
            amount, token, self.wallet_address, chain.name
        );

        let body = json!({
            "ccy": token,
            "amt": amount.to_string(),
            "dest": "4",
            "toAddr": self.wallet_address,
            "fee": fee.to_string(),
            "chain": format!("{}-{}", token, chain.name),
        });

        let data = self.request("POST", "/api/v5/asset/withdrawal", Some(body)).await?;
        let wd_id = data
            .get(0)
            .and_then(|d| d.get("wdId"))
            .and_then(|v| v.as_str())
            .context("OKX withdrawal response missing wdId")?
            .to_string();

        self.wait_for_withdrawal(&wd_id).await
    }

    /// Polls the withdrawal state: `2` is sent, negative states are failures.
    /// Bounded to a fixed number of attempts.
    async fn wait_for_withdrawal(&self, wd_id: &str) -> Result<bool> {
        let path = format!("/api/v5/asset/withdrawal-history?wdId={}", wd_id);

        for _ in 0..WITHDRAWAL_STATUS_ATTEMPTS {
            let history = match self.request("GET", &path, None).await {
                Ok(history) => history,
                Err(e) => {
                    warn!("[OKX] Withdrawal status check failed: {e:#}");
                    sleep_range(WITHDRAWAL_STATUS_SLEEP, &self.rng).await;
                    continue;
                }
            };

            let state = history
                .get(0)
                .and_then(|d| d.get("state"))
                .and_then(|v| v.as_str())
                .unwrap_or("");

            match state {
                "2" => {
                    info!(target: "step_result", "[OKX] Withdrawal {} SUCCESS", wd_id);
                    return Ok(true);
                }
                s if s.starts_with('-') => {
                    error!(target: "step_result", "[OKX] Withdrawal {} FAILED (state {})", wd_id, s);
                    return Ok(false);
                }
                _ => sleep_range(WITHDRAWAL_STATUS_SLEEP, &self.rng).await,
            }
        }

        error!("[OKX] Withdrawal {} did not reach a final state", wd_id);
        Ok(false)
    }
}
