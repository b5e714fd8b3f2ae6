//! Production capability wiring: one bundle per wallet, routing every call
//! through that wallet's proxy and signer.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use core_logic::{Randomizer, RequestBudget, WalletRecord, WarmupAction};

use crate::chain::{ChainRegistry, ETHEREUM, POLYGON};
use crate::client::EvmClient;
use crate::config::AppConfig;
use crate::dapps::{Angle, BridgeProductSet, Inch};
use crate::exchange::{Okx, OkxCredentials};
use crate::modes::{CycleOps, OpsFactory, WarmupOps};
use crate::token::Token;

pub struct MainnetOpsFactory {
    cfg: Arc<AppConfig>,
    registry: Arc<ChainRegistry>,
    budget: Arc<RequestBudget>,
    rng: Randomizer,
    okx_creds: Option<OkxCredentials>,
}

impl MainnetOpsFactory {
    pub fn new(
        cfg: Arc<AppConfig>,
        registry: Arc<ChainRegistry>,
        budget: Arc<RequestBudget>,
        rng: Randomizer,
    ) -> Self {
        let okx_creds = OkxCredentials::from_env().ok();
        if okx_creds.is_none() {
            warn!("OKX credentials not set; exchange steps will fail if reached");
        }
        Self {
            cfg,
            registry,
            budget,
            rng,
            okx_creds,
        }
    }

    fn client_for(&self, record: &WalletRecord, chain_name: &str) -> Result<EvmClient> {
        let chain = self.registry.require_rpc(chain_name)?.clone();
        EvmClient::new(
            &record.private_key,
            record.proxy.as_deref(),
            chain,
            self.cfg.clone(),
            self.budget.clone(),
            self.rng.clone(),
        )
    }

    fn okx_for(&self, record: &WalletRecord, http: reqwest::Client) -> Result<Okx> {
        let creds = self
            .okx_creds
            .clone()
            .ok_or_else(|| anyhow!("OKX credentials are not configured"))?;
        Ok(Okx::new(
            creds,
            http,
            self.budget.clone(),
            self.rng.clone(),
            record.address.clone(),
        ))
    }
}

#[async_trait]
impl OpsFactory for MainnetOpsFactory {
    fn cycle_ops(&self, record: &WalletRecord) -> Result<Box<dyn CycleOps>> {
        let client = self.client_for(record, POLYGON)?;
        let okx = self.okx_for(record, client.http_client())?;
        let inch = Inch::from_env(self.cfg.clone());
        let angle = Angle::new(
            self.cfg.clone(),
            self.registry.clone(),
            self.budget.clone(),
            self.rng.clone(),
        );

        Ok(Box::new(MainnetCycleOps {
            client: Mutex::new(client),
            okx,
            inch,
            angle,
            cfg: self.cfg.clone(),
            registry: self.registry.clone(),
        }))
    }

    fn warmup_ops(&self, record: &WalletRecord) -> Result<Box<dyn WarmupOps>> {
        let client = self.client_for(record, ETHEREUM)?;
        let okx = self.okx_for(record, client.http_client()).ok();
        let products = BridgeProductSet::from_config(&self.cfg);

        Ok(Box::new(MainnetWarmupOps {
            client: Mutex::new(client),
            okx,
            products,
            cfg: self.cfg.clone(),
            registry: self.registry.clone(),
        }))
    }

    async fn rotate_ip(&self) -> Result<bool> {
        let Some(url) = self.cfg.store.proxy_change_ip_url.as_deref() else {
            warn!("Mobile proxy mode is on but no change-IP URL is configured");
            return Ok(false);
        };

        let response = reqwest::get(url).await.context("Change-IP request failed")?;
        if response.status().is_success() {
            debug!("Successfully changed egress IP address");
            Ok(true)
        } else {
            warn!("Couldn't change egress IP address: {}", response.status());
            Ok(false)
        }
    }
}

struct MainnetCycleOps {
    client: Mutex<EvmClient>,
    okx: Okx,
    inch: Inch,
    angle: Angle,
    cfg: Arc<AppConfig>,
    registry: Arc<ChainRegistry>,
}

#[async_trait]
impl CycleOps for MainnetCycleOps {
    async fn consolidate_and_withdraw(&self, amount: f64) -> Result<bool> {
        self.okx.consolidate_sub_accounts("USDC").await?;
        let polygon = self.registry.get(POLYGON)?;
        let fee = self.cfg.okx.withdraw.get(POLYGON).map(|rule| rule.fee);
        self.okx.withdraw(amount, "USDC", polygon, fee).await
    }

    async fn swap_usdc_to_ageur(&self) -> Result<bool> {
        let polygon = self.registry.require_rpc(POLYGON)?;
        let mut client = self.client.lock().await;
        self.inch
            .swap(&mut client, polygon, &Token::usdc(), &Token::ageur(), None)
            .await
    }

    async fn swap_ageur_to_usdc(&self) -> Result<bool> {
        let polygon = self.registry.require_rpc(POLYGON)?;
        let mut client = self.client.lock().await;
        self.inch
            .swap(&mut client, polygon, &Token::ageur(), &Token::usdc(), None)
            .await
    }

    async fn bridge_ageur(&self, src: &str, dst: &str) -> Result<bool> {
        let src = self.registry.require_rpc(src)?.clone();
        let dst = self.registry.require_rpc(dst)?.clone();
        let mut client = self.client.lock().await;
        self.angle.bridge(&mut client, &src, &dst).await
    }

    async fn send_usdc_to_deposit(&self, recipient: &str) -> Result<bool> {
        let polygon = self.registry.require_rpc(POLYGON)?.clone();
        let mut client = self.client.lock().await;
        client.change_chain(&polygon)?;
        client.send_erc20(&Token::usdc(), recipient, None).await
    }

    async fn await_deposit_confirmations(&self) -> Result<bool> {
        let client = self.client.lock().await;
        let sent_block = client.block_number().await?;
        Ok(client
            .wait_for_block_confirmations(
                sent_block,
                self.cfg.confirmations.polygon_blocks,
                self.cfg.confirmations.extra_blocks,
                self.cfg.delays.block_check_range,
            )
            .await)
    }
}

struct MainnetWarmupOps {
    client: Mutex<EvmClient>,
    okx: Option<Okx>,
    products: BridgeProductSet,
    cfg: Arc<AppConfig>,
    registry: Arc<ChainRegistry>,
}

#[async_trait]
impl WarmupOps for MainnetWarmupOps {
    async fn native_balance_wei(&self, chain: &str) -> Result<u128> {
        let chain = self.registry.require_rpc(chain)?;
        let client = self.client.lock().await;
        Ok(client.get_native_balance(chain).await?.as_u128())
    }

    async fn exchange_topup(&self, chain: &str, amount: f64) -> Result<bool> {
        let okx = self
            .okx
            .as_ref()
            .ok_or_else(|| anyhow!("OKX credentials are not configured"))?;
        let chain = self.registry.get(chain)?;
        let fee = self.cfg.okx.withdraw.get(&chain.name).map(|rule| rule.fee);
        okx.withdraw(amount, &chain.coin_symbol, chain, fee).await
    }

    async fn execute(&self, action: &WarmupAction, amount: f64) -> Result<bool> {
        let src = self.registry.require_rpc(&action.src)?.clone();
        let dst = self.registry.get(&action.dst)?.clone();
        let mut client = self.client.lock().await;
        self.products
            .execute(&mut client, action.product, &src, &dst, amount)
            .await
    }
}
