//! Warmup orchestration.
//!
//! Loops over the store picking random wallets and executing one eligible
//! bridge action per tick until every wallet's budget is exhausted. Each
//! successful action decrements exactly one counter; wallets whose terminal
//! counter hits zero are removed. A tick failure leaves state untouched and
//! the scheduler simply moves on.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use core_logic::utils::delay::sleep_range;
use core_logic::{
    retry_flag, ActionSelector, FeeProbe, GasGate, MetricsCollector, ModeStats, Randomizer,
    RecordPatch, RetryPolicy, WalletStore,
};

use crate::config::AppConfig;
use crate::modes::OpsFactory;

enum Tick {
    Executed(bool),
    Skipped,
    Empty,
}

pub struct WarmupMode {
    store: WalletStore,
    cfg: Arc<AppConfig>,
    ops: Arc<dyn OpsFactory>,
    gas_gate: GasGate,
    fee_probe: Arc<dyn FeeProbe>,
    retry: RetryPolicy,
    rng: Randomizer,
}

impl WarmupMode {
    pub fn new(
        store: WalletStore,
        cfg: Arc<AppConfig>,
        ops: Arc<dyn OpsFactory>,
        fee_probe: Arc<dyn FeeProbe>,
        rng: Randomizer,
    ) -> Self {
        let gas_gate = GasGate::new(cfg.gas.threshold_gwei, cfg.gas.delay_range)
            .with_poll_ceiling(cfg.gas.max_polls);
        let retry = cfg.retry_policy();
        Self {
            store,
            cfg,
            ops,
            gas_gate,
            fee_probe,
            retry,
            rng,
        }
    }

    pub async fn run(mut self, token: CancellationToken) -> Result<ModeStats> {
        let mut stats = ModeStats::default();

        loop {
            if token.is_cancelled() {
                info!("[Warmup] Cancelled");
                break;
            }

            match self.tick().await {
                Ok(Tick::Empty) => break,
                Ok(Tick::Skipped) => continue,
                Ok(Tick::Executed(true)) => stats.success += 1,
                Ok(Tick::Executed(false)) => stats.failed += 1,
                Err(e) => {
                    // A broken tick must not kill the scheduler; the wallet
                    // stays as persisted and gets re-picked later.
                    error!("[Warmup] Error occurred: {e:#}");
                    stats.failed += 1;
                }
            }
        }

        info!("[Warmup] Warmup ended");
        Ok(stats)
    }

    async fn tick(&mut self) -> Result<Tick> {
        if self.cfg.store.use_mobile_proxy {
            if let Err(e) = self.ops.rotate_ip().await {
                warn!("[Warmup] Couldn't change egress IP: {e:#}");
            }
        }

        let Some(index) = self.store.pick_random(&self.rng) else {
            return Ok(Tick::Empty);
        };
        let record = self
            .store
            .record(index)
            .cloned()
            .expect("picked index exists");

        debug!("[Warmup] Wallet: {}", record.address);
        info!(
            "[Warmup] Transactions left for this wallet: {}",
            record.warmup_tx_count()
        );

        let Some(action) = ActionSelector::pick(&record, &self.rng) else {
            if self.store.remove_if_exhausted(index)? {
                warn!("[Warmup] No actions left for this wallet");
            }
            return Ok(Tick::Skipped);
        };

        let ops = self.ops.warmup_ops(&record)?;
        let started = std::time::Instant::now();

        let mut balance_wei = ops.native_balance_wei(&action.src).await?;

        // Optional exchange top-up when the source chain runs dry.
        if let Some(rule) = self.cfg.okx.withdraw.get(&action.src) {
            let min_balance_wei = (rule.min_balance * 1e18) as u128;
            if rule.enabled && balance_wei < min_balance_wei {
                let amount = rule.amount.sample(&self.rng, self.cfg.swap.round_to);
                if !ops.exchange_topup(&action.src, amount).await? {
                    warn!("[Warmup] Top-up on {} failed", action.src);
                }
                balance_wei = ops.native_balance_wei(&action.src).await?;
            }
        }

        let amount = round_to(
            (balance_wei as f64 / 1e18) * self.cfg.swap.token_use_percentage,
            self.cfg.swap.round_to,
        );

        self.gas_gate
            .await_clearance(self.fee_probe.as_ref(), &self.rng)
            .await?;

        let op_name = format!("{} {}", action.product.name(), action.route());
        let ok = retry_flag(self.retry, &op_name, &self.rng, || {
            ops.execute(&action, amount)
        })
        .await;

        MetricsCollector::global().record_step(&op_name, started.elapsed(), ok);

        if ok {
            self.store
                .update(index, &RecordPatch::new().decrement(action.clone()))?;
            self.store.remove_if_exhausted(index)?;
            info!(target: "step_result", "[Warmup] {} SUCCESS", op_name);
        } else {
            warn!(target: "step_result", "[Warmup] {} FAILED", op_name);
        }

        sleep_range(self.cfg.delays.tx_delay_range, &self.rng).await;
        Ok(Tick::Executed(ok))
    }
}

fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}
