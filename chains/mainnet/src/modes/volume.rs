//! Volume cycle orchestration.
//!
//! Drives one wallet at a time through the full checkpointed sequence:
//! exchange withdrawal, USDC -> agEUR swap, bridge out to Celo or Gnosis,
//! the inner Celo<->Gnosis hop loop, bridge back, swap back, payout to the
//! deposit address and a confirmation wait. Every step persists its flag
//! through the store before the next one starts, so a crash or interrupt
//! resumes at exactly the failed step on the next pass.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use core_logic::utils::delay::sleep_range;
use core_logic::{
    retry_flag, FeeProbe, GasGate, MetricsCollector, ModeStats, Randomizer, RecordPatch,
    RetryPolicy, WalletStore,
};

use crate::chain::{CELO, GNOSIS, POLYGON};
use crate::config::AppConfig;
use crate::modes::OpsFactory;

pub struct VolumeMode {
    store: WalletStore,
    cfg: Arc<AppConfig>,
    ops: Arc<dyn OpsFactory>,
    gas_gate: GasGate,
    fee_probe: Arc<dyn FeeProbe>,
    retry: RetryPolicy,
    rng: Randomizer,
}

impl VolumeMode {
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
                info!("[Volume] Cancelled, stopping after the last persisted step");
                break;
            }

            // Resume wallets with an interrupted cycle before starting new ones.
            let unfinished = self.store.query_where(|r| r.warmup_started);
            if !unfinished.is_empty() {
                let addresses: Vec<String> = unfinished
                    .iter()
                    .filter_map(|&i| self.store.record(i).map(|r| r.address.clone()))
                    .collect();
                warn!("[Volume] Unfinished wallets found: {:?}", addresses);
            }

            for index in unfinished {
                if token.is_cancelled() {
                    break;
                }
                self.run_cycle_counted(index, &mut stats).await;
                sleep_range(self.cfg.delays.wallet_delay_range, &self.rng).await;
            }
            if token.is_cancelled() {
                continue;
            }

            let fresh = self
                .store
                .pick_random_where(|r| !r.warmup_started && !r.warmup_finished, &self.rng);
            let Some(index) = fresh else {
                break;
            };

            self.run_cycle_counted(index, &mut stats).await;
            sleep_range(self.cfg.delays.wallet_delay_range, &self.rng).await;
        }

        info!("[Volume] No more items left");
        Ok(stats)
    }

    async fn run_cycle_counted(&mut self, index: usize, stats: &mut ModeStats) {
        let started = std::time::Instant::now();
        match self.perform_cycle(index).await {
            Ok(true) => {
                stats.success += 1;
                MetricsCollector::global().record_step("volume_cycle", started.elapsed(), true);
            }
            Ok(false) => {
                stats.failed += 1;
                MetricsCollector::global().record_step("volume_cycle", started.elapsed(), false);
            }
            Err(e) => {
                error!("[Volume] Error occurred: {e:#}");
                stats.failed += 1;
                MetricsCollector::global().record_step("volume_cycle", started.elapsed(), false);
            }
        }
    }

    /// One wallet's full cycle. Returns `false` as soon as any step fails,
    /// leaving the wallet resumable at that step.
    async fn perform_cycle(&mut self, index: usize) -> Result<bool> {
        let Some(record) = self.store.record(index).cloned() else {
            return Ok(false);
        };
        debug!("[Volume] Wallet: {}", record.address);

        let ops = self.ops.cycle_ops(&record)?;

        // Step 1 - exchange withdrawal to the wallet.
        if !record.okx_withdrawn {
            let amount = self.cfg.okx.withdrawal_amount_range.sample(&self.rng, 3);
            let ok = retry_flag(self.retry, "okx withdraw", &self.rng, || {
                ops.consolidate_and_withdraw(amount)
            })
            .await;
            if !ok {
                return Ok(false);
            }
            self.store.update(
                index,
                &RecordPatch::new().warmup_started(true).okx_withdrawn(true),
            )?;
            sleep_range(self.cfg.delays.tx_delay_range, &self.rng).await;
        }

        // Step 2 - swap USDC -> agEUR on Polygon.
        if !self.flag(index, |r| r.polygon_from_usdc_swapped) {
            self.gas_gate
                .await_clearance(self.fee_probe.as_ref(), &self.rng)
                .await?;
            let ok = retry_flag(self.retry, "1inch swap USDC->agEUR", &self.rng, || {
                ops.swap_usdc_to_ageur()
            })
            .await;
            if !ok {
                return Ok(false);
            }
            self.store
                .update(index, &RecordPatch::new().polygon_from_usdc_swapped(true))?;
            sleep_range(self.cfg.delays.tx_delay_range, &self.rng).await;
        }

        // Step 3 - bridge out to a random destination.
        if !self.flag(index, |r| r.from_polygon_ageur_bridged) {
            let dst = *self.rng.pick(&[CELO, GNOSIS]).expect("non-empty choice");
            self.gas_gate
                .await_clearance(self.fee_probe.as_ref(), &self.rng)
                .await?;
            let ok = retry_flag(self.retry, "angle bridge out", &self.rng, || {
                ops.bridge_ageur(POLYGON, dst)
            })
            .await;
            if !ok {
                return Ok(false);
            }
            self.store.update(
                index,
                &RecordPatch::new()
                    .from_polygon_ageur_bridged(true)
                    .chain_with_funds(Some(dst.to_string())),
            )?;
            sleep_range(self.cfg.delays.tx_delay_range, &self.rng).await;
        }

        // Step 4 - inner hop loop between Celo and Gnosis.
        loop {
            let Some(current) = self.store.record(index).cloned() else {
                return Ok(false);
            };
            if current.angle_tx_count == 0 {
                break;
            }

            let (src, dst) = match current.chain_with_funds.as_deref() {
                Some(CELO) => (CELO, GNOSIS),
                Some(GNOSIS) => (GNOSIS, CELO),
                other => {
                    error!("[Volume] Funds pointer is {:?}, cannot hop", other);
                    return Ok(false);
                }
            };

            self.gas_gate
                .await_clearance(self.fee_probe.as_ref(), &self.rng)
                .await?;
            // The hop result is deliberately not checked: the budget is
            // decremented and the funds pointer flipped either way
            // (optimistic accounting). A failed hop still consumes budget;
            // recovery is left to the capability-level retries.
            let _ = retry_flag(self.retry, "angle hop", &self.rng, || {
                ops.bridge_ageur(src, dst)
            })
            .await;

            self.store.update(
                index,
                &RecordPatch::new()
                    .angle_tx_count(current.angle_tx_count - 1)
                    .chain_with_funds(Some(dst.to_string())),
            )?;
            sleep_range(self.cfg.delays.tx_delay_range, &self.rng).await;
        }

        // Step 5 - bridge back to Polygon from wherever the funds sit.
        if !self.flag(index, |r| r.to_polygon_ageur_bridged) {
            let Some(src) = self
                .store
                .record(index)
                .and_then(|r| r.chain_with_funds.clone())
            else {
                error!("[Volume] No funds pointer recorded, cannot bridge back");
                return Ok(false);
            };
            self.gas_gate
                .await_clearance(self.fee_probe.as_ref(), &self.rng)
                .await?;
            let ok = retry_flag(self.retry, "angle bridge back", &self.rng, || {
                ops.bridge_ageur(&src, POLYGON)
            })
            .await;
            if !ok {
                return Ok(false);
            }
            self.store
                .update(index, &RecordPatch::new().to_polygon_ageur_bridged(true))?;
            sleep_range(self.cfg.delays.tx_delay_range, &self.rng).await;
        }

        // Step 6 - swap agEUR back to USDC.
        if !self.flag(index, |r| r.polygon_to_usdc_swapped) {
            self.gas_gate
                .await_clearance(self.fee_probe.as_ref(), &self.rng)
                .await?;
            let ok = retry_flag(self.retry, "1inch swap agEUR->USDC", &self.rng, || {
                ops.swap_ageur_to_usdc()
            })
            .await;
            if !ok {
                return Ok(false);
            }
            self.store
                .update(index, &RecordPatch::new().polygon_to_usdc_swapped(true))?;
            sleep_range(self.cfg.delays.tx_delay_range, &self.rng).await;
        }

        // Step 7 - payout to the deposit address, then confirmation wait.
        if !self.flag(index, |r| r.sent_to_okx) {
            let Some(deposit) = record.deposit_address.clone() else {
                error!(
                    "[Volume] Wallet {} has no deposit address, cannot pay out",
                    record.address
                );
                return Ok(false);
            };
            let ok = retry_flag(self.retry, "send to deposit", &self.rng, || {
                ops.send_usdc_to_deposit(&deposit)
            })
            .await;
            if !ok {
                return Ok(false);
            }
            self.store
                .update(index, &RecordPatch::new().sent_to_okx(true))?;

            if let Err(e) = ops.await_deposit_confirmations().await {
                warn!("[Volume] Confirmation wait failed: {e:#}");
            }
        }

        // Step 8 - fresh cycle.
        self.store.reset_cycle(index)?;
        info!(
            target: "step_result",
            "[Volume] Wallet {} cycle SUCCESS", record.address
        );
        Ok(true)
    }

    fn flag(&self, index: usize, get: impl Fn(&core_logic::WalletRecord) -> bool) -> bool {
        self.store.record(index).map(get).unwrap_or(false)
    }
}
