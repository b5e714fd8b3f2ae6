use anyhow::Result;
use config::{Config, File};
use core_logic::{AmountRange, CountRange, CounterRanges, DelayRange};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Immutable application configuration, loaded once at startup and passed by
/// reference into every component. Secrets (exchange and aggregator API keys)
/// come from the environment, not from this file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreSettings,
    pub gas: GasSettings,
    pub delays: DelaySettings,
    pub retry: RetrySettings,
    pub http: HttpSettings,
    pub swap: SwapSettings,
    pub okx: OkxSettings,
    pub confirmations: ConfirmationSettings,
    pub counters: CounterSettings,
    pub chains: BTreeMap<String, ChainSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub database_path: String,
    pub private_keys_path: String,
    pub proxies_path: String,
    pub deposit_addresses_path: String,
    #[serde(default)]
    pub use_mobile_proxy: bool,
    #[serde(default)]
    pub proxy_change_ip_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GasSettings {
    /// Ceiling for the mainnet base fee; gated steps wait above it.
    pub threshold_gwei: f64,
    pub delay_range: DelayRange,
    /// Optional poll ceiling; absent means wait indefinitely.
    #[serde(default)]
    pub max_polls: Option<u32>,
    pub gnosis_max_gwei: f64,
    pub gnosis_delay_range: DelayRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelaySettings {
    pub tx_delay_range: DelayRange,
    pub after_approve_delay_range: DelayRange,
    pub wallet_delay_range: DelayRange,
    pub request_sleep_range: DelayRange,
    pub block_check_range: DelayRange,
    pub bridged_funds_range: DelayRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    pub tries: u32,
    pub delay_range: DelayRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapSettings {
    /// Maximum slippage in percent (1 = 1%).
    pub max_slippage: f64,
    /// Share of the source-chain native balance a warmup bridge spends.
    pub token_use_percentage: f64,
    /// Dust fraction left behind when a step spends a full token balance.
    pub max_left_token_percentage: f64,
    /// Swap into the bridgeable token even when a balance already exists.
    /// A zero balance forces the swap regardless.
    pub use_swap_before_bridge: bool,
    pub round_to: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OkxSettings {
    /// USDC range withdrawn to a wallet at the start of a volume cycle.
    pub withdrawal_amount_range: AmountRange,
    /// Per-chain native top-up rules for warmup mode.
    #[serde(default)]
    pub withdraw: BTreeMap<String, OkxChainWithdraw>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OkxChainWithdraw {
    pub enabled: bool,
    pub amount: AmountRange,
    pub min_balance: f64,
    pub fee: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationSettings {
    pub polygon_blocks: u64,
    pub extra_blocks: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CounterSettings {
    pub stargate: CountRange,
    pub core_bridge: CountRange,
    pub angle: CountRange,
    pub merkly: BTreeMap<String, BTreeMap<String, CountRange>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainSettings {
    pub chain_id: u64,
    pub lz_chain_id: u16,
    #[serde(default)]
    pub rpc_url: String,
    #[serde(default)]
    pub explorer: String,
    pub coin_symbol: String,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        settings.try_deserialize().map_err(|e| anyhow::anyhow!(e))
    }

    pub fn counter_ranges(&self) -> CounterRanges {
        CounterRanges {
            merkly: self.counters.merkly.clone(),
            stargate: self.counters.stargate,
            core_bridge: self.counters.core_bridge,
            angle: self.counters.angle,
        }
    }

    pub fn retry_policy(&self) -> core_logic::RetryPolicy {
        core_logic::RetryPolicy::new(self.retry.tries).with_delay_range(self.retry.delay_range)
    }
}
