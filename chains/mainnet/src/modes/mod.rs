pub mod ops;
pub mod volume;
pub mod warmup;

pub use ops::MainnetOpsFactory;
pub use volume::VolumeMode;
pub use warmup::WarmupMode;

use anyhow::Result;
use async_trait::async_trait;
use core_logic::{WalletRecord, WarmupAction};

/// External capabilities one volume cycle consumes, scoped to a single
/// wallet. The orchestrator composes gating, retry and pacing around these;
/// the implementations stay raw so failures surface as plain booleans.
#[async_trait]
pub trait CycleOps: Send + Sync {
    /// Collects exchange sub-account balances and withdraws `amount` USDC to
    /// the wallet on Polygon.
    async fn consolidate_and_withdraw(&self, amount: f64) -> Result<bool>;
    async fn swap_usdc_to_ageur(&self) -> Result<bool>;
    async fn swap_ageur_to_usdc(&self) -> Result<bool>;
    /// Bridges the wallet's agEUR balance between two chains by name.
    async fn bridge_ageur(&self, src: &str, dst: &str) -> Result<bool>;
    async fn send_usdc_to_deposit(&self, recipient: &str) -> Result<bool>;
    /// Blocks until the payout transaction is buried under enough blocks.
    async fn await_deposit_confirmations(&self) -> Result<bool>;
}

/// External capabilities one warmup tick consumes, scoped to a single wallet.
#[async_trait]
pub trait WarmupOps: Send + Sync {
    async fn native_balance_wei(&self, chain: &str) -> Result<u128>;
    /// Tops the wallet up from the exchange with `amount` of the chain's
    /// native coin.
    async fn exchange_topup(&self, chain: &str, amount: f64) -> Result<bool>;
    /// Runs the bridge product behind `action`, spending `amount` native
    /// coin units.
    async fn execute(&self, action: &WarmupAction, amount: f64) -> Result<bool>;
}

/// Builds per-wallet capability bundles. Mocked in tests; the production
/// implementation wires the EVM client, exchange and dapps together.
#[async_trait]
pub trait OpsFactory: Send + Sync {
    fn cycle_ops(&self, record: &WalletRecord) -> Result<Box<dyn CycleOps>>;
    fn warmup_ops(&self, record: &WalletRecord) -> Result<Box<dyn WarmupOps>>;
    /// Rotates the mobile-proxy egress IP, when configured.
    async fn rotate_ip(&self) -> Result<bool>;
}
