use anyhow::Result;
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Input};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info};

use core_logic::{
    pair_seed_inputs, read_lines, setup_logger, FeeProbe, MetricsCollector, ModeRunner,
    Randomizer, RequestBudget, WalletStore,
};

use mainnet_project::chain::{ChainRegistry, ETHEREUM};
use mainnet_project::client::{EthersDeriver, FeeOracle};
use mainnet_project::config::AppConfig;
use mainnet_project::modes::{MainnetOpsFactory, OpsFactory, VolumeMode, WarmupMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/mainnet/config.toml")]
    config: String,
    #[arg(short, long)]
    export_metrics: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = setup_logger();
    // Keep guard alive for file logging
    std::mem::forget(_log_guard);
    dotenv().ok();

    let args = Args::parse();
    info!("Loading config from: {}", args.config);

    let cfg = match AppConfig::load(&args.config) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Failed to load config: {e:#}");
            return Ok(());
        }
    };

    let registry = Arc::new(ChainRegistry::from_config(&cfg.chains)?);
    let rng = Randomizer::from_entropy();

    println!();
    println!("1. Create wallet database");
    println!("2. Warmup (Merkly / Stargate / CoreBridge)");
    println!("3. Volume cycle (OKX -> 1inch -> Angle)");
    println!();

    let module: String = match Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Start module")
        .interact_text()
    {
        Ok(module) => module,
        Err(_) => {
            error!("Finishing script");
            return Ok(());
        }
    };

    match module.trim() {
        "1" => create_database(&cfg, &rng)?,
        "2" | "3" => {
            let store = WalletStore::load(&cfg.store.database_path, &EthersDeriver)?;
            let budget = Arc::new(RequestBudget::new(cfg.http.requests_per_second));
            let fee_probe: Arc<dyn FeeProbe> =
                Arc::new(FeeOracle::new(registry.require_rpc(ETHEREUM)?)?);
            let ops: Arc<dyn OpsFactory> = Arc::new(MainnetOpsFactory::new(
                cfg.clone(),
                registry.clone(),
                budget,
                rng.clone(),
            ));

            if module.trim() == "2" {
                let mode = WarmupMode::new(store, cfg.clone(), ops, fee_probe, rng.clone());
                ModeRunner::run("Warmup", |token| mode.run(token)).await?;
            } else {
                let mode = VolumeMode::new(store, cfg.clone(), ops, fee_probe, rng.clone());
                ModeRunner::run("Volume", |token| mode.run(token)).await?;
            }
        }
        other => {
            error!("Invalid module number: {}", other);
            return Ok(());
        }
    }

    if let Some(metrics_path) = args.export_metrics {
        match MetricsCollector::global().export_to_file(&metrics_path).await {
            Ok(_) => info!("Metrics exported to {}", metrics_path),
            Err(e) => error!("Failed to export metrics: {}", e),
        }
    }

    Ok(())
}

/// Module 1: pairs the seed files into a fresh wallet store and persists it.
fn create_database(cfg: &AppConfig, rng: &Randomizer) -> Result<()> {
    let private_keys = read_lines(&cfg.store.private_keys_path)?;

    let proxies = read_lines(&cfg.store.proxies_path).unwrap_or_else(|e| {
        info!("No proxies loaded ({e:#}); wallets run without proxies");
        Vec::new()
    });
    let deposit_addresses = read_lines(&cfg.store.deposit_addresses_path).unwrap_or_else(|e| {
        info!("No deposit addresses loaded ({e:#})");
        Vec::new()
    });

    let seeds = pair_seed_inputs(
        private_keys,
        proxies,
        deposit_addresses,
        cfg.store.use_mobile_proxy,
    );

    let store = WalletStore::create(
        &cfg.store.database_path,
        seeds,
        &cfg.counter_ranges(),
        &EthersDeriver,
        rng,
    );
    store.save()?;

    info!(
        target: "step_result",
        "Database created: SUCCESS ({} wallets at {})",
        store.len(),
        cfg.store.database_path
    );
    Ok(())
}
