use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use core_logic::{
    pair_seed_inputs, AddressDeriver, AmountRange, CountRange, CounterRanges, DelayRange,
    FeeProbe, Randomizer, WalletStore, WarmupAction,
};
use mainnet_project::config::{
    AppConfig, ConfirmationSettings, CounterSettings, DelaySettings, GasSettings, HttpSettings,
    OkxChainWithdraw, OkxSettings, RetrySettings, StoreSettings, SwapSettings,
};
use mainnet_project::modes::{CycleOps, OpsFactory, WarmupMode, WarmupOps};

struct MockDeriver;

impl AddressDeriver for MockDeriver {
    fn derive(&self, private_key: &str) -> Result<String> {
        Ok(format!("0xaddr{}", private_key.trim_start_matches("0x")))
    }
}

struct ZeroFee;

#[async_trait]
impl FeeProbe for ZeroFee {
    async fn gas_price_wei(&self) -> Result<u128> {
        Ok(0)
    }
}

fn test_config(db_path: &str) -> AppConfig {
    AppConfig {
        store: StoreSettings {
            database_path: db_path.to_string(),
            private_keys_path: String::new(),
            proxies_path: String::new(),
            deposit_addresses_path: String::new(),
            use_mobile_proxy: false,
            proxy_change_ip_url: None,
        },
        gas: GasSettings {
            threshold_gwei: 15.0,
            delay_range: DelayRange(0, 0),
            max_polls: None,
            gnosis_max_gwei: 10.0,
            gnosis_delay_range: DelayRange(0, 0),
        },
        delays: DelaySettings {
            tx_delay_range: DelayRange(0, 0),
            after_approve_delay_range: DelayRange(0, 0),
            wallet_delay_range: DelayRange(0, 0),
            request_sleep_range: DelayRange(0, 0),
            block_check_range: DelayRange(0, 0),
            bridged_funds_range: DelayRange(0, 0),
        },
        retry: RetrySettings {
            tries: 1,
            delay_range: DelayRange(0, 0),
        },
        http: HttpSettings {
            requests_per_second: 100,
        },
        swap: SwapSettings {
            max_slippage: 2.0,
            token_use_percentage: 0.003,
            max_left_token_percentage: 0.0,
            use_swap_before_bridge: true,
            round_to: 5,
        },
        okx: OkxSettings {
            withdrawal_amount_range: AmountRange(5.0, 5.0),
            withdraw: BTreeMap::new(),
        },
        confirmations: ConfirmationSettings {
            polygon_blocks: 1,
            extra_blocks: 0,
        },
        counters: CounterSettings {
            stargate: CountRange(0, 0),
            core_bridge: CountRange(1, 1),
            angle: CountRange(0, 0),
            merkly: BTreeMap::new(),
        },
        chains: BTreeMap::new(),
    }
}

fn seeded_store(path: &str, wallets: usize, core_count: u32) -> WalletStore {
    let keys = (1..=wallets).map(|i| format!("0xk{}", i)).collect();
    let seeds = pair_seed_inputs(keys, vec![], vec![], false);
    let ranges = CounterRanges {
        merkly: BTreeMap::new(),
        stargate: CountRange(0, 0),
        core_bridge: CountRange(core_count, core_count),
        angle: CountRange(0, 0),
    };
    let store = WalletStore::create(path, seeds, &ranges, &MockDeriver, &Randomizer::from_seed(1));
    store.save().unwrap();
    store
}

struct MockWarmupOps {
    log: Arc<Mutex<Vec<String>>>,
    balance_wei: u128,
    exec_results: Arc<Mutex<VecDeque<bool>>>,
}

#[async_trait]
impl WarmupOps for MockWarmupOps {
    async fn native_balance_wei(&self, chain: &str) -> Result<u128> {
        self.log.lock().unwrap().push(format!("balance {}", chain));
        Ok(self.balance_wei)
    }

    async fn exchange_topup(&self, chain: &str, amount: f64) -> Result<bool> {
        self.log
            .lock()
            .unwrap()
            .push(format!("topup {} {}", chain, amount));
        Ok(true)
    }

    async fn execute(&self, action: &WarmupAction, amount: f64) -> Result<bool> {
        self.log.lock().unwrap().push(format!(
            "exec {} {} {}",
            action.product.name(),
            action.route(),
            amount
        ));
        Ok(self.exec_results.lock().unwrap().pop_front().unwrap_or(true))
    }
}

struct MockFactory {
    log: Arc<Mutex<Vec<String>>>,
    balance_wei: u128,
    exec_results: Arc<Mutex<VecDeque<bool>>>,
}

#[async_trait]
impl OpsFactory for MockFactory {
    fn cycle_ops(&self, _record: &core_logic::WalletRecord) -> Result<Box<dyn CycleOps>> {
        Err(anyhow!("cycle ops unused in warmup tests"))
    }

    fn warmup_ops(&self, _record: &core_logic::WalletRecord) -> Result<Box<dyn WarmupOps>> {
        Ok(Box::new(MockWarmupOps {
            log: self.log.clone(),
            balance_wei: self.balance_wei,
            exec_results: self.exec_results.clone(),
        }))
    }

    async fn rotate_ip(&self) -> Result<bool> {
        self.log.lock().unwrap().push("rotate".to_string());
        Ok(true)
    }
}

fn mode_with(
    store: WalletStore,
    cfg: Arc<AppConfig>,
    balance_wei: u128,
    exec_results: Vec<bool>,
) -> (WarmupMode, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let factory = Arc::new(MockFactory {
        log: log.clone(),
        balance_wei,
        exec_results: Arc::new(Mutex::new(exec_results.into())),
    });
    let mode = WarmupMode::new(
        store,
        cfg,
        factory,
        Arc::new(ZeroFee),
        Randomizer::from_seed(5),
    );
    (mode, log)
}

const ONE_COIN: u128 = 1_000_000_000_000_000_000;

#[tokio::test]
async fn test_warmup_drains_all_wallets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let path = path.to_str().unwrap();
    let store = seeded_store(path, 2, 1);
    let cfg = Arc::new(test_config(path));

    let (mode, log) = mode_with(store, cfg, 2 * ONE_COIN, vec![]);
    let stats = mode.run(CancellationToken::new()).await.unwrap();

    assert_eq!(stats.success, 2);
    assert_eq!(stats.failed, 0);

    let execs = log
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with("exec CoreBridge BSC-Core"))
        .count();
    assert_eq!(execs, 2);

    let reloaded = WalletStore::load(path, &MockDeriver).unwrap();
    assert!(reloaded.is_empty());
}

#[tokio::test]
async fn test_failed_action_does_not_decrement() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let path = path.to_str().unwrap();
    let store = seeded_store(path, 1, 1);
    let cfg = Arc::new(test_config(path));

    // First attempt fails, second succeeds: the counter must only move once.
    let (mode, log) = mode_with(store, cfg, 2 * ONE_COIN, vec![false, true]);
    let stats = mode.run(CancellationToken::new()).await.unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.success, 1);

    let execs = log
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with("exec"))
        .count();
    assert_eq!(execs, 2);

    let reloaded = WalletStore::load(path, &MockDeriver).unwrap();
    assert!(reloaded.is_empty());
}

#[tokio::test]
async fn test_spend_amount_follows_balance_percentage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let path = path.to_str().unwrap();
    let store = seeded_store(path, 1, 1);
    let cfg = Arc::new(test_config(path));

    let (mode, log) = mode_with(store, cfg, 2 * ONE_COIN, vec![]);
    mode.run(CancellationToken::new()).await.unwrap();

    // 2.0 coins * 0.003 = 0.006, rounded to 5 places.
    let log = log.lock().unwrap();
    let exec = log.iter().find(|e| e.starts_with("exec")).unwrap();
    assert!(exec.ends_with(" 0.006"), "unexpected exec entry: {exec}");
}

#[tokio::test]
async fn test_low_balance_triggers_exchange_topup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let path = path.to_str().unwrap();
    let store = seeded_store(path, 1, 1);

    let mut cfg = test_config(path);
    cfg.okx.withdraw.insert(
        "BSC".to_string(),
        OkxChainWithdraw {
            enabled: true,
            amount: AmountRange(0.5, 0.5),
            min_balance: 5.0,
            fee: 0.002,
        },
    );
    let cfg = Arc::new(cfg);

    let (mode, log) = mode_with(store, cfg, ONE_COIN, vec![]);
    mode.run(CancellationToken::new()).await.unwrap();

    let log = log.lock().unwrap();
    assert!(log.iter().any(|e| e.starts_with("topup BSC 0.5")));
    // Balance is re-read after the top-up.
    let balance_reads = log.iter().filter(|e| e.starts_with("balance BSC")).count();
    assert_eq!(balance_reads, 2);
}

#[tokio::test]
async fn test_mobile_proxy_rotates_ip_each_tick() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let path = path.to_str().unwrap();
    let store = seeded_store(path, 1, 1);

    let mut cfg = test_config(path);
    cfg.store.use_mobile_proxy = true;
    let cfg = Arc::new(cfg);

    let (mode, log) = mode_with(store, cfg, 2 * ONE_COIN, vec![]);
    mode.run(CancellationToken::new()).await.unwrap();

    assert!(log.lock().unwrap().iter().any(|e| e == "rotate"));
}

#[tokio::test]
async fn test_cancellation_stops_ticks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let path = path.to_str().unwrap();
    let store = seeded_store(path, 1, 1);
    let cfg = Arc::new(test_config(path));

    let (mode, log) = mode_with(store, cfg, 2 * ONE_COIN, vec![]);
    let token = CancellationToken::new();
    token.cancel();
    let stats = mode.run(token).await.unwrap();

    assert_eq!(stats.success + stats.failed, 0);
    assert!(log.lock().unwrap().is_empty());
}
