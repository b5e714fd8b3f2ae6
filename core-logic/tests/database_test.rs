use anyhow::Result;
use core_logic::{
    pair_seed_inputs, AddressDeriver, BridgeProduct, CountRange, CounterRanges, Randomizer,
    RecordPatch, WalletStore, WarmupAction,
};
use std::collections::BTreeMap;

/// Deterministic stand-in for on-chain key derivation.
struct MockDeriver;

impl AddressDeriver for MockDeriver {
    fn derive(&self, private_key: &str) -> Result<String> {
        let hex = private_key
            .strip_prefix("0x")
            .ok_or_else(|| anyhow::anyhow!("invalid private key format"))?;
        if hex.is_empty() {
            anyhow::bail!("empty private key");
        }
        Ok(format!("0xaddr{}", hex))
    }
}

fn ranges() -> CounterRanges {
    let mut merkly = BTreeMap::new();
    merkly.insert(
        "Polygon".to_string(),
        BTreeMap::from([("Gnosis".to_string(), CountRange(0, 0))]),
    );
    CounterRanges {
        merkly,
        stargate: CountRange(0, 0),
        core_bridge: CountRange(1, 1),
        angle: CountRange(2, 2),
    }
}

fn seeded_store(path: &str) -> WalletStore {
    let seeds = pair_seed_inputs(
        vec!["0xk1".into(), "0xk2".into()],
        vec!["1.1.1.1:8080".into(), "2.2.2.2:8080".into()],
        vec!["0xdep1".into(), "0xdep2".into()],
        false,
    );
    WalletStore::create(path, seeds, &ranges(), &MockDeriver, &Randomizer::from_seed(9))
}

#[test]
fn test_creation_pairs_and_randomizes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let store = seeded_store(path.to_str().unwrap());

    assert_eq!(store.len(), 2);
    for record in store.records() {
        assert_eq!(record.core_bridge_tx_count, 1);
        assert_eq!(record.stargate_tx_count, 0);
        assert_eq!(record.angle_tx_count, 2);
        assert_eq!(record.warmup_tx_count(), 1);
        assert!(record.proxy.is_some());
        assert!(record.deposit_address.is_some());
    }
    assert_eq!(store.record(0).unwrap().address, "0xaddrk1");
}

#[test]
fn test_malformed_key_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let seeds = pair_seed_inputs(
        vec!["0xk1".into(), "garbage".into(), "0xk3".into()],
        vec![],
        vec![],
        false,
    );
    let store = WalletStore::create(
        path.to_str().unwrap(),
        seeds,
        &ranges(),
        &MockDeriver,
        &Randomizer::from_seed(9),
    );

    assert_eq!(store.len(), 2);
    assert_eq!(store.record(1).unwrap().address, "0xaddrk3");
}

#[test]
fn test_load_missing_file_is_fatal() {
    assert!(WalletStore::load("nope/missing.json", &MockDeriver).is_err());
}

#[test]
fn test_load_unparsable_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    std::fs::write(&path, "not json at all").unwrap();
    assert!(WalletStore::load(path.to_str().unwrap(), &MockDeriver).is_err());
}

#[test]
fn test_address_rederived_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let store = seeded_store(path.to_str().unwrap());
    store.save().unwrap();

    // Tamper with the persisted address; the derived one must win on load.
    let content = std::fs::read_to_string(&path).unwrap();
    let tampered = content.replace("0xaddrk1", "0xevil");
    std::fs::write(&path, tampered).unwrap();

    let reloaded = WalletStore::load(path.to_str().unwrap(), &MockDeriver).unwrap();
    assert_eq!(reloaded.record(0).unwrap().address, "0xaddrk1");
}

#[test]
fn test_update_persists_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let mut store = seeded_store(path.to_str().unwrap());
    store.save().unwrap();

    store
        .update(0, &RecordPatch::new().warmup_started(true).okx_withdrawn(true))
        .unwrap();

    let reloaded = WalletStore::load(path.to_str().unwrap(), &MockDeriver).unwrap();
    assert!(reloaded.record(0).unwrap().warmup_started);
    assert!(reloaded.record(0).unwrap().okx_withdrawn);
    assert!(!reloaded.record(1).unwrap().warmup_started);
}

#[test]
fn test_update_out_of_range_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let mut store = seeded_store(path.to_str().unwrap());
    store.save().unwrap();

    store
        .update(5, &RecordPatch::new().warmup_started(true))
        .unwrap();

    let reloaded = WalletStore::load(path.to_str().unwrap(), &MockDeriver).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.records().iter().all(|r| !r.warmup_started));
}

#[test]
fn test_counter_decrement_and_exhaustion_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let mut store = seeded_store(path.to_str().unwrap());
    store.save().unwrap();

    let action = WarmupAction {
        product: BridgeProduct::CoreBridge,
        src: "BSC".into(),
        dst: "Core".into(),
    };

    // Not exhausted yet: counter is 1.
    assert!(!store.remove_if_exhausted(0).unwrap());

    // One successful action per record drives both counters to zero.
    for index in 0..2 {
        store
            .update(index, &RecordPatch::new().decrement(action.clone()))
            .unwrap();
        assert_eq!(store.record(index).unwrap().warmup_tx_count(), 0);
    }

    assert!(store.remove_if_exhausted(0).unwrap());
    assert!(store.remove_if_exhausted(0).unwrap());
    assert!(store.is_empty());

    let reloaded = WalletStore::load(path.to_str().unwrap(), &MockDeriver).unwrap();
    assert!(reloaded.is_empty());
}

#[test]
fn test_reset_cycle_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let mut store = seeded_store(path.to_str().unwrap());
    store.save().unwrap();

    store
        .update(
            0,
            &RecordPatch::new()
                .warmup_started(true)
                .okx_withdrawn(true)
                .chain_with_funds(Some("Celo".into())),
        )
        .unwrap();
    store.reset_cycle(0).unwrap();

    let reloaded = WalletStore::load(path.to_str().unwrap(), &MockDeriver).unwrap();
    let record = reloaded.record(0).unwrap();
    assert!(!record.warmup_started);
    assert!(record.warmup_finished);
    assert!(!record.okx_withdrawn);
    assert!(record.chain_with_funds.is_none());
}

#[test]
fn test_query_and_random_pick() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let mut store = seeded_store(path.to_str().unwrap());
    store.save().unwrap();

    store
        .update(1, &RecordPatch::new().warmup_started(true))
        .unwrap();

    assert_eq!(store.query_where(|r| r.warmup_started), vec![1]);

    let rng = Randomizer::from_seed(4);
    assert_eq!(store.pick_random_where(|r| r.warmup_started, &rng), Some(1));
    assert_eq!(store.pick_random_where(|r| r.sent_to_okx, &rng), None);
    assert!(store.pick_random(&rng).is_some());
}

#[test]
fn test_index_of_structural_equality() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let store = seeded_store(path.to_str().unwrap());

    let copy = store.record(1).unwrap().clone();
    assert_eq!(store.index_of(&copy), Some(1));

    let mut missing = copy;
    missing.address = "0xother".into();
    assert_eq!(store.index_of(&missing), None);
}
