//! Warmup action selection.
//!
//! Given a wallet's remaining counters, picks one eligible
//! (bridge product, route) pair uniformly at random, or signals that the
//! wallet has nothing left to do. Selection is side-effect free: the chosen
//! counter is decremented separately, and only after the external action
//! reports success.

use serde::{Deserialize, Serialize};

use crate::record::WalletRecord;
use crate::utils::rng::Randomizer;

/// Fixed routes of the two scalar bridge products.
pub const STARGATE_ROUTE: (&str, &str) = ("Polygon", "Kava");
pub const CORE_BRIDGE_ROUTE: (&str, &str) = ("BSC", "Core");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeProduct {
    Merkly,
    Stargate,
    CoreBridge,
}

impl BridgeProduct {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeProduct::Merkly => "Merkly",
            BridgeProduct::Stargate => "Stargate",
            BridgeProduct::CoreBridge => "CoreBridge",
        }
    }
}

/// One executable warmup step: bridge `src` -> `dst` through `product`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupAction {
    pub product: BridgeProduct,
    pub src: String,
    pub dst: String,
}

impl WarmupAction {
    pub fn route(&self) -> String {
        format!("{}-{}", self.src, self.dst)
    }
}

pub struct ActionSelector;

impl ActionSelector {
    /// Every action whose counter is still above zero, in store order.
    pub fn eligible(record: &WalletRecord) -> Vec<WarmupAction> {
        let mut actions = Vec::new();

        for (src, dsts) in &record.merkly_tx_count {
            for (dst, count) in dsts {
                if *count > 0 {
                    actions.push(WarmupAction {
                        product: BridgeProduct::Merkly,
                        src: src.clone(),
                        dst: dst.clone(),
                    });
                }
            }
        }

        if record.stargate_tx_count > 0 {
            actions.push(WarmupAction {
                product: BridgeProduct::Stargate,
                src: STARGATE_ROUTE.0.to_string(),
                dst: STARGATE_ROUTE.1.to_string(),
            });
        }

        if record.core_bridge_tx_count > 0 {
            actions.push(WarmupAction {
                product: BridgeProduct::CoreBridge,
                src: CORE_BRIDGE_ROUTE.0.to_string(),
                dst: CORE_BRIDGE_ROUTE.1.to_string(),
            });
        }

        actions
    }

    /// Uniform random choice among eligible actions; `None` means the wallet
    /// is exhausted. Inspecting the result commits nothing.
    pub fn pick(record: &WalletRecord, rng: &Randomizer) -> Option<WarmupAction> {
        let actions = Self::eligible(record);
        rng.pick(&actions).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record_with(merkly: u32, stargate: u32, core: u32) -> WalletRecord {
        let mut map = BTreeMap::new();
        map.insert(
            "Polygon".to_string(),
            BTreeMap::from([("Gnosis".to_string(), merkly)]),
        );
        WalletRecord {
            private_key: "0x01".into(),
            address: "0x00".into(),
            proxy: None,
            deposit_address: None,
            merkly_tx_count: map,
            stargate_tx_count: stargate,
            core_bridge_tx_count: core,
            angle_tx_count: 0,
            chain_with_funds: None,
            warmup_started: false,
            warmup_finished: false,
            okx_withdrawn: false,
            polygon_from_usdc_swapped: false,
            from_polygon_ageur_bridged: false,
            to_polygon_ageur_bridged: false,
            polygon_to_usdc_swapped: false,
            sent_to_okx: false,
        }
    }

    #[test]
    fn test_zero_counters_are_ineligible() {
        let actions = ActionSelector::eligible(&record_with(0, 0, 1));
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].product, BridgeProduct::CoreBridge);
        assert_eq!(actions[0].route(), "BSC-Core");
    }

    #[test]
    fn test_exhausted_record_yields_none() {
        let rng = Randomizer::from_seed(3);
        assert!(ActionSelector::pick(&record_with(0, 0, 0), &rng).is_none());
    }

    #[test]
    fn test_pick_does_not_mutate_counters() {
        let record = record_with(2, 1, 1);
        let rng = Randomizer::from_seed(3);
        let before = record.clone();
        let _ = ActionSelector::pick(&record, &rng);
        assert_eq!(record, before);
    }

    #[test]
    fn test_pick_covers_all_eligible_actions() {
        let record = record_with(1, 1, 1);
        let rng = Randomizer::from_seed(11);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            let action = ActionSelector::pick(&record, &rng).unwrap();
            seen.insert(action.product.name());
        }
        assert_eq!(seen.len(), 3);
    }
}
