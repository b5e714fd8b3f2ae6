use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::selector::{BridgeProduct, WarmupAction};

/// One managed wallet: identity, egress, payout target, remaining action
/// budgets and the checkpoint flags of the volume cycle.
///
/// The persisted store is the source of truth for these records; an in-memory
/// copy is stale as soon as any update lands and must be re-read.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub private_key: String,
    /// Re-derived from the private key on every load, never trusted from disk.
    pub address: String,
    pub proxy: Option<String>,
    pub deposit_address: Option<String>,

    /// Source chain -> destination chain -> remaining refuel transactions.
    pub merkly_tx_count: BTreeMap<String, BTreeMap<String, u32>>,
    pub stargate_tx_count: u32,
    pub core_bridge_tx_count: u32,
    /// Remaining inner Celo<->Gnosis bridge hops for the volume cycle.
    pub angle_tx_count: u32,

    /// Which chain currently holds the bridged funds, if any.
    #[serde(default)]
    pub chain_with_funds: Option<String>,

    // Volume-cycle checkpoints. Strict prefix order: a flag is only ever set
    // while all earlier flags are already true, except through reset_cycle.
    #[serde(default)]
    pub warmup_started: bool,
    #[serde(default)]
    pub warmup_finished: bool,
    #[serde(default)]
    pub okx_withdrawn: bool,
    #[serde(default)]
    pub polygon_from_usdc_swapped: bool,
    #[serde(default)]
    pub from_polygon_ageur_bridged: bool,
    #[serde(default)]
    pub to_polygon_ageur_bridged: bool,
    #[serde(default)]
    pub polygon_to_usdc_swapped: bool,
    #[serde(default)]
    pub sent_to_okx: bool,
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .field("private_key", &"***REDACTED***")
            .field("proxy", &self.proxy)
            .field("deposit_address", &self.deposit_address)
            .field("stargate_tx_count", &self.stargate_tx_count)
            .field("core_bridge_tx_count", &self.core_bridge_tx_count)
            .field("angle_tx_count", &self.angle_tx_count)
            .field("chain_with_funds", &self.chain_with_funds)
            .field("warmup_started", &self.warmup_started)
            .field("warmup_finished", &self.warmup_finished)
            .finish()
    }
}

impl WalletRecord {
    /// Terminal counter for warmup: the sum of every remaining bridge-product
    /// transaction. A record is exhausted (and removable) when this is zero.
    pub fn warmup_tx_count(&self) -> u32 {
        let merkly: u32 = self
            .merkly_tx_count
            .values()
            .flat_map(|dsts| dsts.values())
            .sum();
        merkly + self.stargate_tx_count + self.core_bridge_tx_count
    }

    /// Applies a typed partial update in place. Counter decrements saturate
    /// at zero so budgets never go negative.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(v) = patch.warmup_started {
            self.warmup_started = v;
        }
        if let Some(v) = patch.warmup_finished {
            self.warmup_finished = v;
        }
        if let Some(v) = patch.okx_withdrawn {
            self.okx_withdrawn = v;
        }
        if let Some(v) = patch.polygon_from_usdc_swapped {
            self.polygon_from_usdc_swapped = v;
        }
        if let Some(v) = patch.from_polygon_ageur_bridged {
            self.from_polygon_ageur_bridged = v;
        }
        if let Some(v) = patch.to_polygon_ageur_bridged {
            self.to_polygon_ageur_bridged = v;
        }
        if let Some(v) = patch.polygon_to_usdc_swapped {
            self.polygon_to_usdc_swapped = v;
        }
        if let Some(v) = patch.sent_to_okx {
            self.sent_to_okx = v;
        }
        if let Some(ref v) = patch.chain_with_funds {
            self.chain_with_funds = v.clone();
        }
        if let Some(v) = patch.angle_tx_count {
            self.angle_tx_count = v;
        }
        if let Some(ref action) = patch.decrement {
            self.decrement_action(action);
        }
    }

    fn decrement_action(&mut self, action: &WarmupAction) {
        match action.product {
            BridgeProduct::Merkly => {
                if let Some(count) = self
                    .merkly_tx_count
                    .get_mut(&action.src)
                    .and_then(|dsts| dsts.get_mut(&action.dst))
                {
                    *count = count.saturating_sub(1);
                }
            }
            BridgeProduct::Stargate => {
                self.stargate_tx_count = self.stargate_tx_count.saturating_sub(1);
            }
            BridgeProduct::CoreBridge => {
                self.core_bridge_tx_count = self.core_bridge_tx_count.saturating_sub(1);
            }
        }
    }

    /// Restores the record to the fresh-cycle state: funds pointer cleared,
    /// step flags down, warmup marked finished so the wallet is not re-picked.
    pub fn reset_cycle(&mut self) {
        self.chain_with_funds = None;
        self.warmup_started = false;
        self.warmup_finished = true;
        self.okx_withdrawn = false;
        self.polygon_from_usdc_swapped = false;
        self.from_polygon_ageur_bridged = false;
        self.to_polygon_ageur_bridged = false;
        self.polygon_to_usdc_swapped = false;
        self.sent_to_okx = false;
    }
}

/// Typed partial update for a [`WalletRecord`].
///
/// Replaces by-name attribute patching with a closed set of optional fields;
/// unset members leave the record untouched. Built with the chained setters
/// and applied through [`WalletRecord::apply`].
#[derive(Debug, Default, Clone)]
pub struct RecordPatch {
    pub warmup_started: Option<bool>,
    pub warmup_finished: Option<bool>,
    pub okx_withdrawn: Option<bool>,
    pub polygon_from_usdc_swapped: Option<bool>,
    pub from_polygon_ageur_bridged: Option<bool>,
    pub to_polygon_ageur_bridged: Option<bool>,
    pub polygon_to_usdc_swapped: Option<bool>,
    pub sent_to_okx: Option<bool>,
    /// `Some(None)` clears the pointer, `Some(Some(chain))` moves it.
    pub chain_with_funds: Option<Option<String>>,
    pub angle_tx_count: Option<u32>,
    /// Decrements the counter of one warmup action by exactly one.
    pub decrement: Option<WarmupAction>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warmup_started(mut self, v: bool) -> Self {
        self.warmup_started = Some(v);
        self
    }

    pub fn okx_withdrawn(mut self, v: bool) -> Self {
        self.okx_withdrawn = Some(v);
        self
    }

    pub fn polygon_from_usdc_swapped(mut self, v: bool) -> Self {
        self.polygon_from_usdc_swapped = Some(v);
        self
    }

    pub fn from_polygon_ageur_bridged(mut self, v: bool) -> Self {
        self.from_polygon_ageur_bridged = Some(v);
        self
    }

    pub fn to_polygon_ageur_bridged(mut self, v: bool) -> Self {
        self.to_polygon_ageur_bridged = Some(v);
        self
    }

    pub fn polygon_to_usdc_swapped(mut self, v: bool) -> Self {
        self.polygon_to_usdc_swapped = Some(v);
        self
    }

    pub fn sent_to_okx(mut self, v: bool) -> Self {
        self.sent_to_okx = Some(v);
        self
    }

    pub fn chain_with_funds(mut self, chain: Option<String>) -> Self {
        self.chain_with_funds = Some(chain);
        self
    }

    pub fn angle_tx_count(mut self, v: u32) -> Self {
        self.angle_tx_count = Some(v);
        self
    }

    pub fn decrement(mut self, action: WarmupAction) -> Self {
        self.decrement = Some(action);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> WalletRecord {
        let mut merkly = BTreeMap::new();
        merkly.insert(
            "Polygon".to_string(),
            BTreeMap::from([("Gnosis".to_string(), 2u32), ("Celo".to_string(), 0u32)]),
        );
        WalletRecord {
            private_key: "0xab".into(),
            address: "0x00".into(),
            proxy: None,
            deposit_address: None,
            merkly_tx_count: merkly,
            stargate_tx_count: 1,
            core_bridge_tx_count: 0,
            angle_tx_count: 3,
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
    fn test_warmup_tx_count_sums_all_products() {
        assert_eq!(record().warmup_tx_count(), 3);
    }

    #[test]
    fn test_decrement_saturates_at_zero() {
        let mut rec = record();
        let action = WarmupAction {
            product: BridgeProduct::CoreBridge,
            src: "BSC".into(),
            dst: "Core".into(),
        };
        rec.apply(&RecordPatch::new().decrement(action));
        assert_eq!(rec.core_bridge_tx_count, 0);
    }

    #[test]
    fn test_patch_only_touches_set_fields() {
        let mut rec = record();
        rec.apply(&RecordPatch::new().okx_withdrawn(true));
        assert!(rec.okx_withdrawn);
        assert!(!rec.warmup_started);
        assert_eq!(rec.angle_tx_count, 3);
    }

    #[test]
    fn test_reset_cycle_marks_finished() {
        let mut rec = record();
        rec.warmup_started = true;
        rec.okx_withdrawn = true;
        rec.sent_to_okx = true;
        rec.chain_with_funds = Some("Celo".into());
        rec.reset_cycle();
        assert!(!rec.warmup_started);
        assert!(rec.warmup_finished);
        assert!(!rec.okx_withdrawn);
        assert!(!rec.sent_to_okx);
        assert!(rec.chain_with_funds.is_none());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let rendered = format!("{:?}", record());
        assert!(!rendered.contains("0xab"));
        assert!(rendered.contains("REDACTED"));
    }
}
