//! Durable wallet store.
//!
//! Owns the canonical ordered record collection and its JSON serialization.
//! Every mutation is written through immediately: the persisted file is the
//! sole source of truth and the resume point after a crash. Writes replace
//! the whole file atomically (temp file + rename) so a crash can only replay
//! the state before or after a mutation, never a torn record.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::CounterRanges;
use crate::error::{StoreError, WalletError};
use crate::record::{RecordPatch, WalletRecord};
use crate::traits::AddressDeriver;
use crate::utils::rng::Randomizer;
use crate::utils::seed_loader::SeedTriple;

pub struct WalletStore {
    path: PathBuf,
    records: Vec<WalletRecord>,
}

impl WalletStore {
    /// Builds a fresh store from paired seed inputs, randomizing every
    /// counter from the configured ranges.
    ///
    /// A triple whose key fails derivation is logged and skipped; creation
    /// continues for the rest. The caller persists the result with [`save`].
    pub fn create(
        path: &str,
        seeds: Vec<SeedTriple>,
        ranges: &CounterRanges,
        deriver: &dyn AddressDeriver,
        rng: &Randomizer,
    ) -> Self {
        let mut records = Vec::with_capacity(seeds.len());

        for seed in seeds {
            let address = match deriver.derive(&seed.private_key) {
                Ok(address) => address,
                Err(e) => {
                    error!("[store] Skipping wallet record: {e:#}");
                    continue;
                }
            };

            records.push(WalletRecord {
                private_key: seed.private_key,
                address,
                proxy: seed.proxy,
                deposit_address: seed.deposit_address,
                merkly_tx_count: randomize_route_counters(&ranges.merkly, rng),
                stargate_tx_count: ranges.stargate.sample(rng),
                core_bridge_tx_count: ranges.core_bridge.sample(rng),
                angle_tx_count: ranges.angle.sample(rng),
                chain_with_funds: None,
                warmup_started: false,
                warmup_finished: false,
                okx_withdrawn: false,
                polygon_from_usdc_swapped: false,
                from_polygon_ageur_bridged: false,
                to_polygon_ageur_bridged: false,
                polygon_to_usdc_swapped: false,
                sent_to_okx: false,
            });
        }

        info!("[store] Created {} wallet records", records.len());

        Self {
            path: PathBuf::from(path),
            records,
        }
    }

    /// Loads the persisted store. A missing or unparsable file is an
    /// unrecoverable startup error, not a per-record skip.
    ///
    /// Addresses are re-derived from the private keys; a mismatch against the
    /// persisted value is reported and the derived address wins.
    pub fn load(path: &str, deriver: &dyn AddressDeriver) -> Result<Self> {
        let p = Path::new(path);
        if !p.exists() {
            return Err(StoreError::Missing {
                path: path.to_string(),
            }
            .into());
        }

        let content = fs::read_to_string(p).map_err(|e| StoreError::Io {
            path: path.to_string(),
            msg: e.to_string(),
        })?;

        let mut records: Vec<WalletRecord> =
            serde_json::from_str(&content).map_err(|e| StoreError::Parse { msg: e.to_string() })?;

        for record in &mut records {
            let derived = deriver.derive(&record.private_key)?;
            if derived != record.address {
                // Persisted addresses are never trusted; the derived one wins.
                warn!(
                    "[store] {}",
                    WalletError::AddressMismatch {
                        expected: derived.clone(),
                        actual: record.address.clone(),
                    }
                );
            }
            record.address = derived;
        }

        info!("[store] Loaded {} wallet records from {}", records.len(), path);

        Ok(Self {
            path: PathBuf::from(path),
            records,
        })
    }

    /// Serializes the full collection, replacing the persisted file in one
    /// atomic rename.
    pub fn save(&self) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&self.records)
            .map_err(|e| StoreError::Parse { msg: e.to_string() })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized).map_err(|e| StoreError::Io {
            path: tmp.display().to_string(),
            msg: e.to_string(),
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io {
            path: self.path.display().to_string(),
            msg: e.to_string(),
        })?;

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<&WalletRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[WalletRecord] {
        &self.records
    }

    /// Indices of all records matching the predicate, in store order.
    pub fn query_where(&self, pred: impl Fn(&WalletRecord) -> bool) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| pred(r))
            .map(|(i, _)| i)
            .collect()
    }

    /// Uniform random choice among matching records.
    pub fn pick_random_where(
        &self,
        pred: impl Fn(&WalletRecord) -> bool,
        rng: &Randomizer,
    ) -> Option<usize> {
        let matches = self.query_where(pred);
        rng.pick(&matches).copied()
    }

    /// Uniform random choice over the whole store.
    pub fn pick_random(&self, rng: &Randomizer) -> Option<usize> {
        rng.index(self.records.len())
    }

    /// Identity lookup by structural equality.
    pub fn index_of(&self, record: &WalletRecord) -> Option<usize> {
        self.records.iter().position(|r| r == record)
    }

    /// Applies a typed patch to one record and persists immediately.
    /// An out-of-range index is reported and leaves the store unmodified.
    pub fn update(&mut self, index: usize, patch: &RecordPatch) -> Result<()> {
        let len = self.records.len();
        match self.records.get_mut(index) {
            Some(record) => {
                record.apply(patch);
                self.save()
            }
            None => {
                error!("[store] {}", StoreError::IndexOutOfRange { index, len });
                Ok(())
            }
        }
    }

    /// Removes the record when its terminal warmup counter reached zero.
    /// Returns whether a removal happened; removals persist immediately.
    pub fn remove_if_exhausted(&mut self, index: usize) -> Result<bool> {
        match self.records.get(index) {
            Some(record) if record.warmup_tx_count() == 0 => {
                let removed = self.records.remove(index);
                info!("[store] Wallet {} exhausted, removed", removed.address);
                self.save()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Restores one record's flags to the fresh-cycle state and persists.
    /// An out-of-range index is reported and leaves the store unmodified.
    pub fn reset_cycle(&mut self, index: usize) -> Result<()> {
        let len = self.records.len();
        match self.records.get_mut(index) {
            Some(record) => {
                record.reset_cycle();
                self.save()
            }
            None => {
                error!("[store] {}", StoreError::IndexOutOfRange { index, len });
                Ok(())
            }
        }
    }
}

fn randomize_route_counters(
    ranges: &BTreeMap<String, BTreeMap<String, crate::config::CountRange>>,
    rng: &Randomizer,
) -> BTreeMap<String, BTreeMap<String, u32>> {
    ranges
        .iter()
        .map(|(src, dsts)| {
            let counts = dsts
                .iter()
                .map(|(dst, range)| (dst.clone(), range.sample(rng)))
                .collect();
            (src.clone(), counts)
        })
        .collect()
}
