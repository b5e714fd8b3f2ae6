use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::utils::rng::Randomizer;

/// Inclusive `[min, max]` delay range in seconds, serialized as a two-element
/// array to match the seed config format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DelayRange(pub u64, pub u64);

impl DelayRange {
    pub fn sample(&self, rng: &Randomizer) -> Duration {
        Duration::from_secs(rng.range_u64(self.0, self.1))
    }
}

/// Inclusive `[min, max]` transaction-count range used when randomizing
/// per-wallet action budgets at store creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CountRange(pub u32, pub u32);

impl CountRange {
    pub fn sample(&self, rng: &Randomizer) -> u32 {
        rng.range_u32(self.0, self.1)
    }
}

/// Inclusive `[min, max]` amount range (in whole token units).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmountRange(pub f64, pub f64);

impl AmountRange {
    pub fn sample(&self, rng: &Randomizer, round_to: u32) -> f64 {
        let raw = rng.range_f64(self.0, self.1);
        let factor = 10f64.powi(round_to as i32);
        (raw * factor).round() / factor
    }
}

/// Randomization ranges for every per-wallet counter, keyed the same way the
/// counters themselves are stored: source chain -> destination chain -> range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterRanges {
    pub merkly: BTreeMap<String, BTreeMap<String, CountRange>>,
    pub stargate: CountRange,
    pub core_bridge: CountRange,
    pub angle: CountRange,
}

/// HTTP proxy assigned to a wallet, parsed from an `ip:port:user:pass` line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Parses a seed-file proxy line. Accepts `ip:port` and
    /// `ip:port:user:pass`; anything shorter is rejected.
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.trim().split(':').collect();
        if parts.len() < 2 {
            return None;
        }

        let url = format!("http://{}:{}", parts[0], parts[1]);
        let (username, password) = if parts.len() >= 4 {
            (Some(parts[2].to_string()), Some(parts[3].to_string()))
        } else {
            (None, None)
        };

        Some(Self {
            url,
            username,
            password,
        })
    }
}
