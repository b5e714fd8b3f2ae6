//! Polling gates over external conditions.
//!
//! A gate blocks progress until the network is in an acceptable state:
//! [`GasGate`] waits for the base fee to fall to the configured ceiling,
//! [`LimitGate`] waits for a bridge route to have capacity for the requested
//! amount. Both poll with a randomized delay and are unbounded by default —
//! under sustained high fees the bot waits rather than overpaying. A poll
//! ceiling can be configured for deployments that prefer a deadline.

use anyhow::Result;
use tracing::{info, warn};

use crate::config::DelayRange;
use crate::error::NetworkError;
use crate::traits::{BridgeLimitProbe, FeeProbe};
use crate::utils::delay::sleep_range;
use crate::utils::rng::Randomizer;

pub fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * 1e9) as u128
}

pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / 1e9
}

#[derive(Debug, Clone)]
pub struct GasGate {
    threshold_wei: u128,
    delay_range: DelayRange,
    max_polls: Option<u32>,
}

impl GasGate {
    pub fn new(threshold_gwei: f64, delay_range: DelayRange) -> Self {
        Self {
            threshold_wei: gwei_to_wei(threshold_gwei),
            delay_range,
            max_polls: None,
        }
    }

    pub fn from_wei(threshold_wei: u128, delay_range: DelayRange) -> Self {
        Self {
            threshold_wei,
            delay_range,
            max_polls: None,
        }
    }

    /// Caps the number of polls; without it the gate waits indefinitely.
    pub fn with_poll_ceiling(mut self, max_polls: Option<u32>) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn threshold_wei(&self) -> u128 {
        self.threshold_wei
    }

    /// Blocks until the polled fee is at or below the threshold. Probe
    /// errors propagate; with a poll ceiling the gate fails once it is hit.
    pub async fn await_clearance(&self, probe: &dyn FeeProbe, rng: &Randomizer) -> Result<()> {
        let mut polls = 0u32;

        loop {
            let price = probe.gas_price_wei().await?;
            if price <= self.threshold_wei {
                return Ok(());
            }

            polls += 1;
            if let Some(max) = self.max_polls {
                if polls >= max {
                    return Err(NetworkError::GateExhausted { polls }.into());
                }
            }

            warn!(
                "Current gas fee {:.2} GWEI > ceiling {:.2} GWEI, waiting...",
                wei_to_gwei(price),
                wei_to_gwei(self.threshold_wei)
            );
            sleep_range(self.delay_range, rng).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct LimitGate {
    delay_range: DelayRange,
    max_polls: Option<u32>,
}

impl LimitGate {
    pub fn new(delay_range: DelayRange) -> Self {
        Self {
            delay_range,
            max_polls: None,
        }
    }

    pub fn with_poll_ceiling(mut self, max_polls: Option<u32>) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Blocks until the requested amount fits both the source and the
    /// destination limit. Returns `false` when the endpoint reports no
    /// usable limits at all; probe errors propagate.
    pub async fn await_capacity(
        &self,
        probe: &dyn BridgeLimitProbe,
        src: &str,
        dst: &str,
        amount_wei: u128,
        rng: &Randomizer,
    ) -> Result<bool> {
        let mut polls = 0u32;

        loop {
            let Some(limits) = probe.bridge_limits(src, dst).await? else {
                return Ok(false);
            };

            if limits.from_limit >= amount_wei && limits.to_limit >= amount_wei {
                info!("Bridge {}->{} has capacity for the requested amount", src, dst);
                return Ok(true);
            }

            polls += 1;
            if let Some(max) = self.max_polls {
                if polls >= max {
                    return Err(NetworkError::GateExhausted { polls }.into());
                }
            }

            warn!("Bridge {}->{} limit below requested amount, waiting...", src, dst);
            sleep_range(self.delay_range, rng).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gwei_to_wei() {
        assert_eq!(gwei_to_wei(1.0), 1_000_000_000);
        assert_eq!(gwei_to_wei(0.5), 500_000_000);
        assert_eq!(gwei_to_wei(15.0), 15_000_000_000);
    }

    #[test]
    fn test_wei_to_gwei_roundtrip() {
        assert!((wei_to_gwei(gwei_to_wei(2.5)) - 2.5).abs() < f64::EPSILON);
    }
}
