use anyhow::Result;
use async_trait::async_trait;
use core_logic::{
    BridgeLimitProbe, BridgeLimits, DelayRange, FeeProbe, GasGate, LimitGate, Randomizer,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Replays a scripted fee series; repeats the last value once drained.
struct ScriptedFees {
    series: Mutex<VecDeque<u128>>,
    polls: AtomicUsize,
}

impl ScriptedFees {
    fn new(series: &[u128]) -> Self {
        Self {
            series: Mutex::new(series.iter().copied().collect()),
            polls: AtomicUsize::new(0),
        }
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeeProbe for ScriptedFees {
    async fn gas_price_wei(&self) -> Result<u128> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut series = self.series.lock().unwrap();
        let next = series.front().copied().unwrap_or(0);
        if series.len() > 1 {
            series.pop_front();
        }
        Ok(next)
    }
}

struct ScriptedLimits {
    series: Mutex<VecDeque<Option<BridgeLimits>>>,
}

#[async_trait]
impl BridgeLimitProbe for ScriptedLimits {
    async fn bridge_limits(&self, _src: &str, _dst: &str) -> Result<Option<BridgeLimits>> {
        let mut series = self.series.lock().unwrap();
        Ok(series.pop_front().flatten())
    }
}

const GWEI: u128 = 1_000_000_000;

#[tokio::test]
async fn test_gas_gate_clears_immediately_below_threshold() {
    let probe = ScriptedFees::new(&[10 * GWEI]);
    let gate = GasGate::new(15.0, DelayRange(0, 0));
    let rng = Randomizer::from_seed(2);

    gate.await_clearance(&probe, &rng).await.unwrap();
    assert_eq!(probe.polls(), 1);
}

#[tokio::test]
async fn test_gas_gate_polls_until_fee_drops() {
    // Above, above, at-threshold: executes only after the third poll.
    let probe = ScriptedFees::new(&[40 * GWEI, 20 * GWEI, 15 * GWEI]);
    let gate = GasGate::new(15.0, DelayRange(0, 0));
    let rng = Randomizer::from_seed(2);

    gate.await_clearance(&probe, &rng).await.unwrap();
    assert_eq!(probe.polls(), 3);
}

#[tokio::test]
async fn test_gas_gate_poll_ceiling() {
    let probe = ScriptedFees::new(&[100 * GWEI]);
    let gate = GasGate::new(15.0, DelayRange(0, 0)).with_poll_ceiling(Some(3));
    let rng = Randomizer::from_seed(2);

    assert!(gate.await_clearance(&probe, &rng).await.is_err());
    assert_eq!(probe.polls(), 3);
}

#[tokio::test]
async fn test_gas_gate_propagates_probe_error() {
    struct FailingProbe;

    #[async_trait]
    impl FeeProbe for FailingProbe {
        async fn gas_price_wei(&self) -> Result<u128> {
            Err(anyhow::anyhow!("rpc down"))
        }
    }

    let gate = GasGate::new(15.0, DelayRange(0, 0));
    let rng = Randomizer::from_seed(2);
    assert!(gate.await_clearance(&FailingProbe, &rng).await.is_err());
}

#[tokio::test]
async fn test_limit_gate_waits_for_capacity() {
    let probe = ScriptedLimits {
        series: Mutex::new(VecDeque::from(vec![
            Some(BridgeLimits {
                from_limit: 10,
                to_limit: 1_000,
            }),
            Some(BridgeLimits {
                from_limit: 1_000,
                to_limit: 10,
            }),
            Some(BridgeLimits {
                from_limit: 1_000,
                to_limit: 1_000,
            }),
        ])),
    };
    let gate = LimitGate::new(DelayRange(0, 0));
    let rng = Randomizer::from_seed(2);

    let cleared = gate
        .await_capacity(&probe, "Polygon", "Celo", 500, &rng)
        .await
        .unwrap();
    assert!(cleared);
}

#[tokio::test]
async fn test_limit_gate_aborts_on_empty_response() {
    let probe = ScriptedLimits {
        series: Mutex::new(VecDeque::from(vec![None])),
    };
    let gate = LimitGate::new(DelayRange(0, 0));
    let rng = Randomizer::from_seed(2);

    let cleared = gate
        .await_capacity(&probe, "Polygon", "Celo", 500, &rng)
        .await
        .unwrap();
    assert!(!cleared);
}
