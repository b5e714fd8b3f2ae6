//! Shared request-rate budget.
//!
//! All outbound HTTP calls (aggregator quotes, bridge limit checks, exchange
//! requests) draw from one token bucket so a burst of wallet activity cannot
//! hammer the upstream APIs.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RequestBudget {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

impl RequestBudget {
    /// Budget of `rps` requests per second with a burst capacity of twice
    /// that.
    pub fn new(rps: u32) -> Self {
        let rps = rps.max(1);
        Self {
            state: Mutex::new(BucketState {
                tokens: (rps * 2) as f64,
                last_refill: Instant::now(),
            }),
            capacity: (rps * 2) as f64,
            refill_per_sec: rps as f64,
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            state.last_refill = Instant::now();
        }
    }

    /// Takes one token if available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Waits until a token is available.
    pub async fn acquire(&self) {
        let wait = Duration::from_millis((1000.0 / self.refill_per_sec) as u64);
        while !self.try_acquire() {
            debug!("Request budget exhausted, waiting {:?}", wait);
            sleep(wait).await;
        }
    }

    pub fn available(&self) -> u32 {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        state.tokens as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_drains() {
        let budget = RequestBudget::new(2);
        assert_eq!(budget.available(), 4);
        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert!(!budget.try_acquire());
    }

    #[tokio::test]
    async fn test_budget_refills_over_time() {
        let budget = RequestBudget::new(50);
        while budget.try_acquire() {}
        sleep(Duration::from_millis(100)).await;
        assert!(budget.try_acquire());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_slot() {
        let budget = RequestBudget::new(20);
        while budget.try_acquire() {}
        // Must return once the bucket refills rather than hang.
        budget.acquire().await;
    }
}
