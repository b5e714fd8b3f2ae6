//! Single seedable randomness source.
//!
//! Every randomized decision in the engine (counter budgets, action choice,
//! delays, withdrawal amounts) draws from one `Randomizer` handle so tests
//! can inject a fixed seed and replay schedules deterministically.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

/// Cheaply clonable handle over a shared seedable RNG.
#[derive(Debug, Clone)]
pub struct Randomizer {
    inner: Arc<Mutex<StdRng>>,
}

impl Randomizer {
    pub fn from_entropy() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Uniform integer in `[min, max]` (inclusive).
    pub fn range_u32(&self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.inner.lock().unwrap().gen_range(min..=max)
    }

    /// Uniform integer in `[min, max]` (inclusive).
    pub fn range_u64(&self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        self.inner.lock().unwrap().gen_range(min..=max)
    }

    /// Uniform float in `[min, max]`.
    pub fn range_f64(&self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        self.inner.lock().unwrap().gen_range(min..=max)
    }

    /// Uniform index into a collection of `len` elements.
    pub fn index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.inner.lock().unwrap().gen_range(0..len))
    }

    /// Uniform choice from a slice.
    pub fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        self.index(items.len()).map(|i| &items[i])
    }
}
