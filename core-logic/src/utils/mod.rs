//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.

pub mod delay;
pub mod gate;
pub mod logger;
pub mod rate_limiter;
pub mod retry;
pub mod rng;
pub mod runner;
pub mod seed_loader;

pub use gate::{GasGate, LimitGate};
pub use logger::setup_logger;
pub use rate_limiter::RequestBudget;
pub use rng::Randomizer;
pub use runner::{ModeRunner, ModeStats};
