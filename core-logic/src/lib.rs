//! # Core Logic - Wallet Orchestration Engine
//!
//! This crate provides the chain-agnostic engine shared by the application
//! binaries: the durable wallet store, per-wallet action selection, polling
//! gates, retry wrapping, and the supporting ambient pieces.
//!
//! ## Modules
//!
//! - [`config`] - Shared configuration primitives (ranges, seed paths)
//! - [`database`] - Durable JSON wallet store with atomic write-through
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Step/RPC metrics collection
//! - [`record`] - Wallet records and typed partial updates
//! - [`selector`] - Randomized warmup action selection
//! - [`traits`] - Capability trait definitions
//! - [`utils`] - Gates, retry, delays, rate budget, logger, runner

pub mod config;
pub mod database;
pub mod error;
pub mod metrics;
pub mod record;
pub mod selector;
pub mod traits;
pub mod utils;

// Selective exports - only public API types
pub use config::{AmountRange, CountRange, CounterRanges, DelayRange, ProxyConfig};
pub use database::WalletStore;
pub use error::{ConfigError, CoreError, NetworkError, StoreError, WalletError};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use record::{RecordPatch, WalletRecord};
pub use selector::{ActionSelector, BridgeProduct, WarmupAction};
pub use traits::{AddressDeriver, BridgeLimitProbe, BridgeLimits, FeeProbe};
pub use utils::seed_loader::{pair_seed_inputs, read_lines, SeedTriple};
pub use utils::{setup_logger, GasGate, LimitGate, ModeRunner, ModeStats, Randomizer, RequestBudget};

// Export retry utilities
pub use utils::retry::{retry_flag, retry_on_fail, RetryPolicy};
