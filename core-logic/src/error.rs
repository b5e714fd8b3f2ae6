//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for core-logic operations.
///
/// This enum wraps all specific error types and provides a unified
/// error interface for the application layer.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(ConfigError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Wallet(WalletError),

    #[error(transparent)]
    Network(NetworkError),

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        CoreError::Store(e)
    }
}

impl From<WalletError> for CoreError {
    fn from(e: WalletError) -> Self {
        CoreError::Wallet(e)
    }
}

impl From<NetworkError> for CoreError {
    fn from(e: NetworkError) -> Self {
        CoreError::Network(e)
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Wallet and key-material errors
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("Invalid private key format: expected hex string")]
    InvalidKeyFormat,

    #[error("Private key too short: expected 64 hex chars, got {length}")]
    InvalidKeyLength { length: usize },

    #[error("Wallet address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: String, actual: String },
}

/// Wallet store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store file not found: {path}")]
    Missing { path: String },

    #[error("Store file could not be parsed: {msg}")]
    Parse { msg: String },

    #[error("Invalid record index {index} (store holds {len} records)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("I/O error on store file {path}: {msg}")]
    Io { path: String, msg: String },
}

/// Network and RPC-related errors
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("Rate limited by {endpoint}: retry after {retry_after}s")]
    RateLimited { endpoint: String, retry_after: u64 },

    #[error("HTTP error {status_code} from {endpoint}")]
    HttpError { status_code: u16, endpoint: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Gate gave up after {polls} polls")]
    GateExhausted { polls: u32 },
}
