use anyhow::Result;
use async_trait::async_trait;

/// Derives the public address for a raw private key.
///
/// The store never trusts persisted addresses: they are recomputed through
/// this capability on every load to catch tampering or corruption.
pub trait AddressDeriver: Send + Sync {
    fn derive(&self, private_key: &str) -> Result<String>;
}

/// Reads the current network base fee, in wei.
#[async_trait]
pub trait FeeProbe: Send + Sync {
    async fn gas_price_wei(&self) -> Result<u128>;
}

/// Remaining bridge capacity on both sides of a route, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeLimits {
    pub from_limit: u128,
    pub to_limit: u128,
}

/// Polls a bridge limit endpoint for a source/destination chain pair.
/// `Ok(None)` means the endpoint answered but reported no usable limits.
#[async_trait]
pub trait BridgeLimitProbe: Send + Sync {
    async fn bridge_limits(&self, src: &str, dst: &str) -> Result<Option<BridgeLimits>>;
}
