pub mod angle;
pub mod core_bridge;
pub mod inch;
pub mod merkly;
pub mod stargate;
pub mod zerox;

pub use angle::Angle;
pub use core_bridge::CoreBridge;
pub use inch::Inch;
pub use merkly::Merkly;
pub use stargate::Stargate;
pub use zerox::ZeroX;

use anyhow::Result;
use core_logic::BridgeProduct;
use ethers::types::{Address, Bytes, U256};

use crate::chain::Chain;
use crate::client::EvmClient;
use crate::config::AppConfig;

/// The three warmup bridge products behind one dispatch point.
pub struct BridgeProductSet {
    merkly: Merkly,
    stargate: Stargate,
    core_bridge: CoreBridge,
}

impl BridgeProductSet {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            merkly: Merkly,
            stargate: Stargate::new(
                ZeroX::from_env(),
                cfg.swap.use_swap_before_bridge,
                cfg.swap.max_left_token_percentage,
            ),
            core_bridge: CoreBridge::new(
                ZeroX::from_env(),
                cfg.swap.use_swap_before_bridge,
                cfg.swap.max_left_token_percentage,
            ),
        }
    }

    pub async fn execute(
        &self,
        client: &mut EvmClient,
        product: BridgeProduct,
        src: &Chain,
        dst: &Chain,
        amount_native: f64,
    ) -> Result<bool> {
        match product {
            BridgeProduct::Merkly => self.merkly.bridge(client, src, dst, amount_native).await,
            BridgeProduct::Stargate => {
                self.stargate
                    .swap_and_bridge(client, src, dst, amount_native)
                    .await
            }
            BridgeProduct::CoreBridge => {
                self.core_bridge
                    .swap_and_bridge(client, src, dst, amount_native)
                    .await
            }
        }
    }
}

/// LayerZero v1 adapter params: version 1 + destination gas limit.
pub(crate) fn lz_adapter_params_v1(gas_limit: u64) -> Bytes {
    let mut out = Vec::with_capacity(34);
    out.extend_from_slice(&1u16.to_be_bytes());
    let mut gas = [0u8; 32];
    U256::from(gas_limit).to_big_endian(&mut gas);
    out.extend_from_slice(&gas);
    Bytes::from(out)
}

/// LayerZero v2 adapter params: version 2 + gas limit + native airdrop amount
/// and its receiver on the destination chain.
pub(crate) fn lz_adapter_params_v2(gas_limit: u64, airdrop_wei: U256, receiver: Address) -> Bytes {
    let mut out = Vec::with_capacity(86);
    out.extend_from_slice(&2u16.to_be_bytes());
    let mut word = [0u8; 32];
    U256::from(gas_limit).to_big_endian(&mut word);
    out.extend_from_slice(&word);
    airdrop_wei.to_big_endian(&mut word);
    out.extend_from_slice(&word);
    out.extend_from_slice(receiver.as_bytes());
    Bytes::from(out)
}

/// Gas limit requested for LayerZero delivery on the destination chain.
pub(crate) const LZ_DST_GAS_LIMIT: u64 = 200_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_params_v1_layout() {
        let params = lz_adapter_params_v1(LZ_DST_GAS_LIMIT);
        assert_eq!(params.len(), 34);
        assert_eq!(&params[0..2], &[0x00, 0x01]);
        assert_eq!(
            U256::from_big_endian(&params[2..34]),
            U256::from(LZ_DST_GAS_LIMIT)
        );
    }

    #[test]
    fn test_adapter_params_v2_layout() {
        let receiver: Address = "0x0000000000000000000000000000000000000001"
            .parse()
            .unwrap();
        let params = lz_adapter_params_v2(LZ_DST_GAS_LIMIT, U256::from(7u64), receiver);
        assert_eq!(params.len(), 86);
        assert_eq!(&params[0..2], &[0x00, 0x02]);
        assert_eq!(U256::from_big_endian(&params[34..66]), U256::from(7u64));
        assert_eq!(&params[66..86], receiver.as_bytes());
    }
}
