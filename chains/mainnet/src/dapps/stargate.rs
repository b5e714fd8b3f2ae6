use anyhow::Result;
use ethers::abi::parse_abi;
use ethers::prelude::*;
use std::sync::Arc;
use tracing::{error, info};

use crate::chain::Chain;
use crate::client::EvmClient;
use crate::dapps::{lz_adapter_params_v1, ZeroX, LZ_DST_GAS_LIMIT};
use crate::token::{fraction_remaining, Token};

/// Stargate warmup product: swaps the source coin into STG through the
/// aggregator when needed, then sends the STG balance across LayerZero.
pub struct Stargate {
    zerox: ZeroX,
    use_swap_before_bridge: bool,
    max_left_token_percentage: f64,
}

fn stg_oft_abi() -> abi::Abi {
    parse_abi(&[
        "function estimateSendTokensFee(uint16 _dstChainId, bool _useZro, bytes _txParameters) view returns (uint256 nativeFee, uint256 zroFee)",
        "function sendTokens(uint16 _dstChainId, bytes _to, uint256 _qty, address _zroPaymentAddress, bytes _adapterParam) payable",
    ])
    .expect("static STG OFT ABI")
}

impl Stargate {
    pub fn new(zerox: ZeroX, use_swap_before_bridge: bool, max_left_token_percentage: f64) -> Self {
        Self {
            zerox,
            use_swap_before_bridge,
            max_left_token_percentage,
        }
    }

    /// `amount_native` is the coin amount (in whole units) to feed into the
    /// aggregator swap before bridging.
    pub async fn swap_and_bridge(
        &self,
        client: &mut EvmClient,
        src: &Chain,
        dst: &Chain,
        amount_native: f64,
    ) -> Result<bool> {
        client.change_chain(src)?;

        let stg = Token::stg();
        let mut balance = client.get_token_balance(&stg).await?;

        // A zero STG balance forces the swap regardless of the toggle.
        if balance.is_zero() || self.use_swap_before_bridge {
            let sell_amount = U256::from((amount_native * 1e18) as u128);
            if !self.zerox.swap_native_for(client, &stg, sell_amount).await? {
                return Ok(false);
            }
            balance = client.get_token_balance(&stg).await?;
        }

        let qty = fraction_remaining(balance, self.max_left_token_percentage);
        if qty.is_zero() {
            error!("[Stargate] No STG to bridge on {}", src.name);
            return Ok(false);
        }

        let contract_addr = stg.contract_on(&src.name)?;
        let contract = Contract::new(
            contract_addr,
            stg_oft_abi(),
            Arc::new(client.provider().clone()),
        );

        let adapter_params = lz_adapter_params_v1(LZ_DST_GAS_LIMIT);
        let (native_fee, _zro_fee): (U256, U256) = match contract
            .method(
                "estimateSendTokensFee",
                (dst.lz_chain_id, false, adapter_params.clone()),
            )?
            .call()
            .await
        {
            Ok(fees) => fees,
            Err(e) => {
                error!("[Stargate] Couldn't estimate LayerZero send fee: {e:#}");
                return Ok(false);
            }
        };

        let to = Bytes::from(client.address.as_bytes().to_vec());
        let data = contract.encode(
            "sendTokens",
            (dst.lz_chain_id, to, qty, Address::zero(), adapter_params),
        )?;

        info!(
            "[Stargate] Bridging {} STG from {} to {}",
            stg.from_wei(qty),
            src.name,
            dst.name
        );

        let Some(tx_hash) = client
            .send_transaction(contract_addr, Some(data), Some(native_fee))
            .await?
        else {
            return Ok(false);
        };

        Ok(client.verify_tx(tx_hash).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stg_oft_abi_parses() {
        let abi = stg_oft_abi();
        assert!(abi.function("sendTokens").is_ok());
        assert!(abi.function("estimateSendTokensFee").is_ok());
    }
}
