use anyhow::Result;
use ethers::abi::parse_abi;
use ethers::prelude::*;
use std::sync::Arc;
use tracing::{error, info};

use crate::chain::Chain;
use crate::client::EvmClient;
use crate::dapps::ZeroX;
use crate::token::{fraction_remaining, Token};

const CORE_BRIDGE_CONTRACT: &str = "0x52e75D318cFB31f9A2EdFa2DFee26B161255B233";

/// CoreBridge warmup product: swaps BNB into USDT through the aggregator
/// when needed, then bridges the USDT balance from BSC to Core.
pub struct CoreBridge {
    zerox: ZeroX,
    use_swap_before_bridge: bool,
    max_left_token_percentage: f64,
}

fn core_bridge_abi() -> abi::Abi {
    parse_abi(&[
        "function estimateBridgeFee(bool useZro, bytes adapterParams) view returns (uint256 nativeFee, uint256 zroFee)",
        "function bridge(address token, uint256 amountLd, address to, address refundAddress, bytes adapterParams) payable",
    ])
    .expect("static CoreBridge ABI")
}

impl CoreBridge {
    pub fn new(zerox: ZeroX, use_swap_before_bridge: bool, max_left_token_percentage: f64) -> Self {
        Self {
            zerox,
            use_swap_before_bridge,
            max_left_token_percentage,
        }
    }

    pub async fn swap_and_bridge(
        &self,
        client: &mut EvmClient,
        src: &Chain,
        _dst: &Chain,
        amount_native: f64,
    ) -> Result<bool> {
        client.change_chain(src)?;

        let usdt = Token::usdt_bsc();
        let mut balance = client.get_token_balance(&usdt).await?;

        if balance.is_zero() || self.use_swap_before_bridge {
            let sell_amount = U256::from((amount_native * 1e18) as u128);
            if !self.zerox.swap_native_for(client, &usdt, sell_amount).await? {
                return Ok(false);
            }
            balance = client.get_token_balance(&usdt).await?;
        }

        let amount = fraction_remaining(balance, self.max_left_token_percentage);
        if amount.is_zero() {
            error!("[CoreBridge] No USDT to bridge on {}", src.name);
            return Ok(false);
        }

        let contract_addr: Address = CORE_BRIDGE_CONTRACT.parse().expect("hardcoded address");
        if !client.approve(contract_addr, &usdt, amount).await? {
            return Ok(false);
        }

        let contract = Contract::new(
            contract_addr,
            core_bridge_abi(),
            Arc::new(client.provider().clone()),
        );

        let adapter_params = Bytes::default();
        let (native_fee, _zro_fee): (U256, U256) = match contract
            .method("estimateBridgeFee", (false, adapter_params.clone()))?
            .call()
            .await
        {
            Ok(fees) => fees,
            Err(e) => {
                error!("[CoreBridge] Couldn't estimate bridge fee: {e:#}");
                return Ok(false);
            }
        };

        let data = contract.encode(
            "bridge",
            (
                usdt.contract_on(&src.name)?,
                amount,
                client.address,
                client.address,
                adapter_params,
            ),
        )?;

        info!(
            "[CoreBridge] Bridging {} USDT from {} to Core",
            usdt.from_wei(amount),
            src.name
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
    fn test_core_bridge_abi_parses() {
        let abi = core_bridge_abi();
        assert!(abi.function("bridge").is_ok());
        assert!(abi.function("estimateBridgeFee").is_ok());
    }
}
