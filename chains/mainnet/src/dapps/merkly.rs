use anyhow::{anyhow, Result};
use ethers::abi::parse_abi;
use ethers::prelude::*;
use std::sync::Arc;
use tracing::{error, info};

use crate::chain::Chain;
use crate::client::EvmClient;
use crate::dapps::{lz_adapter_params_v2, LZ_DST_GAS_LIMIT};

/// Merkly gas refuel: sends a small native amount to the destination chain
/// through LayerZero, paying the delivery fee on the source side.
pub struct Merkly;

fn refuel_contract_on(chain_name: &str) -> Result<Address> {
    let addr = match chain_name {
        "BSC" => "0xeF1eAE0457e8D56A003d781569489Bc5466E574b",
        "Polygon" => "0x0E1f20075C90Ab31FC2Dd91E536e6990262CF76d",
        "Celo" => "0xC20A842e1Fc2681920C1A190552A2f13C46e7fCF",
        "Gnosis" => "0x556F119C7433b2232294FB3De267747745A1dAb4",
        "Arbitrum" => "0x4Ae8CEBcCD7027820ba83188DFD73CCAD0A92806",
        "Moonbeam" => "0x671861008497782F7108D908D4dF18eBf9598b82",
        "Moonriver" => "0xd379c3D0930d70022B3C6EBA8217e4B990705540",
        "Conflux" => "0xE47b05F2026a82048caAECf5caE58e5AAE2405eA",
        other => return Err(anyhow!("Merkly has no refuel contract on {}", other)),
    };
    Ok(addr.parse().expect("hardcoded refuel address"))
}

fn refuel_abi() -> abi::Abi {
    parse_abi(&[
        "function estimateSendFee(uint16 _dstChainId, bytes _payload, bytes _adapterParams) view returns (uint256 nativeFee, uint256 zroFee)",
        "function bridgeGas(uint16 _dstChainId, address _toAddress, bytes _adapterParams) payable",
    ])
    .expect("static Merkly refuel ABI")
}

impl Merkly {
    /// Refuels `amount_native` (in source-chain coin units) to `dst`.
    pub async fn bridge(
        &self,
        client: &mut EvmClient,
        src: &Chain,
        dst: &Chain,
        amount_native: f64,
    ) -> Result<bool> {
        client.change_chain(src)?;

        let airdrop_wei = U256::from((amount_native * 1e18) as u128);
        if airdrop_wei.is_zero() {
            error!("[Merkly] Refuel amount on {} rounds to zero", src.name);
            return Ok(false);
        }

        let contract_addr = refuel_contract_on(&src.name)?;
        let contract = Contract::new(
            contract_addr,
            refuel_abi(),
            Arc::new(client.provider().clone()),
        );

        let adapter_params = lz_adapter_params_v2(LZ_DST_GAS_LIMIT, airdrop_wei, client.address);

        let (native_fee, _zro_fee): (U256, U256) = match contract
            .method(
                "estimateSendFee",
                (dst.lz_chain_id, Bytes::from(vec![0x00]), adapter_params.clone()),
            )?
            .call()
            .await
        {
            Ok(fees) => fees,
            Err(e) => {
                error!("[Merkly] Couldn't estimate LayerZero send fee: {e:#}");
                return Ok(false);
            }
        };

        let data = contract.encode(
            "bridgeGas",
            (dst.lz_chain_id, client.address, adapter_params),
        )?;

        info!(
            "[Merkly] Refueling {} {} from {} to {}",
            amount_native, dst.coin_symbol, src.name, dst.name
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
    fn test_refuel_contract_lookup() {
        assert!(refuel_contract_on("Polygon").is_ok());
        assert!(refuel_contract_on("Conflux").is_ok());
        assert!(refuel_contract_on("Kava").is_err());
    }

    #[test]
    fn test_refuel_abi_parses() {
        let abi = refuel_abi();
        assert!(abi.function("bridgeGas").is_ok());
        assert!(abi.function("estimateSendFee").is_ok());
    }
}
