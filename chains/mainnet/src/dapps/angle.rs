use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers::abi::parse_abi;
use ethers::prelude::*;
use ethers::types::transaction::eip712::TypedData;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use core_logic::{
    BridgeLimitProbe, BridgeLimits, GasGate, LimitGate, Randomizer, RequestBudget,
};

use crate::chain::{self, Chain, ChainRegistry};
use crate::client::{parse_erc20_abi, EvmClient};
use crate::config::AppConfig;
use crate::dapps::{lz_adapter_params_v1, LZ_DST_GAS_LIMIT};
use crate::token::{fraction_remaining, Token};

const ANGLE_LIMIT_URL: &str = "https://api.angle.money/v1/layerZero";
const PERMIT_DEADLINE_SECS: i64 = 60 * 3;

fn angle_contract_on(chain_name: &str) -> Result<Address> {
    let addr = match chain_name {
        chain::POLYGON => "0x0c1EBBb61374dA1a8C57cB6681bF27178360d36F",
        chain::CELO => "0xf1dDcACA7D17f8030Ab2eb54f2D9811365EFe123",
        chain::GNOSIS => "0xFA5Ed56A203466CbBC2430a43c66b9D8723528E7",
        other => return Err(anyhow!("AngleMoney has no bridge contract on {}", other)),
    };
    Ok(addr.parse().expect("hardcoded bridge address"))
}

fn angle_abi() -> abi::Abi {
    parse_abi(&[
        "function estimateSendFee(uint16 _dstChainId, address _toAddress, uint256 _amount, bool _useZro, bytes _adapterParams) view returns (uint256 nativeFee, uint256 zroFee)",
        "function send(uint16 _dstChainId, address _toAddress, uint256 _amount, address _refundAddress, address _zroPaymentAddress, bytes _adapterParams) payable",
        "function sendWithPermit(uint16 _dstChainId, address _toAddress, uint256 _amount, address _refundAddress, address _zroPaymentAddress, bytes _adapterParams, uint256 deadline, uint8 v, bytes32 r, bytes32 s) payable",
    ])
    .expect("static Angle ABI")
}

/// Polls the Angle limit endpoint for remaining route capacity.
pub struct AngleLimitApi {
    http: reqwest::Client,
    user: Address,
    registry: Arc<ChainRegistry>,
    budget: Arc<RequestBudget>,
}

fn parse_limit(value: &Value) -> Option<u128> {
    match value {
        Value::String(s) => s.parse::<f64>().ok().map(|v| v as u128),
        Value::Number(n) => n.as_f64().map(|v| v as u128),
        _ => None,
    }
}

#[async_trait]
impl BridgeLimitProbe for AngleLimitApi {
    async fn bridge_limits(&self, src: &str, dst: &str) -> Result<Option<BridgeLimits>> {
        let src_id = self.registry.get(src)?.chain_id;
        let dst_id = self.registry.get(dst)?.chain_id;

        let url = format!(
            "{}?user={:?}&chainId={}&toChainId={}",
            ANGLE_LIMIT_URL, self.user, src_id, dst_id
        );

        self.budget.acquire().await;
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Angle limit request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("Angle limit endpoint returned {}", response.status()));
        }
        let data: Value = response.json().await.context("Angle limit response")?;

        let from_limit = data
            .pointer(&format!("/{}/agEUR/fromLimit", src_id))
            .and_then(parse_limit);
        let to_limit = data
            .pointer(&format!("/{}/agEUR/toLimit", dst_id))
            .and_then(parse_limit);

        Ok(match (from_limit, to_limit) {
            (Some(from_limit), Some(to_limit)) => Some(BridgeLimits {
                from_limit,
                to_limit,
            }),
            _ => None,
        })
    }
}

/// Angle agEUR LayerZero bridge between Polygon, Celo and Gnosis.
///
/// Bridging from Celo/Gnosis goes through `sendWithPermit` with an EIP-712
/// permit signature; Polygon uses the plain approve + `send` path. Gnosis
/// sources additionally wait for the local gas price to settle.
pub struct Angle {
    cfg: Arc<AppConfig>,
    registry: Arc<ChainRegistry>,
    budget: Arc<RequestBudget>,
    rng: Randomizer,
    limit_gate: LimitGate,
    gnosis_gate: GasGate,
}

impl Angle {
    pub fn new(
        cfg: Arc<AppConfig>,
        registry: Arc<ChainRegistry>,
        budget: Arc<RequestBudget>,
        rng: Randomizer,
    ) -> Self {
        let limit_gate = LimitGate::new(cfg.delays.request_sleep_range)
            .with_poll_ceiling(cfg.gas.max_polls);
        let gnosis_gate = GasGate::new(cfg.gas.gnosis_max_gwei, cfg.gas.gnosis_delay_range)
            .with_poll_ceiling(cfg.gas.max_polls);
        Self {
            cfg,
            registry,
            budget,
            rng,
            limit_gate,
            gnosis_gate,
        }
    }

    async fn estimate_send_fee(
        &self,
        client: &EvmClient,
        contract_addr: Address,
        dst: &Chain,
        amount: U256,
    ) -> Option<U256> {
        let contract = Contract::new(
            contract_addr,
            angle_abi(),
            Arc::new(client.provider().clone()),
        );

        let result: Result<(U256, U256), _> = contract
            .method(
                "estimateSendFee",
                (
                    dst.lz_chain_id,
                    client.address,
                    amount,
                    false,
                    lz_adapter_params_v1(LZ_DST_GAS_LIMIT),
                ),
            )
            .ok()?
            .call()
            .await;

        match result {
            Ok((native_fee, _zro_fee)) => Some(native_fee),
            Err(e) => {
                error!("[AngleMoney] Couldn't estimate LayerZero send fee: {e:#}");
                None
            }
        }
    }

    async fn token_nonce(&self, client: &EvmClient, token: &Token) -> Result<U256> {
        let contract = Contract::new(
            token.contract_on(&client.chain().name)?,
            parse_erc20_abi(),
            Arc::new(client.provider().clone()),
        );
        contract
            .method("nonces", client.address)?
            .call()
            .await
            .context("Couldn't get token permit nonce")
    }

    async fn sign_permit(
        &self,
        client: &EvmClient,
        token: &Token,
        spender: Address,
        value: U256,
        nonce: U256,
        deadline: u64,
    ) -> Result<Signature> {
        let src = client.chain();
        let typed: TypedData = serde_json::from_value(json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "version", "type": "string"},
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"},
                ],
                "Permit": [
                    {"name": "owner", "type": "address"},
                    {"name": "spender", "type": "address"},
                    {"name": "value", "type": "uint256"},
                    {"name": "nonce", "type": "uint256"},
                    {"name": "deadline", "type": "uint256"},
                ],
            },
            "primaryType": "Permit",
            "domain": {
                "name": "agEUR",
                "version": "1",
                "chainId": src.chain_id,
                "verifyingContract": format!("{:?}", token.contract_on(&src.name)?),
            },
            "message": {
                "owner": format!("{:?}", client.address),
                "spender": format!("{:?}", spender),
                "value": value.to_string(),
                "nonce": nonce.to_string(),
                "deadline": deadline.to_string(),
            },
        }))
        .context("Couldn't build permit typed data")?;

        client
            .wallet()
            .sign_typed_data(&typed)
            .await
            .context("Permit signing failed")
    }

    async fn send_with_permit(
        &self,
        client: &EvmClient,
        contract_addr: Address,
        src: &Chain,
        dst: &Chain,
        amount: U256,
        fee: U256,
        token: &Token,
    ) -> Result<bool> {
        let nonce = self.token_nonce(client, token).await?;
        let deadline = client.deadline(PERMIT_DEADLINE_SECS);

        info!(
            "[AngleMoney] Approving {} {} for bridging via permit",
            token.from_wei(amount),
            token.symbol
        );

        let signature = self
            .sign_permit(client, token, contract_addr, amount, nonce, deadline)
            .await?;

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        signature.r.to_big_endian(&mut r);
        signature.s.to_big_endian(&mut s);

        let contract = Contract::new(
            contract_addr,
            angle_abi(),
            Arc::new(client.provider().clone()),
        );
        let data = contract.encode(
            "sendWithPermit",
            (
                dst.lz_chain_id,
                client.address,
                amount,
                client.address,
                Address::zero(),
                lz_adapter_params_v1(LZ_DST_GAS_LIMIT),
                U256::from(deadline),
                // uint8 in the ABI; u8 itself is not Tokenizable.
                signature.v as u32,
                H256::from(r),
                H256::from(s),
            ),
        )?;

        info!(
            "[AngleMoney] Bridging {} {} from {} to {}",
            token.from_wei(amount),
            token.symbol,
            src.name,
            dst.name
        );

        let Some(tx_hash) = client
            .send_transaction(contract_addr, Some(data), Some(fee))
            .await?
        else {
            return Ok(false);
        };
        Ok(client.verify_tx(tx_hash).await)
    }

    async fn send_with_approve(
        &self,
        client: &EvmClient,
        contract_addr: Address,
        src: &Chain,
        dst: &Chain,
        amount: U256,
        fee: U256,
        token: &Token,
    ) -> Result<bool> {
        if !client.approve(contract_addr, token, amount).await? {
            return Ok(false);
        }

        let contract = Contract::new(
            contract_addr,
            angle_abi(),
            Arc::new(client.provider().clone()),
        );
        let data = contract.encode(
            "send",
            (
                dst.lz_chain_id,
                client.address,
                amount,
                client.address,
                Address::zero(),
                lz_adapter_params_v1(LZ_DST_GAS_LIMIT),
            ),
        )?;

        info!(
            "[AngleMoney] Bridging {} {} from {} to {}",
            token.from_wei(amount),
            token.symbol,
            src.name,
            dst.name
        );

        let Some(tx_hash) = client
            .send_transaction(contract_addr, Some(data), Some(fee))
            .await?
        else {
            return Ok(false);
        };
        Ok(client.verify_tx(tx_hash).await)
    }

    /// Bridges the wallet's agEUR balance from `src` to `dst` and waits for
    /// the funds to land on the destination.
    pub async fn bridge(&self, client: &mut EvmClient, src: &Chain, dst: &Chain) -> Result<bool> {
        let token = Token::ageur();
        client.change_chain(src)?;

        let balance = client.get_token_balance(&token).await?;
        let amount = fraction_remaining(balance, self.cfg.swap.max_left_token_percentage);

        // Snapshot the destination balance so arrival can be detected.
        client.change_chain(dst)?;
        let initial_balance = client.get_token_balance(&token).await?;
        client.change_chain(src)?;

        let probe = AngleLimitApi {
            http: client.http_client(),
            user: client.address,
            registry: self.registry.clone(),
            budget: self.budget.clone(),
        };
        let capacity = self
            .limit_gate
            .await_capacity(&probe, &src.name, &dst.name, amount.as_u128(), &self.rng)
            .await?;
        if !capacity {
            warn!("[AngleMoney] Limit endpoint reported no usable limits");
            return Ok(false);
        }

        if amount.is_zero() {
            error!(
                "[AngleMoney] {} balance on {} is zero",
                token.symbol, src.name
            );
            return Ok(false);
        }

        let contract_addr = angle_contract_on(&src.name)?;
        let Some(fee) = self.estimate_send_fee(client, contract_addr, dst, amount).await else {
            return Ok(false);
        };

        let bridged = if src.name == chain::CELO || src.name == chain::GNOSIS {
            if src.name == chain::GNOSIS {
                self.gnosis_gate.await_clearance(&*client, &self.rng).await?;
            }
            self.send_with_permit(client, contract_addr, src, dst, amount, fee, &token)
                .await?
        } else {
            self.send_with_approve(client, contract_addr, src, dst, amount, fee, &token)
                .await?
        };

        if !bridged {
            return Ok(false);
        }

        client
            .wait_for_funds(
                initial_balance,
                dst,
                &token,
                self.cfg.delays.bridged_funds_range,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_known_only_on_bridge_chains() {
        assert!(angle_contract_on(chain::POLYGON).is_ok());
        assert!(angle_contract_on(chain::CELO).is_ok());
        assert!(angle_contract_on(chain::GNOSIS).is_ok());
        assert!(angle_contract_on(chain::BSC).is_err());
    }

    #[test]
    fn test_angle_abi_parses() {
        let abi = angle_abi();
        assert!(abi.function("send").is_ok());
        assert!(abi.function("sendWithPermit").is_ok());
        assert!(abi.function("estimateSendFee").is_ok());
    }

    #[test]
    fn test_parse_limit_accepts_strings_and_numbers() {
        assert_eq!(parse_limit(&json!("1000000")), Some(1_000_000));
        assert_eq!(parse_limit(&json!(2.5e6)), Some(2_500_000));
        assert_eq!(parse_limit(&json!(null)), None);
    }
}
