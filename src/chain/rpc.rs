//! JSON-RPC chain client using Multicall3 `aggregate3` pinned to a block.

use super::abi::IMulticall3;
use super::{Call, CallOutcome, ChainClient, ChainError};
use crate::domain::{BlockNumber, ChainId, Timestamp};
use alloy_primitives::{address, Address};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Multicall3 is deployed at the same address on every supported chain.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Chain client speaking Ethereum JSON-RPC over HTTP.
#[derive(Debug, Clone)]
pub struct JsonRpcChainClient {
    client: Client,
    chain_id: ChainId,
    rpc_url: String,
    max_elapsed: Duration,
}

impl JsonRpcChainClient {
    pub fn new(chain_id: ChainId, rpc_url: String) -> Self {
        Self {
            client: Client::new(),
            chain_id,
            rpc_url,
            max_elapsed: Duration::from_secs(30),
        }
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ChainError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        let response = retry(backoff, || async {
            let response = self
                .client
                .post(&self.rpc_url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(ChainError::Transport(e.to_string())))?;

            let status = response.status();
            if status == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(ChainError::Transport(format!(
                    "http status {}",
                    status.as_u16()
                ))));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(ChainError::Transport(format!(
                    "http status {}",
                    status.as_u16()
                ))));
            }

            response
                .json::<RpcResponse>()
                .await
                .map_err(|e| backoff::Error::permanent(ChainError::Decode(e.to_string())))
        })
        .await?;

        if let Some(err) = response.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }
}

fn block_tag(block: BlockNumber) -> String {
    format!("0x{:x}", block.as_u64())
}

fn parse_hex_u64(value: &serde_json::Value) -> Result<u64, ChainError> {
    let s = value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected hex string, got {}", value)))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| ChainError::Decode(format!("invalid hex quantity {}: {}", s, e)))
}

fn parse_hex_bytes(value: &serde_json::Value) -> Result<Vec<u8>, ChainError> {
    let s = value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected hex data, got {}", value)))?;
    hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| ChainError::Decode(format!("invalid hex data: {}", e)))
}

/// Encode a batch as a single `aggregate3` call.
pub fn encode_aggregate3(calls: &[Call], allow_failure: bool) -> Vec<u8> {
    let calls = calls
        .iter()
        .map(|c| IMulticall3::Call3 {
            target: c.target,
            allowFailure: allow_failure,
            callData: c.calldata.clone(),
        })
        .collect();
    IMulticall3::aggregate3Call { calls }.abi_encode()
}

/// Decode `aggregate3` return data into per-call outcomes.
pub fn decode_aggregate3(data: &[u8]) -> Result<Vec<CallOutcome>, ChainError> {
    let decoded = IMulticall3::aggregate3Call::abi_decode_returns(data, true)
        .map_err(|e| ChainError::Decode(e.to_string()))?;
    Ok(decoded
        .returnData
        .into_iter()
        .map(|r| CallOutcome {
            success: r.success,
            return_data: r.returnData,
        })
        .collect())
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn block_timestamp(&self, block: BlockNumber) -> Result<Timestamp, ChainError> {
        let result = self
            .request(
                "eth_getBlockByNumber",
                serde_json::json!([block_tag(block), false]),
            )
            .await?;
        if result.is_null() {
            return Err(ChainError::BlockNotFound(block));
        }
        let ts = parse_hex_u64(&result["timestamp"])?;
        Ok(Timestamp::new(ts))
    }

    async fn latest_block_number(&self) -> Result<BlockNumber, ChainError> {
        let result = self
            .request("eth_blockNumber", serde_json::json!([]))
            .await?;
        Ok(BlockNumber::new(parse_hex_u64(&result)?))
    }

    async fn multicall(
        &self,
        block: BlockNumber,
        calls: &[Call],
        allow_failure: bool,
    ) -> Result<Vec<CallOutcome>, ChainError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            chain_id = %self.chain_id,
            block_number = %block,
            calls = calls.len(),
            "multicall"
        );

        let data = encode_aggregate3(calls, allow_failure);
        let result = self
            .request(
                "eth_call",
                serde_json::json!([
                    {
                        "to": format!("0x{}", hex::encode(MULTICALL3_ADDRESS.as_slice())),
                        "data": format!("0x{}", hex::encode(&data)),
                    },
                    block_tag(block),
                ]),
            )
            .await?;

        let outcomes = decode_aggregate3(&parse_hex_bytes(&result)?)?;
        if outcomes.len() != calls.len() {
            return Err(ChainError::Decode(format!(
                "multicall returned {} results for {} calls",
                outcomes.len(),
                calls.len()
            )));
        }
        if !allow_failure {
            if let Some(index) = outcomes.iter().position(|o| !o.success) {
                return Err(ChainError::CallReverted { index });
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::abi::IErc20;
    use alloy_primitives::{Bytes, U256};
    use alloy_sol_types::SolValue;

    #[test]
    fn test_block_tag_is_hex() {
        assert_eq!(block_tag(BlockNumber::new(255)), "0xff");
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_u64(&serde_json::json!("0x10")).unwrap(), 16);
        assert!(parse_hex_u64(&serde_json::json!(16)).is_err());
        assert!(parse_hex_u64(&serde_json::json!("0xzz")).is_err());
    }

    #[test]
    fn test_aggregate3_decode() {
        let supply = (U256::from(1000u64),).abi_encode_params();
        let results = vec![
            IMulticall3::CallResult {
                success: true,
                returnData: Bytes::from(supply.clone()),
            },
            IMulticall3::CallResult {
                success: false,
                returnData: Bytes::new(),
            },
        ];
        let encoded = (results,).abi_encode_params();

        let outcomes = decode_aggregate3(&encoded).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[0].return_data.as_ref(), supply.as_slice());
        assert!(!outcomes[1].success);
    }

    #[test]
    fn test_aggregate3_encode_carries_selector() {
        let call = Call::new(Address::repeat_byte(1), &IErc20::totalSupplyCall {});
        let data = encode_aggregate3(&[call], true);
        assert_eq!(&data[..4], IMulticall3::aggregate3Call::SELECTOR.as_slice());
    }
}
