//! Mock chain client for testing without network calls.

use super::{Call, CallOutcome, ChainClient, ChainError};
use crate::domain::{BlockNumber, ChainId, Timestamp};
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

type ResponseKey = (Option<BlockNumber>, Address, Bytes);

/// Mock chain client that answers reads from registered responses.
///
/// Responses registered without a block apply to every block; block-specific ones take
/// precedence. Calls with no registered response revert.
#[derive(Debug)]
pub struct MockChainClient {
    chain_id: ChainId,
    responses: RwLock<HashMap<ResponseKey, Option<Bytes>>>,
    timestamps: RwLock<HashMap<BlockNumber, Timestamp>>,
    latest: RwLock<BlockNumber>,
    latency: Option<Duration>,
    multicalls: AtomicUsize,
}

impl MockChainClient {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            responses: RwLock::new(HashMap::new()),
            timestamps: RwLock::new(HashMap::new()),
            latest: RwLock::new(BlockNumber::default()),
            latency: None,
            multicalls: AtomicUsize::new(0),
        }
    }

    /// Register a block and its timestamp.
    pub fn with_block(self, block: BlockNumber, timestamp: Timestamp) -> Self {
        self.set_block(block, timestamp);
        self
    }

    /// Return ABI-encoded `return_data` for `call` on `target` at every block.
    pub fn with_return<C: SolCall>(self, target: Address, call: &C, return_data: Vec<u8>) -> Self {
        self.set_return(None, target, call, return_data);
        self
    }

    /// Return ABI-encoded `return_data` for `call` on `target` at one block only.
    pub fn with_return_at<C: SolCall>(
        self,
        block: BlockNumber,
        target: Address,
        call: &C,
        return_data: Vec<u8>,
    ) -> Self {
        self.set_return(Some(block), target, call, return_data);
        self
    }

    /// Make `call` on `target` revert at every block.
    pub fn with_revert<C: SolCall>(self, target: Address, call: &C) -> Self {
        self.write_response((None, target, Bytes::from(call.abi_encode())), None);
        self
    }

    /// Delay every multicall, used to exercise resolver timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_block(&self, block: BlockNumber, timestamp: Timestamp) {
        let mut timestamps = self.timestamps.write().unwrap_or_else(|e| e.into_inner());
        timestamps.insert(block, timestamp);
        let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
        if block > *latest {
            *latest = block;
        }
    }

    pub fn set_return<C: SolCall>(
        &self,
        block: Option<BlockNumber>,
        target: Address,
        call: &C,
        return_data: Vec<u8>,
    ) {
        self.write_response(
            (block, target, Bytes::from(call.abi_encode())),
            Some(Bytes::from(return_data)),
        );
    }

    /// Number of multicall batches served so far.
    pub fn multicall_count(&self) -> usize {
        self.multicalls.load(Ordering::SeqCst)
    }

    fn write_response(&self, key: ResponseKey, value: Option<Bytes>) {
        let mut responses = self.responses.write().unwrap_or_else(|e| e.into_inner());
        responses.insert(key, value);
    }

    fn lookup(&self, block: BlockNumber, call: &Call) -> CallOutcome {
        let responses = self.responses.read().unwrap_or_else(|e| e.into_inner());
        let exact = responses.get(&(Some(block), call.target, call.calldata.clone()));
        let any = responses.get(&(None, call.target, call.calldata.clone()));
        match exact.or(any) {
            Some(Some(data)) => CallOutcome::ok(data.clone()),
            _ => CallOutcome::reverted(),
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn block_timestamp(&self, block: BlockNumber) -> Result<Timestamp, ChainError> {
        let timestamps = self.timestamps.read().unwrap_or_else(|e| e.into_inner());
        timestamps
            .get(&block)
            .copied()
            .ok_or(ChainError::BlockNotFound(block))
    }

    async fn latest_block_number(&self) -> Result<BlockNumber, ChainError> {
        Ok(*self.latest.read().unwrap_or_else(|e| e.into_inner()))
    }

    async fn multicall(
        &self,
        block: BlockNumber,
        calls: &[Call],
        allow_failure: bool,
    ) -> Result<Vec<CallOutcome>, ChainError> {
        self.multicalls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let outcomes: Vec<CallOutcome> = calls.iter().map(|c| self.lookup(block, c)).collect();
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
    use alloy_primitives::U256;
    use alloy_sol_types::SolValue;

    fn token() -> Address {
        Address::repeat_byte(0x42)
    }

    #[tokio::test]
    async fn test_mock_returns_registered_data() {
        let mock = MockChainClient::new(ChainId::new(1)).with_return(
            token(),
            &IErc20::totalSupplyCall {},
            (U256::from(7u64),).abi_encode_params(),
        );
        let calls = [Call::new(token(), &IErc20::totalSupplyCall {})];
        let out = mock.multicall(BlockNumber::new(1), &calls, false).await.unwrap();
        let decoded = IErc20::totalSupplyCall::abi_decode_returns(&out[0].return_data, true).unwrap();
        assert_eq!(decoded._0, U256::from(7u64));
        assert_eq!(mock.multicall_count(), 1);
    }

    #[tokio::test]
    async fn test_block_specific_response_wins() {
        let mock = MockChainClient::new(ChainId::new(1))
            .with_return(
                token(),
                &IErc20::totalSupplyCall {},
                (U256::from(1u64),).abi_encode_params(),
            )
            .with_return_at(
                BlockNumber::new(5),
                token(),
                &IErc20::totalSupplyCall {},
                (U256::from(5u64),).abi_encode_params(),
            );
        let calls = [Call::new(token(), &IErc20::totalSupplyCall {})];

        let at5 = mock.multicall(BlockNumber::new(5), &calls, false).await.unwrap();
        let at6 = mock.multicall(BlockNumber::new(6), &calls, false).await.unwrap();
        let v5 = IErc20::totalSupplyCall::abi_decode_returns(&at5[0].return_data, true).unwrap();
        let v6 = IErc20::totalSupplyCall::abi_decode_returns(&at6[0].return_data, true).unwrap();
        assert_eq!(v5._0, U256::from(5u64));
        assert_eq!(v6._0, U256::from(1u64));
    }

    #[tokio::test]
    async fn test_unregistered_call_reverts() {
        let mock = MockChainClient::new(ChainId::new(1));
        let calls = [Call::new(token(), &IErc20::decimalsCall {})];

        let partial = mock.multicall(BlockNumber::new(1), &calls, true).await.unwrap();
        assert!(!partial[0].success);

        let strict = mock.multicall(BlockNumber::new(1), &calls, false).await;
        assert!(matches!(strict, Err(ChainError::CallReverted { index: 0 })));
    }

    #[tokio::test]
    async fn test_block_timestamps() {
        let mock = MockChainClient::new(ChainId::new(1))
            .with_block(BlockNumber::new(10), Timestamp::new(1000));
        assert_eq!(
            mock.block_timestamp(BlockNumber::new(10)).await.unwrap(),
            Timestamp::new(1000)
        );
        assert_eq!(mock.latest_block_number().await.unwrap(), BlockNumber::new(10));
        assert!(mock.block_timestamp(BlockNumber::new(11)).await.is_err());
    }
}
