//! Chain client abstraction for block-pinned contract reads.
//!
//! Every read the ledger performs goes through [`ChainClient::multicall`], pinned to an
//! exact block so that results are reproducible for that block.

use crate::domain::{BlockNumber, ChainId, Timestamp};
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod abi;
pub mod mock;
pub mod rpc;

pub use mock::MockChainClient;
pub use rpc::JsonRpcChainClient;

/// One contract read in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    pub target: Address,
    pub calldata: Bytes,
}

impl Call {
    pub fn new<C: SolCall>(target: Address, call: &C) -> Self {
        Self {
            target,
            calldata: Bytes::from(call.abi_encode()),
        }
    }
}

/// Per-call result of a batch. `success == false` means the call reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub success: bool,
    pub return_data: Bytes,
}

impl CallOutcome {
    pub fn ok(return_data: impl Into<Bytes>) -> Self {
        Self {
            success: true,
            return_data: return_data.into(),
        }
    }

    pub fn reverted() -> Self {
        Self {
            success: false,
            return_data: Bytes::new(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("call {index} reverted in a batch that disallows failures")]
    CallReverted { index: usize },
    #[error("block {0} not found")]
    BlockNotFound(BlockNumber),
}

/// Read-only access to one chain.
///
/// Implementations own their retry policy; callers treat any error as "unavailable for
/// this block".
#[async_trait]
pub trait ChainClient: Send + Sync + fmt::Debug {
    fn chain_id(&self) -> ChainId;

    /// Timestamp of the given block.
    async fn block_timestamp(&self, block: BlockNumber) -> Result<Timestamp, ChainError>;

    /// Most recent block number known to the node.
    async fn latest_block_number(&self) -> Result<BlockNumber, ChainError>;

    /// Execute a batch of reads at `block`.
    ///
    /// With `allow_failure == false` any reverted call fails the whole batch with
    /// [`ChainError::CallReverted`]. With `allow_failure == true` the outcome vector has
    /// one entry per call, in order.
    async fn multicall(
        &self,
        block: BlockNumber,
        calls: &[Call],
        allow_failure: bool,
    ) -> Result<Vec<CallOutcome>, ChainError>;
}
