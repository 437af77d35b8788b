//! Token metadata onboarding.

use crate::breakdown::batch::ReadBatch;
use crate::breakdown::BreakdownError;
use crate::chain::abi::IErc20;
use crate::chain::ChainClient;
use crate::db::{EntityStore, StoreError};
use crate::domain::{Address, BlockNumber, ChainId, Token};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token metadata unavailable: {0}")]
    Read(#[from] BreakdownError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Token decimals and symbols, read once per token and kept in the store.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    store: Arc<dyn EntityStore>,
    known: Arc<DashMap<(ChainId, Address), Token>>,
}

impl TokenRegistry {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            known: Arc::new(DashMap::new()),
        }
    }

    /// Load the token, reading `decimals()` and `symbol()` on first sight.
    ///
    /// `decimals()` must succeed. Tokens with a non-string symbol get an empty one.
    pub async fn ensure(
        &self,
        client: &dyn ChainClient,
        block: BlockNumber,
        address: Address,
    ) -> Result<Token, TokenError> {
        let chain_id = client.chain_id();
        if let Some(token) = self.known.get(&(chain_id, address)) {
            return Ok(token.clone());
        }
        if let Some(token) = self.store.get_token(chain_id, &address).await? {
            self.known.insert((chain_id, address), token.clone());
            return Ok(token);
        }

        let mut batch = ReadBatch::new();
        let decimals = batch.push("token.decimals", address, IErc20::decimalsCall {});
        let symbol = batch.push("token.symbol", address, IErc20::symbolCall {});
        let results = batch.execute(client, block, true).await?;

        let token = Token::new(
            chain_id,
            address,
            results.required(&decimals)?._0,
            results.optional(&symbol).map(|s| s._0).unwrap_or_default(),
        );
        debug!(chain_id = %chain_id, token = %address, decimals = token.decimals, symbol = %token.symbol, "Onboarded token");
        self.store.save_token(&token).await?;
        self.known.insert((chain_id, address), token.clone());
        Ok(token)
    }
}
