//! Chains the ledger knows how to index.

use super::primitives::ChainId;
use rust_decimal::Decimal as BlockTime;

/// Static facts about a supported chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    pub chain_id: ChainId,
    /// Chain name as used by the vault catalog API.
    pub slug: &'static str,
    /// Average block time in seconds.
    pub average_block_time: BlockTime,
}

const KNOWN_CHAINS: &[(u64, &str, i64, u32)] = &[
    (1, "ethereum", 12, 0),
    (10, "optimism", 2, 0),
    (56, "bsc", 3, 0),
    (146, "sonic", 1, 0),
    (999, "hyperevm", 2, 0),
    (8453, "base", 2, 0),
    (34443, "mode", 2, 0),
    (42161, "arbitrum", 25, 2),
    (59144, "linea", 2, 0),
];

/// Look up a supported chain.
pub fn chain_info(chain_id: ChainId) -> Option<ChainInfo> {
    KNOWN_CHAINS
        .iter()
        .find(|(id, ..)| *id == chain_id.as_u64())
        .map(|&(id, slug, mantissa, scale)| ChainInfo {
            chain_id: ChainId::new(id),
            slug,
            average_block_time: BlockTime::new(mantissa, scale),
        })
}

pub fn supported_chain_ids() -> Vec<ChainId> {
    KNOWN_CHAINS.iter().map(|(id, ..)| ChainId::new(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_times() {
        let arbitrum = chain_info(ChainId::new(42161)).unwrap();
        assert_eq!(arbitrum.slug, "arbitrum");
        assert_eq!(arbitrum.average_block_time, BlockTime::new(25, 2));
        assert_eq!(
            chain_info(ChainId::new(1)).unwrap().average_block_time,
            BlockTime::from(12)
        );
    }

    #[test]
    fn test_unknown_chain() {
        assert!(chain_info(ChainId::new(250)).is_none());
        assert_eq!(supported_chain_ids().len(), 9);
    }
}
