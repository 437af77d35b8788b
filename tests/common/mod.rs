#![allow(dead_code)]

use alloy_sol_types::SolValue;
use std::sync::Arc;
use vaultledger::chain::abi::{IBeefyVault, IErc20};
use vaultledger::domain::{ProtocolType, VaultConfig};
use vaultledger::gate::{ContractGate, Denylist};
use vaultledger::orchestration::{
    ChainLanes, ClockScheduler, EventContext, Onboarder, OrchestratorSettings, TokenRegistry,
    Transfer,
};
use vaultledger::{
    Address, BlockNumber, BreakdownOrchestrator, ChainId, Decimal, EntityStore, MockChainClient,
    StaticMetadataSource, Timestamp, TransferProcessor, VaultCatalog, U256,
};

pub const CHAIN: ChainId = ChainId(10);
pub const VAULT: Address = Address::repeat_byte(0x10);
pub const STRATEGY: Address = Address::repeat_byte(0x12);
pub const USDC: Address = Address::repeat_byte(0x20);
pub const ALICE: Address = Address::repeat_byte(0xA1);
pub const BOB: Address = Address::repeat_byte(0xB0);
pub const CAROL: Address = Address::repeat_byte(0xC0);

pub struct Harness {
    pub store: Arc<dyn EntityStore>,
    pub orchestrator: Arc<BreakdownOrchestrator>,
    pub processor: TransferProcessor,
    pub scheduler: ClockScheduler,
}

pub fn harness(store: Arc<dyn EntityStore>, configs: Vec<VaultConfig>) -> Harness {
    let catalog = VaultCatalog::new(Arc::new(
        StaticMetadataSource::new().with_configs(CHAIN, configs),
    ));
    let tokens = TokenRegistry::new(store.clone());
    let gate = ContractGate::new(Arc::new(Denylist::empty()), store.clone());
    let lanes = ChainLanes::new();
    let orchestrator = Arc::new(BreakdownOrchestrator::new(
        store.clone(),
        catalog.clone(),
        tokens.clone(),
        OrchestratorSettings::default(),
    ));
    let onboarder = Onboarder::new(store.clone(), catalog, tokens, gate.clone());
    let processor = TransferProcessor::new(
        store.clone(),
        onboarder,
        orchestrator.clone(),
        lanes.clone(),
    );
    let scheduler = ClockScheduler::new(store.clone(), orchestrator.clone(), gate, lanes, 3600);
    Harness {
        store,
        orchestrator,
        processor,
        scheduler,
    }
}

/// Aave vault over USDC.
pub fn aave_config() -> VaultConfig {
    VaultConfig {
        id: "aave-usdc".to_string(),
        chain_id: CHAIN,
        vault_address: VAULT,
        strategy_address: STRATEGY,
        underlying_lp_address: USDC,
        protocol_type: ProtocolType::Aave,
        reward_pools: vec![],
        boosts: vec![],
        platform_id: "aave".to_string(),
        is_active: true,
    }
}

/// A vault with 18-decimal shares whose `want()` is `underlying`.
pub fn onboardable_vault(underlying: Address, underlying_decimals: u8) -> MockChainClient {
    MockChainClient::new(CHAIN)
        .with_return(VAULT, &IBeefyVault::wantCall {}, abi(underlying))
        .with_return(VAULT, &IBeefyVault::strategyCall {}, abi(STRATEGY))
        .with_return(VAULT, &IErc20::decimalsCall {}, abi(U256::from(18u8)))
        .with_return(underlying, &IErc20::decimalsCall {}, abi(U256::from(underlying_decimals)))
}

pub fn abi<T: SolValue>(value: T) -> Vec<u8> {
    (value,).abi_encode_params()
}

/// `whole * 10^decimals`.
pub fn units(whole: u64, decimals: u8) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(decimals))
}

pub fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

pub fn strings(values: &[Decimal]) -> Vec<String> {
    values.iter().map(|v| v.to_canonical_string()).collect()
}

pub fn at(contract: Address, block: u64, timestamp: u64) -> EventContext {
    EventContext {
        contract,
        block: BlockNumber(block),
        timestamp: Timestamp(timestamp),
        log_index: 0,
    }
}

pub fn transfer(from: Address, to: Address, value: U256) -> Transfer {
    Transfer { from, to, value }
}
