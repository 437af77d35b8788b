mod common;

use alloy_primitives::B256;
use alloy_sol_types::SolValue;
use common::*;
use std::sync::Arc;
use vaultledger::chain::abi::{IBalancerPool, IBalancerVaultV2, IBeefyVault, IErc20};
use vaultledger::domain::{InvestorPositionBreakdown, ProtocolType, VaultConfig};
use vaultledger::orchestration::{EpisodeOutcome, EventOutcome};
use vaultledger::{Address, BlockNumber, EntityStore, MemoryStore, Timestamp, U256};

/// S = 1000 shares over U = 500 USDC.
fn usdc_vault() -> vaultledger::MockChainClient {
    onboardable_vault(USDC, 6)
        .with_return(VAULT, &IBeefyVault::totalSupplyCall {}, abi(units(1000, 18)))
        .with_return(VAULT, &IBeefyVault::balanceCall {}, abi(units(500, 6)))
}

#[tokio::test]
async fn test_transfer_moves_proportional_breakdown() {
    let h = harness(Arc::new(MemoryStore::new()), vec![aave_config()]);
    let client = usdc_vault();

    h.processor
        .handle_vault_transfer(&client, at(VAULT, 1, 1_000), transfer(Address::ZERO, ALICE, units(250, 18)))
        .await
        .unwrap();
    let alice = h.store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
    assert_eq!(strings(&alice.last_breakdown_balances), vec!["125"]);

    let outcome = h
        .processor
        .handle_vault_transfer(&client, at(VAULT, 2, 1_012), transfer(ALICE, BOB, units(100, 18)))
        .await
        .unwrap();
    let EventOutcome::Applied { episodes } = outcome else {
        panic!("expected the transfer to apply");
    };
    assert!(episodes.iter().all(EpisodeOutcome::is_persisted));

    let alice = h.store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
    let bob = h.store.get_position(CHAIN, &VAULT, &BOB).await.unwrap().unwrap();
    assert_eq!(strings(&alice.last_breakdown_balances), vec!["75"]);
    assert_eq!(strings(&bob.last_breakdown_balances), vec!["50"]);

    let vault = h.store.get_vault(CHAIN, &VAULT).await.unwrap().unwrap();
    assert_eq!(vault.breakdown_tokens_order, vec![USDC]);
    assert_eq!(vault.breakdown_tokens_order.len(), alice.last_breakdown_balances.len());
    assert_eq!(vault.last_breakdown_update_block, BlockNumber::new(2));

    // Alice accrued 125 USDC for the 12 seconds before the transfer.
    assert_eq!(strings(&alice.last_breakdown_time_weighted_balances), vec!["1500"]);
    assert_eq!(strings(&bob.last_breakdown_time_weighted_balances), vec!["0"]);
}

#[tokio::test]
async fn test_time_weighted_accumulates_between_clock_ticks() {
    let h = harness(Arc::new(MemoryStore::new()), vec![aave_config()]);
    let client = onboardable_vault(USDC, 6)
        .with_return(VAULT, &IBeefyVault::totalSupplyCall {}, abi(units(1000, 18)))
        .with_return_at(BlockNumber::new(1), VAULT, &IBeefyVault::balanceCall {}, abi(units(1000, 6)))
        .with_return_at(BlockNumber::new(2), VAULT, &IBeefyVault::balanceCall {}, abi(units(1500, 6)))
        .with_block(BlockNumber::new(2), Timestamp::new(1_900));

    h.processor
        .handle_vault_transfer(&client, at(VAULT, 1, 1_000), transfer(Address::ZERO, ALICE, units(100, 18)))
        .await
        .unwrap();
    let alice = h.store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
    assert_eq!(strings(&alice.last_breakdown_balances), vec!["100"]);
    assert_eq!(strings(&alice.last_breakdown_time_weighted_balances), vec!["0"]);

    h.orchestrator
        .refresh_vault(&client, VAULT, BlockNumber::new(2), Timestamp::new(1_900))
        .await
        .unwrap();
    let alice = h.store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
    assert_eq!(strings(&alice.last_breakdown_balances), vec!["150"]);
    assert_eq!(strings(&alice.last_breakdown_time_weighted_balances), vec!["90000"]);

    let history = h.store.list_position_breakdowns(&alice.id).await.unwrap();
    let blocks: Vec<u64> = history.iter().map(|b| b.block_number.as_u64()).collect();
    assert_eq!(blocks, vec![1, 2]);
}

#[tokio::test]
async fn test_allocation_conserves_vault_total() {
    let h = harness(Arc::new(MemoryStore::new()), vec![aave_config()]);
    let client = onboardable_vault(USDC, 6)
        .with_return(VAULT, &IBeefyVault::totalSupplyCall {}, abi(units(1000, 18)))
        .with_return(VAULT, &IBeefyVault::balanceCall {}, abi(U256::from(333_333_333u64)));

    for (investor, shares) in [(ALICE, 500), (BOB, 300), (CAROL, 200)] {
        h.processor
            .handle_vault_transfer(&client, at(VAULT, 1, 1_000), transfer(Address::ZERO, investor, units(shares, 18)))
            .await
            .unwrap();
    }
    h.orchestrator
        .refresh_vault(&client, VAULT, BlockNumber::new(2), Timestamp::new(2_000))
        .await
        .unwrap();

    let positions = h.store.list_positions_for_vault(CHAIN, &VAULT).await.unwrap();
    assert_eq!(positions.len(), 3);
    let total = positions
        .iter()
        .fold(d("0"), |acc, p| &acc + &p.last_breakdown_balances[0]);
    assert_eq!(total.to_canonical_string(), "333.333333");
    for p in &positions {
        assert_eq!(
            p.total_shares_balance(),
            &(p.direct_shares_balance() + p.reward_pool_shares_balance())
        );
    }
}

const POOL_LP: Address = Address::repeat_byte(0x30);
const BALANCER_VAULT: Address = Address::repeat_byte(0x31);
const WETH: Address = Address::repeat_byte(0x32);
const WSTETH: Address = Address::repeat_byte(0x33);
const RETH: Address = Address::repeat_byte(0x34);

fn aura_config() -> VaultConfig {
    VaultConfig {
        underlying_lp_address: POOL_LP,
        protocol_type: ProtocolType::BalancerAura,
        platform_id: "aura".to_string(),
        ..aave_config()
    }
}

#[tokio::test]
async fn test_token_set_growth_resets_time_weighted() {
    let h = harness(Arc::new(MemoryStore::new()), vec![aura_config()]);
    let client = onboardable_vault(POOL_LP, 18)
        .with_return(VAULT, &IBeefyVault::totalSupplyCall {}, abi(units(100, 18)))
        .with_return(VAULT, &IBeefyVault::balanceCall {}, abi(units(10, 18)))
        .with_return(POOL_LP, &IBalancerPool::getVaultCall {}, abi(BALANCER_VAULT))
        .with_return(POOL_LP, &IBalancerPool::getPoolIdCall {}, abi(B256::ZERO))
        .with_return(POOL_LP, &IBalancerPool::getActualSupplyCall {}, abi(units(100, 18)))
        .with_return(WETH, &IErc20::decimalsCall {}, abi(U256::from(18u8)))
        .with_return(WSTETH, &IErc20::decimalsCall {}, abi(U256::from(18u8)))
        .with_return(RETH, &IErc20::decimalsCall {}, abi(U256::from(18u8)))
        .with_return_at(
            BlockNumber::new(1),
            BALANCER_VAULT,
            &IBalancerVaultV2::getPoolTokensCall { poolId: B256::ZERO },
            (vec![WETH, WSTETH], vec![units(50, 18), units(50, 18)], U256::ZERO).abi_encode_params(),
        )
        .with_return_at(
            BlockNumber::new(2),
            BALANCER_VAULT,
            &IBalancerVaultV2::getPoolTokensCall { poolId: B256::ZERO },
            (
                vec![WETH, WSTETH, RETH],
                vec![units(50, 18), units(50, 18), units(30, 18)],
                U256::ZERO,
            )
                .abi_encode_params(),
        );

    h.processor
        .handle_vault_transfer(&client, at(VAULT, 1, 1_000), transfer(Address::ZERO, ALICE, units(50, 18)))
        .await
        .unwrap();
    let alice = h.store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
    assert_eq!(strings(&alice.last_breakdown_balances), vec!["2.5", "2.5"]);

    let outcome = h
        .orchestrator
        .refresh_vault(&client, VAULT, BlockNumber::new(2), Timestamp::new(4_600))
        .await
        .unwrap();
    assert!(matches!(outcome, EpisodeOutcome::Persisted { positions: 1, resets: 1 }));

    let alice = h.store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
    assert_eq!(strings(&alice.last_breakdown_balances), vec!["2.5", "2.5", "1.5"]);
    assert_eq!(strings(&alice.last_breakdown_time_weighted_balances), vec!["0", "0", "0"]);

    let vault = h.store.get_vault(CHAIN, &VAULT).await.unwrap().unwrap();
    assert_eq!(vault.breakdown_tokens_order, vec![WETH, WSTETH, RETH]);
}

#[tokio::test]
async fn test_zero_supply_keeps_last_snapshot() {
    let h = harness(Arc::new(MemoryStore::new()), vec![aave_config()]);
    let client = onboardable_vault(USDC, 6)
        .with_return_at(BlockNumber::new(1), VAULT, &IBeefyVault::totalSupplyCall {}, abi(units(1000, 18)))
        .with_return_at(BlockNumber::new(2), VAULT, &IBeefyVault::totalSupplyCall {}, abi(U256::ZERO))
        .with_return(VAULT, &IBeefyVault::balanceCall {}, abi(units(500, 6)));

    h.processor
        .handle_vault_transfer(&client, at(VAULT, 1, 1_000), transfer(Address::ZERO, ALICE, units(250, 18)))
        .await
        .unwrap();
    let before = h.store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();

    let outcome = h
        .orchestrator
        .refresh_vault(&client, VAULT, BlockNumber::new(2), Timestamp::new(2_000))
        .await
        .unwrap();
    assert!(matches!(outcome, EpisodeOutcome::Skipped(_)));

    let after = h.store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
    assert_eq!(before, after);
    let id = InvestorPositionBreakdown::id_for(&after.id, BlockNumber::new(2));
    let history = h.store.list_position_breakdowns(&after.id).await.unwrap();
    assert!(history.iter().all(|b| b.id != id));
}

#[tokio::test]
async fn test_unavailable_breakdown_fails_episode_without_writes() {
    let h = harness(Arc::new(MemoryStore::new()), vec![aave_config()]);
    let client = usdc_vault();
    h.processor
        .handle_vault_transfer(&client, at(VAULT, 1, 1_000), transfer(Address::ZERO, ALICE, units(250, 18)))
        .await
        .unwrap();

    let broken = onboardable_vault(USDC, 6)
        .with_return(VAULT, &IBeefyVault::totalSupplyCall {}, abi(units(1000, 18)));
    let outcome = h
        .orchestrator
        .refresh_vault(&broken, VAULT, BlockNumber::new(2), Timestamp::new(2_000))
        .await
        .unwrap();
    assert!(matches!(outcome, EpisodeOutcome::Failed(_)));

    let vault = h.store.get_vault(CHAIN, &VAULT).await.unwrap().unwrap();
    assert_eq!(vault.last_breakdown_update_block, BlockNumber::new(1));
}
