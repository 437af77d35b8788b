//! Contract read interfaces used by onboarding, detection and breakdown strategies.

#![allow(missing_docs)]

use alloy_sol_types::sol;

sol! {
    interface IErc20 {
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }

    interface IBeefyVault {
        function balance() external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function want() external view returns (address);
        function token() external view returns (address);
        function strategy() external view returns (address);
    }

    /// Reward pools and boosts both expose the staked vault share token.
    interface IRewardPool {
        function stakedToken() external view returns (address);
    }

    interface IErc4626 {
        function asset() external view returns (address);
        function totalAssets() external view returns (uint256);
    }

    interface IContractRole {
        function vault() external view returns (address);
        function strategy() external view returns (address);
        function rewardToken() external view returns (address);
    }

    interface IVaultFactory {
        function cloneVault() external returns (address);
        function cloneContract(address implementation) external returns (address);
        function booooost(address mooToken, address rewardToken, uint256 duration_in_sec) external;
    }

    interface IBalancerPool {
        function getVault() external view returns (address);
        function getPoolId() external view returns (bytes32);
        function getActualSupply() external view returns (uint256);
    }

    interface IBalancerVaultV2 {
        function getPoolTokens(bytes32 poolId)
            external
            view
            returns (address[] tokens, uint256[] balances, uint256 lastChangeBlock);
    }

    interface IBalancerStrategy {
        function balancerVault() external view returns (address);
    }

    interface IBalancerVaultV3 {
        struct TokenInfo {
            uint8 tokenType;
            address rateProvider;
            bool paysYieldFees;
        }

        function getPoolTokenInfo(address pool)
            external
            view
            returns (
                address[] tokens,
                TokenInfo[] tokenInfo,
                uint256[] balancesRaw,
                uint256[] lastBalancesLiveScaled18
            );
    }

    interface ICurvePool {
        function coins(uint256 i) external view returns (address);
        function balances(uint256 i) external view returns (uint256);
    }

    interface ISolidlyPool {
        function metadata()
            external
            view
            returns (uint256 dec0, uint256 dec1, uint256 r0, uint256 r1, bool st, address t0, address t1);
    }

    interface IPairTokens {
        function token0() external view returns (address);
        function token1() external view returns (address);
    }

    /// Also implemented by ICHI vaults.
    interface IGammaHypervisor {
        function getTotalAmounts() external view returns (uint256 total0, uint256 total1);
    }

    interface IClmManager {
        function balances() external view returns (uint256 amount0, uint256 amount1);
        function wants() external view returns (address token0, address token1);
    }

    interface IClmStrategy {
        function range() external view returns (uint256 lowerPrice, uint256 upperPrice);
        function price() external view returns (uint256 currentPrice);
    }

    interface IPendleMarket {
        struct MarketState {
            int256 totalPt;
            int256 totalSy;
            int256 totalLp;
            address treasury;
            int256 scalarRoot;
            uint256 expiry;
            uint256 lnFeeRateRoot;
            uint256 reserveFeePercent;
            uint256 lastLnImpliedRate;
        }

        function readTokens() external view returns (address sy, address pt, address yt);
        function readState(address router) external view returns (MarketState market);
    }

    interface IPendleSy {
        function yieldToken() external view returns (address);
    }

    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct CallResult {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calls) external payable returns (CallResult[] returnData);
    }
}
