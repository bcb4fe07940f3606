//! Lending pool reads: account health, reserve balances, oracle prices.
//!
//! Position snapshots are assembled fresh for every evaluation. Health
//! factors are block-sensitive, so nothing here is cached except immutable
//! reserve configuration (decimals, liquidation bonus).

use crate::client::ChainClient;
use crate::error::ChainError;
use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

sol! {
    #[sol(rpc)]
    interface IPool {
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
    }

    #[sol(rpc)]
    interface IPoolDataProvider {
        function getUserReserveData(address asset, address user) external view returns (
            uint256 currentATokenBalance,
            uint256 currentStableDebt,
            uint256 currentVariableDebt,
            uint256 principalStableDebt,
            uint256 scaledVariableDebt,
            uint256 stableBorrowRate,
            uint256 liquidityRate,
            uint40 stableRateLastUpdated,
            bool usageAsCollateralEnabled
        );

        function getReserveConfigurationData(address asset) external view returns (
            uint256 decimals,
            uint256 ltv,
            uint256 liquidationThreshold,
            uint256 liquidationBonus,
            uint256 reserveFactor,
            bool usageAsCollateralEnabled,
            bool borrowingEnabled,
            bool stableBorrowRateEnabled,
            bool isActive,
            bool isFrozen
        );
    }

    #[sol(rpc)]
    interface IPriceOracleGetter {
        function getAssetPrice(address asset) external view returns (uint256);
    }
}

/// Oracle price decimals (base-asset prices are USD with 8 decimals).
pub const PRICE_DECIMALS: u8 = 8;

/// Account-level totals from `getUserAccountData`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountData {
    /// Total collateral in base-currency units (8 decimals).
    pub total_collateral_base: U256,
    /// Total debt in base-currency units (8 decimals).
    pub total_debt_base: U256,
    /// Health factor in WAD (1e18 = 1.0).
    pub health_factor_wad: U256,
}

/// Immutable per-reserve configuration.
#[derive(Debug, Clone, Copy)]
pub struct ReserveConfig {
    pub decimals: u8,
    /// Liquidation bonus in basis points over par (e.g. 10500 = 5% bonus).
    pub liquidation_bonus_bps: u32,
    pub usage_as_collateral_enabled: bool,
    pub is_active: bool,
}

/// One reserve of a borrower: balance, oracle price, and USD valuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveSnapshot {
    pub asset: Address,
    /// Raw balance in token base units.
    pub amount: U256,
    /// Oracle price, 8 decimals.
    pub price: U256,
    pub decimals: u8,
    /// Liquidation bonus of the reserve (relevant on the collateral side).
    pub liquidation_bonus_bps: u32,
    pub value_usd: f64,
}

/// A borrower's position, read fresh from the pool.
#[derive(Debug, Clone)]
pub struct BorrowerPosition {
    pub borrower: Address,
    pub health_factor_wad: U256,
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub collaterals: SmallVec<[ReserveSnapshot; 4]>,
    pub debts: SmallVec<[ReserveSnapshot; 4]>,
}

impl BorrowerPosition {
    /// Health factor as f64, for thresholds and logging. A debt-free
    /// account reports the pool's MAX sentinel; clamp to a large finite
    /// value.
    pub fn health_factor(&self) -> f64 {
        if self.health_factor_wad > U256::from(u128::MAX) {
            return f64::MAX;
        }
        let wad: u128 = self.health_factor_wad.to();
        wad as f64 / 1e18
    }

    /// Largest collateral reserve by USD value.
    pub fn largest_collateral(&self) -> Option<&ReserveSnapshot> {
        self.collaterals
            .iter()
            .max_by(|a, b| a.value_usd.total_cmp(&b.value_usd))
    }

    /// Largest debt reserve by USD value.
    pub fn largest_debt(&self) -> Option<&ReserveSnapshot> {
        self.debts
            .iter()
            .max_by(|a, b| a.value_usd.total_cmp(&b.value_usd))
    }
}

/// USD value of a base-unit amount at an 8-decimal oracle price.
pub fn usd_value(amount: U256, price: U256, decimals: u8) -> f64 {
    if amount.is_zero() || price.is_zero() {
        return 0.0;
    }
    let scaled = amount * price;
    let divisor = U256::from(10u64).pow(U256::from(decimals as u64 + PRICE_DECIMALS as u64));
    let whole: u128 = (scaled / divisor).try_into().unwrap_or(u128::MAX);
    let frac: u128 = ((scaled % divisor) * U256::from(1_000_000u64) / divisor)
        .try_into()
        .unwrap_or(0);
    whole as f64 + frac as f64 / 1e6
}

/// Read-side wrapper over the lending pool, its protocol data provider, and
/// the base-currency price oracle.
#[derive(Debug)]
pub struct LendingPool {
    chain: Arc<ChainClient>,
    pool: Address,
    data_provider: Address,
    price_oracle: Address,
    /// Reserve configuration cache (decimals/bonus are immutable).
    config_cache: DashMap<Address, ReserveConfig>,
}

impl LendingPool {
    pub fn new(
        chain: Arc<ChainClient>,
        pool: Address,
        data_provider: Address,
        price_oracle: Address,
    ) -> Self {
        Self {
            chain,
            pool,
            data_provider,
            price_oracle,
            config_cache: DashMap::new(),
        }
    }

    /// The pool contract address.
    pub fn pool_address(&self) -> Address {
        self.pool
    }

    fn provider(&self) -> Result<impl alloy::providers::Provider, ChainError> {
        Ok(ProviderBuilder::new().on_http(
            self.chain
                .rpc_url()
                .parse()
                .map_err(|_| ChainError::InvalidUrl(self.chain.rpc_url().to_string()))?,
        ))
    }

    /// Fetch account-level health data for a borrower.
    pub async fn account_data(&self, borrower: Address) -> Result<AccountData, ChainError> {
        let provider = self.provider()?;
        let pool = IPool::new(self.pool, &provider);

        let data = pool
            .getUserAccountData(borrower)
            .call()
            .await
            .map_err(|e| ChainError::ContractCall(format!("getUserAccountData({borrower}): {e}")))?;

        Ok(AccountData {
            total_collateral_base: data.totalCollateralBase,
            total_debt_base: data.totalDebtBase,
            health_factor_wad: data.healthFactor,
        })
    }

    /// Fetch the oracle price of an asset (8 decimals, base currency USD).
    pub async fn asset_price(&self, asset: Address) -> Result<U256, ChainError> {
        let provider = self.provider()?;
        let oracle = IPriceOracleGetter::new(self.price_oracle, &provider);
        let price = oracle
            .getAssetPrice(asset)
            .call()
            .await
            .map_err(|e| ChainError::ContractCall(format!("getAssetPrice({asset}): {e}")))?;
        Ok(price._0)
    }

    /// Fetch reserve configuration, cached after first read.
    pub async fn reserve_config(&self, asset: Address) -> Result<ReserveConfig, ChainError> {
        if let Some(cached) = self.config_cache.get(&asset) {
            return Ok(*cached);
        }

        let provider = self.provider()?;
        let data_provider = IPoolDataProvider::new(self.data_provider, &provider);
        let config = data_provider
            .getReserveConfigurationData(asset)
            .call()
            .await
            .map_err(|e| {
                ChainError::ContractCall(format!("getReserveConfigurationData({asset}): {e}"))
            })?;

        let resolved = ReserveConfig {
            decimals: config.decimals.to::<u8>(),
            liquidation_bonus_bps: config.liquidationBonus.to::<u32>(),
            usage_as_collateral_enabled: config.usageAsCollateralEnabled,
            is_active: config.isActive,
        };
        self.config_cache.insert(asset, resolved);
        Ok(resolved)
    }

    /// Assemble a fresh position snapshot across the given reserve list.
    ///
    /// Reserves are walked sequentially (shared RPC endpoint is
    /// rate-limited); only the independent reads for a single reserve of the
    /// same borrower run joined.
    pub async fn snapshot(
        &self,
        borrower: Address,
        reserves: &[Address],
    ) -> Result<BorrowerPosition, ChainError> {
        let account = self.account_data(borrower).await?;

        let mut collaterals: SmallVec<[ReserveSnapshot; 4]> = SmallVec::new();
        let mut debts: SmallVec<[ReserveSnapshot; 4]> = SmallVec::new();

        for &asset in reserves {
            let config = self.reserve_config(asset).await?;
            if !config.is_active {
                continue;
            }

            let provider = self.provider()?;
            let data_provider = IPoolDataProvider::new(self.data_provider, &provider);
            let oracle = IPriceOracleGetter::new(self.price_oracle, &provider);

            let reserve_call = data_provider.getUserReserveData(asset, borrower);
            let price_call = oracle.getAssetPrice(asset);
            let (reserve, price) = tokio::join!(reserve_call.call(), price_call.call());

            let reserve = reserve.map_err(|e| {
                ChainError::ContractCall(format!("getUserReserveData({asset}, {borrower}): {e}"))
            })?;
            let price = price
                .map_err(|e| ChainError::ContractCall(format!("getAssetPrice({asset}): {e}")))?
                ._0;

            let collateral_balance = reserve.currentATokenBalance;
            if !collateral_balance.is_zero()
                && reserve.usageAsCollateralEnabled
                && config.usage_as_collateral_enabled
            {
                collaterals.push(ReserveSnapshot {
                    asset,
                    amount: collateral_balance,
                    price,
                    decimals: config.decimals,
                    liquidation_bonus_bps: config.liquidation_bonus_bps,
                    value_usd: usd_value(collateral_balance, price, config.decimals),
                });
            }

            let debt_balance = reserve.currentStableDebt + reserve.currentVariableDebt;
            if !debt_balance.is_zero() {
                debts.push(ReserveSnapshot {
                    asset,
                    amount: debt_balance,
                    price,
                    decimals: config.decimals,
                    liquidation_bonus_bps: config.liquidation_bonus_bps,
                    value_usd: usd_value(debt_balance, price, config.decimals),
                });
            }
        }

        debug!(
            borrower = %borrower,
            hf = %account.health_factor_wad,
            collateral_reserves = collaterals.len(),
            debt_reserves = debts.len(),
            "Position snapshot assembled"
        );

        Ok(BorrowerPosition {
            borrower,
            health_factor_wad: account.health_factor_wad,
            total_collateral_base: account.total_collateral_base,
            total_debt_base: account.total_debt_base,
            collaterals,
            debts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn snapshot(asset: Address, value_usd: f64) -> ReserveSnapshot {
        ReserveSnapshot {
            asset,
            amount: U256::from(1u64),
            price: U256::from(100_000_000u64),
            decimals: 18,
            liquidation_bonus_bps: 10500,
            value_usd,
        }
    }

    #[test]
    fn test_usd_value() {
        // 1000 USDC (6 decimals) at $1.00
        let value = usd_value(
            U256::from(1_000_000_000u64),
            U256::from(100_000_000u64),
            6,
        );
        assert!((value - 1000.0).abs() < 1e-6);

        // 1.5 ETH (18 decimals) at $2000
        let value = usd_value(
            U256::from(1_500_000_000_000_000_000u128),
            U256::from(200_000_000_000u64),
            18,
        );
        assert!((value - 3000.0).abs() < 1e-6);

        assert_eq!(usd_value(U256::ZERO, U256::from(1u64), 18), 0.0);
    }

    #[test]
    fn test_health_factor_conversion() {
        let position = BorrowerPosition {
            borrower: Address::ZERO,
            health_factor_wad: U256::from(950_000_000_000_000_000u128), // 0.95
            total_collateral_base: U256::ZERO,
            total_debt_base: U256::ZERO,
            collaterals: smallvec![],
            debts: smallvec![],
        };
        assert!((position.health_factor() - 0.95).abs() < 1e-9);

        let debt_free = BorrowerPosition {
            health_factor_wad: U256::MAX,
            ..position
        };
        assert_eq!(debt_free.health_factor(), f64::MAX);
    }

    #[test]
    fn test_largest_reserve_selection() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let position = BorrowerPosition {
            borrower: Address::ZERO,
            health_factor_wad: U256::ZERO,
            total_collateral_base: U256::ZERO,
            total_debt_base: U256::ZERO,
            collaterals: smallvec![snapshot(a, 50.0), snapshot(b, 200.0)],
            debts: smallvec![snapshot(a, 150.0)],
        };

        assert_eq!(position.largest_collateral().unwrap().asset, b);
        assert_eq!(position.largest_debt().unwrap().asset, a);
    }
}
