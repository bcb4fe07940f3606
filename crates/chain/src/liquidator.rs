//! Flash liquidator contract interfaces.
//!
//! Two deployed variants share one call surface: the flash-mint liquidator
//! mints the repay asset for the duration of the transaction, the
//! flash-loan liquidator borrows it from the pool. Either way the entry
//! point takes the position coordinates plus the aggregator swap route and
//! settles atomically or reverts.

use crate::error::ChainError;
use crate::sender::{TransactionSender, TxConfirmation};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use std::sync::Arc;
use tracing::{debug, info};

sol! {
    /// Shared entry point of both liquidator variants.
    interface ILiquidator {
        function executeLiquidation(
            address borrower,
            address collateralAsset,
            address debtAsset,
            uint256 debtToCover,
            address swapRouter,
            bytes calldata swapCalldata
        ) external returns (uint256 collateralReceived);

        function setProxyContract(address token, address proxy) external;
    }
}

/// How the liquidator contract sources the repay capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FundingMode {
    /// Flash-mint the debt token (stablecoin issuers); no premium.
    #[default]
    FlashMint,
    /// Flash-loan the debt token from the pool; pays the pool premium.
    FlashLoan,
}

impl FundingMode {
    /// Flash premium charged by the funding source, in basis points.
    pub fn default_premium_bps(&self) -> u32 {
        match self {
            Self::FlashMint => 0,
            Self::FlashLoan => 9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashMint => "flash-mint",
            Self::FlashLoan => "flash-loan",
        }
    }
}

/// A deployed liquidator contract bound to a funding mode and a sender.
#[derive(Debug)]
pub struct LiquidatorContract {
    address: Address,
    mode: FundingMode,
    sender: Arc<TransactionSender>,
}

impl LiquidatorContract {
    pub fn new(address: Address, mode: FundingMode, sender: Arc<TransactionSender>) -> Self {
        Self {
            address,
            mode,
            sender,
        }
    }

    /// Contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Funding mode of this variant.
    pub fn mode(&self) -> FundingMode {
        self.mode
    }

    /// Encode the liquidation entry-point calldata.
    pub fn encode_liquidation(
        borrower: Address,
        collateral_asset: Address,
        debt_asset: Address,
        debt_to_cover: U256,
        swap_router: Address,
        swap_calldata: Bytes,
    ) -> Bytes {
        let call = ILiquidator::executeLiquidationCall {
            borrower,
            collateralAsset: collateral_asset,
            debtAsset: debt_asset,
            debtToCover: debt_to_cover,
            swapRouter: swap_router,
            swapCalldata: swap_calldata,
        };
        Bytes::from(call.abi_encode())
    }

    /// Submit the liquidation and wait for confirmation.
    pub async fn execute_liquidation(
        &self,
        borrower: Address,
        collateral_asset: Address,
        debt_asset: Address,
        debt_to_cover: U256,
        swap_router: Address,
        swap_calldata: Bytes,
    ) -> Result<TxConfirmation, ChainError> {
        let calldata = Self::encode_liquidation(
            borrower,
            collateral_asset,
            debt_asset,
            debt_to_cover,
            swap_router,
            swap_calldata,
        );

        info!(
            borrower = %borrower,
            collateral = %collateral_asset,
            debt = %debt_asset,
            debt_to_cover = %debt_to_cover,
            mode = self.mode.as_str(),
            contract = %self.address,
            "Submitting liquidation"
        );

        self.sender.send(self.address, calldata, U256::ZERO).await
    }

    /// Register a proxy contract for a wrapped/rebasing token.
    pub async fn set_proxy_contract(
        &self,
        token: Address,
        proxy: Address,
    ) -> Result<TxConfirmation, ChainError> {
        let call = ILiquidator::setProxyContractCall { token, proxy };
        debug!(token = %token, proxy = %proxy, "Setting proxy contract");
        self.sender
            .send(self.address, Bytes::from(call.abi_encode()), U256::ZERO)
            .await
    }
}
