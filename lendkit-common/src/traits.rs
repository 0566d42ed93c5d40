use async_trait::async_trait;

use crate::{
    flash_loan::{FlashLoanQuotation, FlashLoanRequest},
    models::{asset::FungibleAsset, error::ServiceError, Address, Chain, ProtocolId},
    operation::Operation,
    portfolio::Portfolio,
    protocol::{
        BorrowParams, Market, ProtocolOperation, RepayParams, SupplyParams, WithdrawParams,
    },
    swap::{SwapQuotation, SwapQuoteParams},
};

/// A lending protocol on one chain.
///
/// Adapters read position ledgers and build the single-step operations the composer chains
/// together. They never execute anything.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    fn protocol_id(&self) -> ProtocolId;

    fn chain(&self) -> Chain;

    /// Markets this adapter serves on its chain.
    fn markets(&self) -> Vec<Market>;

    /// Whether supplying mints a transferable receipt token (e.g. aTokens). Withdrawing from such
    /// markets requires pulling the receipt into the router first.
    fn is_collateral_tokenized(&self) -> bool;

    /// Receipt token for `asset` in `market_id`, if the market has one.
    fn to_protocol_token(&self, market_id: &str, asset: &FungibleAsset) -> Option<FungibleAsset>;

    /// Inverse of [`ProtocolAdapter::to_protocol_token`].
    fn to_underlying_token(
        &self,
        market_id: &str,
        protocol_token: &FungibleAsset,
    ) -> Option<FungibleAsset>;

    /// Reads the current ledger of `account` in `market_id`.
    async fn get_portfolio(
        &self,
        account: Address,
        market_id: &str,
    ) -> Result<Portfolio, ServiceError>;

    async fn new_supply_operation(
        &self,
        params: SupplyParams,
    ) -> Result<ProtocolOperation, ServiceError>;

    async fn new_withdraw_operation(
        &self,
        params: WithdrawParams,
    ) -> Result<ProtocolOperation, ServiceError>;

    async fn new_borrow_operation(&self, params: BorrowParams) -> Result<Operation, ServiceError>;

    async fn new_repay_operation(&self, params: RepayParams) -> Result<Operation, ServiceError>;
}

/// A swap aggregator or DEX router.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait Swapper: Send + Sync {
    fn id(&self) -> String;

    fn supports(&self, asset: &FungibleAsset) -> bool;

    /// Whether this swapper routes arbitrary assets, not only the ones it lists.
    fn accepts_any_asset(&self) -> bool;

    /// Whether [`Swapper::new_swap_operation`] can build an exact-out swap. Swappers that can only
    /// quote exact-out are given the equivalent exact-in quotation instead.
    fn builds_exact_out(&self) -> bool;

    async fn quote(&self, params: SwapQuoteParams) -> Result<SwapQuotation, ServiceError>;

    async fn new_swap_operation(
        &self,
        account: Address,
        quotation: SwapQuotation,
    ) -> Result<Operation, ServiceError>;
}

/// A flash-loan lender.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait FlashLoanSource: Send + Sync {
    fn id(&self) -> String;

    fn supports(&self, asset: &FungibleAsset) -> bool;

    /// Prices a loan either from the amounts to receive or from the amounts to pay back.
    async fn quote(
        &self,
        chain: Chain,
        request: FlashLoanRequest,
    ) -> Result<FlashLoanQuotation, ServiceError>;

    /// Builds the loan operation and its matching repay operation.
    async fn new_loan_repay_pair(
        &self,
        quotation: FlashLoanQuotation,
    ) -> Result<(Operation, Operation), ServiceError>;
}
