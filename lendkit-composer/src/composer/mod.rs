//! Compound lending actions.
//!
//! Every action follows the same shape: validate the requested amount against a scratch copy of
//! the caller's ledger, quote the swap and flash-loan legs, project the resulting ledger, and only
//! then build the ordered operations. A rejected action still returns the projection it would
//! have produced with the amounts clamped to what the ledger allows, but no operations.

mod collateral_swap;
mod debt_swap;
mod deleverage;
mod leverage;
mod zap;

use std::{fmt, sync::Arc};

use futures03::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, info, instrument, warn};

use lendkit_common::{
    flash_loan::{FlashLoanQuotation, FlashLoanRequest},
    models::{
        asset::FungibleAsset, error::MoneyError, money::Money, position::InterestRateMode,
        Address, Chain, BPS_BASE,
    },
    operation::Operation,
    portfolio::Portfolio,
    protocol::{BorrowParams, RepayParams, SupplyParams, WithdrawParams},
    swap::{SwapQuotation, SwapQuoteParams},
    traits::{FlashLoanSource, ProtocolAdapter, Swapper},
};

use crate::{config::ComposerConfig, errors::ComposerError, registry::Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    CollateralSwap,
    DebtSwap,
    LeverageByCollateral,
    LeverageByDebt,
    Deleverage,
    ZapSupply,
    ZapWithdraw,
    ZapBorrow,
    ZapRepay,
}

/// The amount an [`OperationError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum AmountField {
    SrcAmount,
    DestAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InsufficientAmount,
    SupplyCapExceeded,
    BorrowMin,
    Unhealthy,
}

/// A validation failure reported as data on an otherwise successful action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    pub name: AmountField,
    pub code: ErrorCode,
}

impl OperationError {
    pub fn new(name: AmountField, code: ErrorCode) -> Self {
        Self { name, code }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.code)
    }
}

/// Input of a compound action.
///
/// `portfolio` is borrowed: actions project onto their own clone and never touch it.
#[derive(Debug, Clone)]
pub struct ActionParams<'a> {
    pub account: Address,
    pub portfolio: &'a Portfolio,
    pub src_asset: FungibleAsset,
    pub src_amount: String,
    pub dest_asset: FungibleAsset,
    pub slippage_bps: Option<u32>,
    pub interest_rate_mode: Option<InterestRateMode>,
}

impl<'a> ActionParams<'a> {
    pub fn new(
        account: Address,
        portfolio: &'a Portfolio,
        src_asset: &FungibleAsset,
        src_amount: &str,
        dest_asset: &FungibleAsset,
    ) -> Self {
        Self {
            account,
            portfolio,
            src_asset: src_asset.clone(),
            src_amount: src_amount.to_string(),
            dest_asset: dest_asset.clone(),
            slippage_bps: None,
            interest_rate_mode: None,
        }
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u32) -> Self {
        self.slippage_bps = Some(slippage_bps);
        self
    }

    pub fn with_interest_rate_mode(mut self, interest_rate_mode: InterestRateMode) -> Self {
        self.interest_rate_mode = Some(interest_rate_mode);
        self
    }
}

/// Result of a compound action.
///
/// Check `error` before using `operations`: a rejected action carries an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput {
    pub dest_amount: String,
    pub after: Portfolio,
    pub error: Option<OperationError>,
    pub operations: Vec<Operation>,
}

impl ActionOutput {
    fn noop(portfolio: &Portfolio) -> Self {
        Self {
            dest_amount: "0".to_string(),
            after: portfolio.clone(),
            error: None,
            operations: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

fn rejected(
    action: Action,
    after: Portfolio,
    dest_amount: String,
    error: OperationError,
) -> ActionOutput {
    warn!(%action, %error, %dest_amount, "Rejected action");
    ActionOutput { dest_amount, after, error: Some(error), operations: Vec::new() }
}

fn composed(
    action: Action,
    after: Portfolio,
    dest_amount: &Money,
    operations: Vec<Operation>,
) -> ActionOutput {
    info!(
        %action,
        dest_amount = %dest_amount,
        operations = operations.len(),
        health_rate = %after.health_rate(),
        "Composed action"
    );
    ActionOutput { dest_amount: dest_amount.amount(), after, error: None, operations }
}

/// A swap leg. Legs between equivalent assets carry no route and build no operation.
struct SwapLeg {
    input: Money,
    output: Money,
    route: Option<(Arc<dyn Swapper>, SwapQuotation)>,
}

impl SwapLeg {
    fn passthrough(input: Money, output: Money) -> Self {
        Self { input, output, route: None }
    }

    fn quoted(swapper: Arc<dyn Swapper>, quotation: SwapQuotation) -> Self {
        Self {
            input: quotation.input.clone(),
            output: quotation.output.clone(),
            route: Some((swapper, quotation)),
        }
    }

    async fn operation(&self, account: Address) -> Result<Option<Operation>, ComposerError> {
        match &self.route {
            Some((swapper, quotation)) => Ok(Some(
                swapper
                    .new_swap_operation(account, quotation.clone())
                    .await?,
            )),
            None => Ok(None),
        }
    }
}

struct FlashLoanLeg {
    source: Arc<dyn FlashLoanSource>,
    quotation: FlashLoanQuotation,
}

impl FlashLoanLeg {
    fn loan(&self, asset: &FungibleAsset) -> Result<Money, ComposerError> {
        self.quotation
            .loans
            .get(asset)
            .cloned()
            .ok_or_else(|| ComposerError::MissingParameter(format!("flash loan of {asset}")))
    }

    fn repay(&self, asset: &FungibleAsset) -> Result<Money, ComposerError> {
        self.quotation
            .repays
            .get(asset)
            .cloned()
            .ok_or_else(|| ComposerError::MissingParameter(format!("flash repay of {asset}")))
    }

    async fn operations(&self) -> Result<(Operation, Operation), ComposerError> {
        Ok(self
            .source
            .new_loan_repay_pair(self.quotation.clone())
            .await?)
    }
}

/// Composes compound lending actions from the collaborators held in a [`Registry`].
pub struct Composer {
    registry: Registry,
    config: ComposerConfig,
}

impl Composer {
    pub fn new(registry: Registry, config: ComposerConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Runs `action` by name.
    pub async fn compose(
        &self,
        action: Action,
        params: ActionParams<'_>,
    ) -> Result<ActionOutput, ComposerError> {
        match action {
            Action::CollateralSwap => self.collateral_swap(params).await,
            Action::DebtSwap => self.debt_swap(params).await,
            Action::LeverageByCollateral => self.leverage_by_collateral(params).await,
            Action::LeverageByDebt => self.leverage_by_debt(params).await,
            Action::Deleverage => self.deleverage(params).await,
            Action::ZapSupply => self.zap_supply(params).await,
            Action::ZapWithdraw => self.zap_withdraw(params).await,
            Action::ZapBorrow => self.zap_borrow(params).await,
            Action::ZapRepay => self.zap_repay(params).await,
        }
    }

    /// Picks a swapper for `assets`.
    ///
    /// Prefers the first swapper supporting all of them, then the first one accepting arbitrary
    /// assets, then the first one registered.
    pub fn find_swapper(&self, assets: &[FungibleAsset]) -> Result<Arc<dyn Swapper>, ComposerError> {
        let swappers = self.registry.swappers();
        swappers
            .iter()
            .find(|swapper| {
                assets
                    .iter()
                    .all(|asset| swapper.supports(asset))
            })
            .or_else(|| {
                swappers
                    .iter()
                    .find(|swapper| swapper.accepts_any_asset())
            })
            .or_else(|| swappers.first())
            .cloned()
            .ok_or(ComposerError::NoSwapper)
    }

    /// Picks the first flash-loan source supporting all of `assets`.
    pub fn find_flash_loan_source(
        &self,
        assets: &[FungibleAsset],
    ) -> Result<Arc<dyn FlashLoanSource>, ComposerError> {
        self.registry
            .flash_loan_sources()
            .iter()
            .find(|source| {
                assets
                    .iter()
                    .all(|asset| source.supports(asset))
            })
            .cloned()
            .ok_or_else(|| {
                let assets: Vec<String> = assets
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                ComposerError::NoFlashLoanSource(assets.join(", "))
            })
    }

    /// Reads the ledgers of `account` in every market registered on `chain`.
    ///
    /// Lookups run concurrently; the first failing lookup fails the whole call.
    #[instrument(skip_all, fields(%account, %chain))]
    pub async fn get_portfolios(
        &self,
        account: Address,
        chain: Chain,
    ) -> Result<Vec<Portfolio>, ComposerError> {
        let lookups = self
            .registry
            .protocols_on(chain)
            .flat_map(|adapter| {
                adapter
                    .markets()
                    .into_iter()
                    .filter(move |market| market.chain == chain)
                    .map(move |market| {
                        let adapter = Arc::clone(adapter);
                        async move {
                            adapter
                                .get_portfolio(account, &market.market_id)
                                .await
                        }
                    })
            })
            .collect::<Vec<_>>();
        debug!(markets = lookups.len(), "Reading portfolios");
        Ok(try_join_all(lookups).await?)
    }

    fn protocol_for(&self, portfolio: &Portfolio) -> Result<Arc<dyn ProtocolAdapter>, ComposerError> {
        let adapter = self
            .registry
            .protocol(portfolio.chain(), portfolio.protocol_id())
            .ok_or_else(|| ComposerError::UnknownProtocol {
                protocol_id: portfolio.protocol_id().to_string(),
                chain: portfolio.chain(),
            })?;
        let serves_market = adapter
            .markets()
            .iter()
            .any(|market| market.market_id == portfolio.market_id() && market.chain == portfolio.chain());
        if !serves_market {
            return Err(ComposerError::UnknownMarket {
                protocol_id: portfolio.protocol_id().to_string(),
                market_id: portfolio.market_id().to_string(),
            });
        }
        Ok(Arc::clone(adapter))
    }

    fn slippage_bps(&self, params: &ActionParams<'_>) -> u32 {
        params
            .slippage_bps
            .unwrap_or(self.config.default_slippage_bps())
    }

    /// Swap output needed to repay `amount` when it is bought with `token_in`.
    fn repay_target(&self, amount: &Money, token_in: &FungibleAsset) -> Money {
        let mut target = amount.clone();
        if !self
            .registry
            .is_same_asset(token_in, amount.asset())
        {
            target.add_wei(self.config.repay_slack_wei());
        }
        target
    }

    /// Swap input left after a withdraw of `amount`, accounting for the pool rounding down.
    fn withdrawn_for_swap(&self, amount: &Money, token_out: &FungibleAsset) -> Money {
        if self
            .registry
            .is_same_asset(amount.asset(), token_out)
        {
            return amount.clone();
        }
        amount.saturating_sub_wei(self.config.withdraw_slack_wei())
    }

    #[instrument(skip_all, fields(input = %input, token_out = %token_out))]
    async fn quote_exact_in(
        &self,
        input: &Money,
        token_out: &FungibleAsset,
        slippage_bps: u32,
    ) -> Result<SwapLeg, ComposerError> {
        if self
            .registry
            .is_same_asset(input.asset(), token_out)
        {
            let output = Money::from_wei(token_out, input.amount_wei().clone());
            return Ok(SwapLeg::passthrough(input.clone(), output));
        }
        let swapper = self.find_swapper(&[input.asset().clone(), token_out.clone()])?;
        let quotation = swapper
            .quote(SwapQuoteParams::exact_in(input.clone(), token_out, slippage_bps))
            .await?;
        debug!(
            swapper = %swapper.id(),
            input = %quotation.input,
            output = %quotation.output,
            "Quoted exact-in swap"
        );
        Ok(SwapLeg::quoted(swapper, quotation))
    }

    /// Quotes the input needed to buy `output`.
    ///
    /// Swappers that cannot build exact-out swaps get an exact-in quotation for the sized input
    /// instead, so the resulting leg may deliver marginally less than `output`.
    #[instrument(skip_all, fields(token_in = %token_in, output = %output))]
    async fn quote_exact_out(
        &self,
        token_in: &FungibleAsset,
        output: &Money,
        slippage_bps: u32,
    ) -> Result<SwapLeg, ComposerError> {
        if self
            .registry
            .is_same_asset(token_in, output.asset())
        {
            let input = Money::from_wei(token_in, output.amount_wei().clone());
            return Ok(SwapLeg::passthrough(input, output.clone()));
        }
        let swapper = self.find_swapper(&[token_in.clone(), output.asset().clone()])?;
        let quotation = swapper
            .quote(SwapQuoteParams::exact_out(token_in, output.clone(), slippage_bps))
            .await?;
        debug!(
            swapper = %swapper.id(),
            input = %quotation.input,
            output = %quotation.output,
            "Quoted exact-out swap"
        );
        if swapper.builds_exact_out() {
            return Ok(SwapLeg::quoted(swapper, quotation));
        }
        let requoted = swapper
            .quote(SwapQuoteParams::exact_in(quotation.input, output.asset(), slippage_bps))
            .await?;
        debug!(output = %requoted.output, "Re-quoted exact-out swap as exact-in");
        Ok(SwapLeg::quoted(swapper, requoted))
    }

    #[instrument(skip_all, fields(%chain))]
    async fn quote_flash_loan(
        &self,
        chain: Chain,
        request: FlashLoanRequest,
    ) -> Result<FlashLoanLeg, ComposerError> {
        let assets: Vec<FungibleAsset> = request
            .amounts()
            .assets()
            .cloned()
            .collect();
        let source = self.find_flash_loan_source(&assets)?;
        let quotation = source.quote(chain, request).await?;
        debug!(
            source = %source.id(),
            protocol_id = %quotation.protocol_id,
            fee_bps = quotation.fee_bps,
            "Quoted flash loan"
        );
        Ok(FlashLoanLeg { source, quotation })
    }

    fn check_health(&self, after: &Portfolio) -> Option<OperationError> {
        (!after.is_healthy_with(self.config.health_margin()))
            .then(|| OperationError::new(AmountField::DestAmount, ErrorCode::Unhealthy))
    }
}

/// Parses the requested amount. `None` for a zero amount.
fn requested_amount(params: &ActionParams<'_>) -> Result<Option<(Money, Decimal)>, ComposerError> {
    let amount = Money::from_pair(&params.src_asset, &params.src_amount)?;
    if amount.is_negative() {
        return Err(MoneyError::InvalidAmount(params.src_amount.clone()).into());
    }
    if amount.is_zero() {
        return Ok(None);
    }
    let value = amount.to_decimal()?;
    Ok(Some((amount, value)))
}

/// Clamps a request to `available`, flagging the shortfall on `srcAmount`.
fn clamp_to_available(
    amount: Money,
    requested: Decimal,
    available: Decimal,
) -> (Money, Decimal, Option<OperationError>) {
    if requested <= available {
        return (amount, requested, None);
    }
    let clamped = Money::from_decimal(amount.asset(), available);
    let error = OperationError::new(AmountField::SrcAmount, ErrorCode::InsufficientAmount);
    (clamped, available, Some(error))
}

fn ensure_supply(portfolio: &Portfolio, asset: &FungibleAsset) -> Result<(), ComposerError> {
    match portfolio.find_supply(asset) {
        Some(_) => Ok(()),
        None => Err(ComposerError::UnknownAsset {
            position: "supply",
            asset: asset.to_string(),
            market_id: portfolio.market_id().to_string(),
        }),
    }
}

fn ensure_borrow(portfolio: &Portfolio, asset: &FungibleAsset) -> Result<(), ComposerError> {
    match portfolio.find_borrow(asset) {
        Some(_) => Ok(()),
        None => Err(ComposerError::UnknownAsset {
            position: "borrow",
            asset: asset.to_string(),
            market_id: portfolio.market_id().to_string(),
        }),
    }
}

/// The part of `wanted` a swap leg delivers. Legs re-quoted exact-in may come out short.
fn delivered(swap: &SwapLeg, wanted: &Money) -> Money {
    if swap.output.amount_wei() < wanted.amount_wei() {
        return Money::from_wei(wanted.asset(), swap.output.amount_wei().clone());
    }
    wanted.clone()
}

/// Headroom left under the supply cap of `asset` when supplying `amount` would exceed it.
fn exceeded_supply_cap(
    portfolio: &Portfolio,
    asset: &FungibleAsset,
    amount: Decimal,
) -> Option<Decimal> {
    let headroom = portfolio
        .find_supply(asset)?
        .supply_headroom()?;
    (amount > headroom).then_some(headroom)
}

fn check_borrow_min(
    after: &Portfolio,
    asset: &FungibleAsset,
    name: AmountField,
) -> Option<OperationError> {
    let borrow = after.find_borrow(asset)?;
    borrow
        .is_below_min(borrow.primary_balance())
        .then(|| OperationError::new(name, ErrorCode::BorrowMin))
}

/// The "whole balance" sentinel when `requested` is the entire position.
fn full_balance_bps(requested: Decimal, balance: Decimal) -> Option<u32> {
    (requested == balance).then_some(BPS_BASE)
}

/// The receipt token amount moved by a supply or withdraw of `amount` on a tokenized market.
///
/// Falls back to the market's receipt token when the adapter does not report one.
fn receipt_of(
    protocol: &dyn ProtocolAdapter,
    market_id: &str,
    reported: Option<Money>,
    amount: &Money,
) -> Result<Money, ComposerError> {
    let receipt = match reported {
        Some(receipt) => receipt,
        None => {
            let token = protocol
                .to_protocol_token(market_id, amount.asset())
                .ok_or_else(|| {
                    ComposerError::MissingParameter(format!("receipt token of {}", amount.asset()))
                })?;
            Money::from_wei(&token, amount.amount_wei().clone())
        }
    };
    match protocol.to_underlying_token(market_id, receipt.asset()) {
        Some(underlying) if &underlying != amount.asset() => Err(ComposerError::ReceiptMismatch {
            receipt: receipt.asset().to_string(),
            asset: amount.asset().to_string(),
        }),
        _ => Ok(receipt),
    }
}

/// Supply followed, on tokenized markets, by returning the minted receipt to the account.
async fn supply_operations(
    protocol: &dyn ProtocolAdapter,
    portfolio: &Portfolio,
    account: Address,
    input: Money,
    balance_bps: Option<u32>,
) -> Result<Vec<Operation>, ComposerError> {
    let amount = input.clone();
    let built = protocol
        .new_supply_operation(SupplyParams {
            market_id: portfolio.market_id().to_string(),
            account,
            input,
            balance_bps,
        })
        .await?;
    let mut operations = vec![built.operation];
    if protocol.is_collateral_tokenized() {
        let receipt = receipt_of(protocol, portfolio.market_id(), built.receipt, &amount)?;
        operations.push(Operation::return_funds(account, &receipt));
    }
    Ok(operations)
}

/// Withdraw preceded, on tokenized markets, by pulling the receipt from the account.
async fn withdraw_operations(
    protocol: &dyn ProtocolAdapter,
    portfolio: &Portfolio,
    account: Address,
    output: Money,
    balance_bps: Option<u32>,
) -> Result<Vec<Operation>, ComposerError> {
    let amount = output.clone();
    let built = protocol
        .new_withdraw_operation(WithdrawParams {
            market_id: portfolio.market_id().to_string(),
            account,
            output,
            balance_bps,
        })
        .await?;
    let mut operations = Vec::with_capacity(2);
    if protocol.is_collateral_tokenized() {
        let receipt = receipt_of(protocol, portfolio.market_id(), built.receipt, &amount)?;
        operations.push(Operation::pull_funds(account, &receipt));
    }
    operations.push(built.operation);
    Ok(operations)
}

async fn borrow_operation(
    protocol: &dyn ProtocolAdapter,
    portfolio: &Portfolio,
    account: Address,
    output: Money,
    interest_rate_mode: Option<InterestRateMode>,
) -> Result<Operation, ComposerError> {
    Ok(protocol
        .new_borrow_operation(BorrowParams {
            market_id: portfolio.market_id().to_string(),
            account,
            output,
            interest_rate_mode,
        })
        .await?)
}

async fn repay_operation(
    protocol: &dyn ProtocolAdapter,
    portfolio: &Portfolio,
    borrower: Address,
    input: Money,
    interest_rate_mode: Option<InterestRateMode>,
    balance_bps: Option<u32>,
) -> Result<Operation, ComposerError> {
    Ok(protocol
        .new_repay_operation(RepayParams {
            market_id: portfolio.market_id().to_string(),
            borrower,
            input,
            interest_rate_mode,
            balance_bps,
        })
        .await?)
}
