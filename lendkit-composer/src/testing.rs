//! Deterministic collaborators and fixtures for composer tests.
//!
//! The fixture market holds 10,000 USDC of collateral against 2,000 DAI of debt, with empty
//! WETH and WBTC reserves; WBTC is not usable as collateral.

use std::collections::HashMap;

use alloy_primitives::address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use lendkit_common::{
    flash_loan::{FlashLoanQuotation, FlashLoanRequest},
    models::{
        asset::FungibleAsset,
        error::{MoneyError, ServiceError},
        money::Money,
        money_bag::MoneyBag,
        position::{Borrow, Supply},
        Address, Chain, MarketId, ProtocolId, BPS_BASE,
    },
    operation::Operation,
    portfolio::Portfolio,
    protocol::{
        BorrowParams, Market, ProtocolOperation, RepayParams, SupplyParams, WithdrawParams,
    },
    swap::{SwapQuotation, SwapQuoteParams, SwapRequest},
    traits::{FlashLoanSource, ProtocolAdapter, Swapper},
};

use crate::{composer::Composer, config::ComposerConfig, registry::Registry};

pub const ACCOUNT: Address = address!("aAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa");
pub const PROTOCOL_ID: &str = "aave-v3";
pub const MARKET_ID: &str = "aave-v3-ethereum";
pub const FLASH_LOAN_FEE_BPS: u32 = 5;

pub const FLASH_LOAN_KIND: &str = "flash-loan";
pub const FLASH_REPAY_KIND: &str = "flash-loan-repay";
pub const SWAP_KIND: &str = "swap-token";

pub fn usdc() -> FungibleAsset {
    FungibleAsset::new(
        Chain::Ethereum,
        address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        6,
        "USDC",
        "USD Coin",
    )
}

pub fn weth() -> FungibleAsset {
    FungibleAsset::new(
        Chain::Ethereum,
        address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
        18,
        "WETH",
        "Wrapped Ether",
    )
}

pub fn wbtc() -> FungibleAsset {
    FungibleAsset::new(
        Chain::Ethereum,
        address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"),
        8,
        "WBTC",
        "Wrapped BTC",
    )
}

pub fn dai() -> FungibleAsset {
    FungibleAsset::new(
        Chain::Ethereum,
        address!("6B175474E89094C44Da98b954EedeAC495271d0F"),
        18,
        "DAI",
        "Dai Stablecoin",
    )
}

pub fn a_usdc() -> FungibleAsset {
    FungibleAsset::new(
        Chain::Ethereum,
        address!("98C23E9d8f34FEFb1B7BD6a91B7FF122F4e16F5c"),
        6,
        "aUSDC",
        "Aave Ethereum USDC",
    )
}

pub fn a_weth() -> FungibleAsset {
    FungibleAsset::new(
        Chain::Ethereum,
        address!("4d5F47FA6A74757f35C14fD3a6Ef8E3C9BC514E8"),
        18,
        "aWETH",
        "Aave Ethereum WETH",
    )
}

pub fn kinds(operations: &[Operation]) -> Vec<&str> {
    operations
        .iter()
        .map(|operation| operation.kind.as_str())
        .collect()
}

pub fn portfolio() -> Portfolio {
    portfolio_in(MARKET_ID)
}

pub fn portfolio_in(market_id: &str) -> Portfolio {
    Portfolio::new(
        Chain::Ethereum,
        PROTOCOL_ID,
        market_id,
        vec![
            Supply::new(usdc(), dec!(1), dec!(10000), dec!(0.03), true, dec!(0.8), dec!(0.85)),
            Supply::new(weth(), dec!(2000), dec!(0), dec!(0.02), true, dec!(0.8), dec!(0.825)),
            Supply::new(wbtc(), dec!(60000), dec!(0), dec!(0.001), false, dec!(0.7), dec!(0.75)),
        ],
        vec![
            Borrow::new(dai(), dec!(1), dec!(2000), dec!(0.05)),
            Borrow::new(usdc(), dec!(1), dec!(0), dec!(0.06)),
            Borrow::new(weth(), dec!(2000), dec!(0), dec!(0.025)),
        ],
    )
}

/// The fixture ledger with only `headroom` WETH left under the market's supply cap.
pub fn capped_portfolio(headroom: Decimal) -> Portfolio {
    let mut snapshot = portfolio().snapshot();
    for supply in snapshot
        .supplies
        .iter_mut()
        .filter(|supply| supply.asset == weth())
    {
        supply.supply_cap = Some(dec!(1000));
        supply.total_supply = Some(dec!(1000) - headroom);
    }
    Portfolio::from_snapshot(snapshot)
}

pub fn protocol() -> InMemoryProtocol {
    InMemoryProtocol::new(PROTOCOL_ID, Chain::Ethereum)
        .with_market(MARKET_ID)
        .with_portfolio(ACCOUNT, portfolio())
}

pub fn tokenized_protocol() -> InMemoryProtocol {
    protocol()
        .with_receipt_token(&usdc(), a_usdc())
        .with_receipt_token(&weth(), a_weth())
}

pub fn swapper() -> FixedPriceSwapper {
    FixedPriceSwapper::new("fixed-price")
        .with_price(&usdc(), dec!(1))
        .with_price(&dai(), dec!(1))
        .with_price(&weth(), dec!(2000))
        .with_price(&wbtc(), dec!(60000))
}

pub fn flash_loan_source() -> FixedFeeFlashLoanSource {
    FixedFeeFlashLoanSource::new("fixed-fee", FLASH_LOAN_FEE_BPS)
}

pub fn registry_with(protocol: InMemoryProtocol, swapper: FixedPriceSwapper) -> Registry {
    Registry::new()
        .with_protocol(std::sync::Arc::new(protocol))
        .with_swapper(std::sync::Arc::new(swapper))
        .with_flash_loan_source(std::sync::Arc::new(flash_loan_source()))
        .with_wrapped_native(weth())
}

pub fn composer() -> Composer {
    composer_with(protocol(), ComposerConfig::default())
}

pub fn composer_with(protocol: InMemoryProtocol, config: ComposerConfig) -> Composer {
    Composer::new(registry_with(protocol, swapper()), config)
}

pub fn composer_with_swapper(swapper: FixedPriceSwapper) -> Composer {
    Composer::new(registry_with(protocol(), swapper), ComposerConfig::default())
}

fn to_service_error(err: MoneyError) -> ServiceError {
    ServiceError::Fatal(err.to_string())
}

/// Swaps at fixed USD prices without slippage. Exact-out inputs round up.
pub struct FixedPriceSwapper {
    id: String,
    prices: HashMap<FungibleAsset, Decimal>,
    exact_out: bool,
    exact_in_haircut_bps: u32,
}

impl FixedPriceSwapper {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(), prices: HashMap::new(), exact_out: true, exact_in_haircut_bps: 0 }
    }

    pub fn with_price(mut self, asset: &FungibleAsset, price: Decimal) -> Self {
        self.prices.insert(asset.clone(), price);
        self
    }

    pub fn without_exact_out(mut self) -> Self {
        self.exact_out = false;
        self
    }

    /// Exact-in quotes come out `bps` short, as when the price moves between two quotes.
    pub fn with_exact_in_haircut_bps(mut self, bps: u32) -> Self {
        self.exact_in_haircut_bps = bps;
        self
    }

    fn price(&self, asset: &FungibleAsset) -> Result<Decimal, ServiceError> {
        self.prices
            .get(asset)
            .copied()
            .ok_or_else(|| ServiceError::InvalidInput(format!("no price for {asset}")))
    }
}

#[async_trait]
impl Swapper for FixedPriceSwapper {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn supports(&self, asset: &FungibleAsset) -> bool {
        self.prices.contains_key(asset)
    }

    fn accepts_any_asset(&self) -> bool {
        false
    }

    fn builds_exact_out(&self) -> bool {
        self.exact_out
    }

    async fn quote(&self, params: SwapQuoteParams) -> Result<SwapQuotation, ServiceError> {
        let price_in = self.price(params.token_in())?;
        let price_out = self.price(params.token_out())?;
        let (input, output) = match params.request() {
            SwapRequest::ExactIn { input, token_out } => {
                let mut value = input
                    .to_decimal()
                    .map_err(to_service_error)?
                    * price_in
                    / price_out;
                if self.exact_in_haircut_bps > 0 {
                    value = value * Decimal::from(BPS_BASE - self.exact_in_haircut_bps)
                        / Decimal::from(BPS_BASE);
                }
                (input.clone(), Money::from_decimal(token_out, value))
            }
            SwapRequest::ExactOut { output, token_in } => {
                let value = output
                    .to_decimal()
                    .map_err(to_service_error)?
                    * price_out
                    / price_in;
                let mut input = Money::from_decimal(token_in, value);
                if input
                    .to_decimal()
                    .map_err(to_service_error)?
                    < value
                {
                    input.add_wei(1u32);
                }
                (input, output.clone())
            }
        };
        Ok(SwapQuotation {
            input,
            output,
            direction: params.direction(),
            slippage_bps: params.slippage_bps(),
            route: json!({ "swapper": self.id }),
        })
    }

    async fn new_swap_operation(
        &self,
        account: Address,
        quotation: SwapQuotation,
    ) -> Result<Operation, ServiceError> {
        Ok(Operation::new(
            SWAP_KIND,
            json!({
                "account": account,
                "input": quotation.input,
                "output": quotation.output,
                "minOutput": quotation.min_output(),
                "direction": quotation.direction,
                "route": quotation.route,
            }),
        ))
    }
}

/// Lends any amount for a fixed fee. Fees round down.
pub struct FixedFeeFlashLoanSource {
    id: String,
    fee_bps: u32,
}

impl FixedFeeFlashLoanSource {
    pub fn new(id: &str, fee_bps: u32) -> Self {
        Self { id: id.to_string(), fee_bps }
    }
}

#[async_trait]
impl FlashLoanSource for FixedFeeFlashLoanSource {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn supports(&self, _asset: &FungibleAsset) -> bool {
        true
    }

    async fn quote(
        &self,
        _chain: Chain,
        request: FlashLoanRequest,
    ) -> Result<FlashLoanQuotation, ServiceError> {
        let (loans, repays) = match request {
            FlashLoanRequest::Loans(loans) => {
                let mut repays = MoneyBag::new();
                for loan in &loans {
                    let mut repay = loan.clone();
                    repay
                        .add(&loan.mul_bps(self.fee_bps))
                        .map_err(to_service_error)?;
                    repays
                        .add(&repay)
                        .map_err(to_service_error)?;
                }
                (loans, repays)
            }
            FlashLoanRequest::Repays(repays) => {
                let mut loans = MoneyBag::new();
                for repay in &repays {
                    let wei = repay.amount_wei() * BPS_BASE / (BPS_BASE + self.fee_bps);
                    loans
                        .add(&Money::from_wei(repay.asset(), wei))
                        .map_err(to_service_error)?;
                }
                (loans, repays)
            }
        };
        Ok(FlashLoanQuotation { protocol_id: self.id.clone(), loans, repays, fee_bps: self.fee_bps })
    }

    async fn new_loan_repay_pair(
        &self,
        quotation: FlashLoanQuotation,
    ) -> Result<(Operation, Operation), ServiceError> {
        let loan = Operation::new(
            FLASH_LOAN_KIND,
            json!({ "protocolId": quotation.protocol_id, "loans": quotation.loans }),
        );
        let repay = Operation::new(
            FLASH_REPAY_KIND,
            json!({ "protocolId": quotation.protocol_id, "repays": quotation.repays }),
        );
        Ok((loan, repay))
    }
}

/// Serves stored ledgers and builds `<protocol>-<action>` operations echoing their parameters.
pub struct InMemoryProtocol {
    protocol_id: ProtocolId,
    chain: Chain,
    markets: Vec<MarketId>,
    portfolios: HashMap<(Address, MarketId), Portfolio>,
    receipt_tokens: HashMap<FungibleAsset, FungibleAsset>,
    reports_receipts: bool,
}

impl InMemoryProtocol {
    pub fn new(protocol_id: &str, chain: Chain) -> Self {
        Self {
            protocol_id: protocol_id.to_string(),
            chain,
            markets: Vec::new(),
            portfolios: HashMap::new(),
            receipt_tokens: HashMap::new(),
            reports_receipts: true,
        }
    }

    pub fn with_market(mut self, market_id: &str) -> Self {
        self.markets.push(market_id.to_string());
        self
    }

    pub fn with_portfolio(mut self, account: Address, portfolio: Portfolio) -> Self {
        self.portfolios
            .insert((account, portfolio.market_id().to_string()), portfolio);
        self
    }

    /// Makes the market collateral-tokenized, minting `receipt` for supplies of `underlying`.
    pub fn with_receipt_token(mut self, underlying: &FungibleAsset, receipt: FungibleAsset) -> Self {
        self.receipt_tokens
            .insert(underlying.clone(), receipt);
        self
    }

    /// Leaves receipt amounts out of supply and withdraw operations.
    pub fn without_receipt_amounts(mut self) -> Self {
        self.reports_receipts = false;
        self
    }

    fn kind(&self, action: &str) -> String {
        format!("{}-{action}", self.protocol_id)
    }

    fn receipt(&self, amount: &Money) -> Option<Money> {
        if !self.reports_receipts {
            return None;
        }
        self.receipt_tokens
            .get(amount.asset())
            .map(|receipt| Money::from_wei(receipt, amount.amount_wei().clone()))
    }
}

#[async_trait]
impl ProtocolAdapter for InMemoryProtocol {
    fn protocol_id(&self) -> ProtocolId {
        self.protocol_id.clone()
    }

    fn chain(&self) -> Chain {
        self.chain
    }

    fn markets(&self) -> Vec<Market> {
        self.markets
            .iter()
            .map(|market_id| Market::new(&self.protocol_id, market_id, self.chain))
            .collect()
    }

    fn is_collateral_tokenized(&self) -> bool {
        !self.receipt_tokens.is_empty()
    }

    fn to_protocol_token(&self, _market_id: &str, asset: &FungibleAsset) -> Option<FungibleAsset> {
        self.receipt_tokens.get(asset).cloned()
    }

    fn to_underlying_token(
        &self,
        _market_id: &str,
        protocol_token: &FungibleAsset,
    ) -> Option<FungibleAsset> {
        self.receipt_tokens
            .iter()
            .find(|(_, receipt)| *receipt == protocol_token)
            .map(|(underlying, _)| underlying.clone())
    }

    async fn get_portfolio(
        &self,
        account: Address,
        market_id: &str,
    ) -> Result<Portfolio, ServiceError> {
        self.portfolios
            .get(&(account, market_id.to_string()))
            .cloned()
            .ok_or_else(|| ServiceError::InvalidInput(format!("no positions in {market_id}")))
    }

    async fn new_supply_operation(
        &self,
        params: SupplyParams,
    ) -> Result<ProtocolOperation, ServiceError> {
        let receipt = self.receipt(&params.input);
        let operation = Operation::new(
            &self.kind("supply"),
            json!({
                "marketId": params.market_id,
                "account": params.account,
                "input": params.input,
                "balanceBps": params.balance_bps,
            }),
        );
        Ok(ProtocolOperation::new(operation, receipt))
    }

    async fn new_withdraw_operation(
        &self,
        params: WithdrawParams,
    ) -> Result<ProtocolOperation, ServiceError> {
        let receipt = self.receipt(&params.output);
        let operation = Operation::new(
            &self.kind("withdraw"),
            json!({
                "marketId": params.market_id,
                "account": params.account,
                "output": params.output,
                "balanceBps": params.balance_bps,
            }),
        );
        Ok(ProtocolOperation::new(operation, receipt))
    }

    async fn new_borrow_operation(&self, params: BorrowParams) -> Result<Operation, ServiceError> {
        Ok(Operation::new(
            &self.kind("borrow"),
            json!({
                "marketId": params.market_id,
                "account": params.account,
                "output": params.output,
                "interestRateMode": params.interest_rate_mode,
            }),
        ))
    }

    async fn new_repay_operation(&self, params: RepayParams) -> Result<Operation, ServiceError> {
        Ok(Operation::new(
            &self.kind("repay"),
            json!({
                "marketId": params.market_id,
                "borrower": params.borrower,
                "input": params.input,
                "interestRateMode": params.interest_rate_mode,
                "balanceBps": params.balance_bps,
            }),
        ))
    }
}
