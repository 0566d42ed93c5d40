//! Parameters and results of single-step protocol operations.

use serde::{Deserialize, Serialize};

use crate::{
    models::{
        money::Money, position::InterestRateMode, Address, Chain, MarketId, ProtocolId,
    },
    operation::Operation,
};

/// A market served by a protocol adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Market {
    pub protocol_id: ProtocolId,
    pub market_id: MarketId,
    pub chain: Chain,
}

impl Market {
    pub fn new(protocol_id: &str, market_id: &str, chain: Chain) -> Self {
        Self { protocol_id: protocol_id.to_string(), market_id: market_id.to_string(), chain }
    }
}

/// Supplies `input` of an underlying asset.
///
/// With `balance_bps` set, the operation supplies that share of the router's balance at
/// execution time instead of the literal `input` amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyParams {
    pub market_id: MarketId,
    pub account: Address,
    pub input: Money,
    pub balance_bps: Option<u32>,
}

/// Withdraws `output` of an underlying asset. `balance_bps` works as in [`SupplyParams`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawParams {
    pub market_id: MarketId,
    pub account: Address,
    pub output: Money,
    pub balance_bps: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowParams {
    pub market_id: MarketId,
    pub account: Address,
    pub output: Money,
    pub interest_rate_mode: Option<InterestRateMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepayParams {
    pub market_id: MarketId,
    pub borrower: Address,
    pub input: Money,
    pub interest_rate_mode: Option<InterestRateMode>,
    pub balance_bps: Option<u32>,
}

/// A built supply or withdraw step.
///
/// `receipt` is the protocol receipt asset minted by a supply or burnt by a withdraw; adapters
/// for markets without a receipt asset leave it empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolOperation {
    pub operation: Operation,
    pub receipt: Option<Money>,
}

impl ProtocolOperation {
    pub fn new(operation: Operation, receipt: Option<Money>) -> Self {
        Self { operation, receipt }
    }
}
