use thiserror::Error;

use super::asset::FungibleAsset;

/// Errors raised by `Money`/`MoneyBag` arithmetic and parsing.
///
/// These are programming errors: a caller mixing two assets or passing a malformed amount has a
/// bug, so composition stops immediately instead of coercing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Cannot combine amounts of different assets: {0} and {1}")]
    DifferentAsset(Box<FungibleAsset>, Box<FungibleAsset>),
    #[error("Invalid decimal amount: {0:?}")]
    InvalidAmount(String),
    #[error("Amount does not fit a ledger decimal: {0}")]
    Overflow(String),
}

impl MoneyError {
    pub fn different_asset(left: &FungibleAsset, right: &FungibleAsset) -> Self {
        MoneyError::DifferentAsset(Box::new(left.clone()), Box::new(right.clone()))
    }
}

/// Represents the failures reported by external collaborators: protocol adapters, swappers and
/// flash-loan sources.
///
/// Variants:
/// - `Recoverable`: the call failed for a temporary reason, e.g. a network problem. Retrying at a
///   later time may succeed; retrying is the caller's business.
/// - `InvalidInput`: the collaborator rejected the request parameters, e.g. an unroutable swap.
/// - `Fatal`: the collaborator is broken for this request and should not be asked again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Fatal error: {0}")]
    Fatal(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Recoverable error: {0}")]
    Recoverable(String),
}
