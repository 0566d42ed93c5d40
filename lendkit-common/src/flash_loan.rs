//! Flash-loan quoting types exchanged with
//! [`FlashLoanSource`](crate::traits::FlashLoanSource) implementations.

use serde::{Deserialize, Serialize};

use crate::models::{money_bag::MoneyBag, ProtocolId};

/// What the caller pins down: the amounts received, or the amounts paid back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashLoanRequest {
    Loans(MoneyBag),
    Repays(MoneyBag),
}

impl FlashLoanRequest {
    pub fn amounts(&self) -> &MoneyBag {
        match self {
            FlashLoanRequest::Loans(amounts) | FlashLoanRequest::Repays(amounts) => amounts,
        }
    }
}

/// A loan/repay pair. `repays` covers `loans` plus the lender's fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashLoanQuotation {
    pub protocol_id: ProtocolId,
    pub loans: MoneyBag,
    pub repays: MoneyBag,
    pub fee_bps: u32,
}
