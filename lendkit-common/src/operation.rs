//! Opaque operation records.
//!
//! An [`Operation`] is one step of a router transaction as produced by a collaborator
//! (`flash-loan`, `swap-token`, `aave-v3-supply`, ...). The composer only orders them; their
//! `fields` are meaningful to whoever encodes the transaction.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{money::Money, Address};

/// Sends router-held funds back to the account.
pub const RETURN_FUNDS_KIND: &str = "return-funds";

/// Pulls funds from the account into the router.
pub const PULL_FUNDS_KIND: &str = "pull-funds";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: String,
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl Operation {
    pub fn new(kind: &str, fields: serde_json::Value) -> Self {
        Self { kind: kind.to_string(), fields }
    }

    /// Returns `amount` held by the router to `recipient`.
    pub fn return_funds(recipient: Address, amount: &Money) -> Self {
        Self::new(
            RETURN_FUNDS_KIND,
            json!({
                "recipient": recipient,
                "asset": amount.asset(),
                "amount": amount.amount(),
            }),
        )
    }

    /// Pulls `amount` from `owner` into the router.
    pub fn pull_funds(owner: Address, amount: &Money) -> Self {
        Self::new(
            PULL_FUNDS_KIND,
            json!({
                "owner": owner,
                "asset": amount.asset(),
                "amount": amount.amount(),
            }),
        )
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;
    use crate::models::asset::fixtures::usdc;

    #[test]
    fn test_return_funds_fields() {
        let account = address!("aAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa");
        let amount = Money::from_pair(&usdc(), "12.5").unwrap();

        let operation = Operation::return_funds(account, &amount);

        assert!(operation.is_kind(RETURN_FUNDS_KIND));
        assert_eq!(operation.fields["amount"], "12.5");
        assert_eq!(operation.fields["asset"]["symbol"], "USDC");
    }
}
