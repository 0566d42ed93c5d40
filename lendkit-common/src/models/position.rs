use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::asset::FungibleAsset;

/// Truncates a balance to the asset's decimals, toward zero.
pub(crate) fn truncate(amount: Decimal, asset: &FungibleAsset) -> Decimal {
    amount.round_dp_with_strategy(asset.decimals, RoundingStrategy::ToZero)
}

/// Aave-style interest rate modes. The numeric value is what the pool contracts take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InterestRateMode {
    Stable = 1,
    Variable = 2,
}

/// A supply position of one asset within a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supply {
    pub asset: FungibleAsset,
    /// USD per whole unit.
    pub price: Decimal,
    pub balance: Decimal,
    pub apy: Decimal,
    pub usage_as_collateral_enabled: bool,
    pub ltv: Decimal,
    pub liquidation_threshold: Decimal,
    /// Set for supplies that earn yield but never back a borrow, e.g. the base asset of a
    /// Compound V3 market.
    #[serde(default)]
    pub is_not_collateral: bool,
    /// Market-wide cap, in asset units.
    #[serde(default)]
    pub supply_cap: Option<Decimal>,
    /// Market-wide supplied amount, in asset units.
    #[serde(default)]
    pub total_supply: Option<Decimal>,
}

impl Supply {
    pub fn new(
        asset: FungibleAsset,
        price: Decimal,
        balance: Decimal,
        apy: Decimal,
        usage_as_collateral_enabled: bool,
        ltv: Decimal,
        liquidation_threshold: Decimal,
    ) -> Self {
        let balance = truncate(balance, &asset);
        Self {
            asset,
            price,
            balance,
            apy,
            usage_as_collateral_enabled,
            ltv,
            liquidation_threshold,
            is_not_collateral: false,
            supply_cap: None,
            total_supply: None,
        }
    }

    pub fn not_collateral(mut self) -> Self {
        self.is_not_collateral = true;
        self
    }

    pub fn with_supply_cap(mut self, supply_cap: Decimal, total_supply: Decimal) -> Self {
        self.supply_cap = Some(supply_cap);
        self.total_supply = Some(total_supply);
        self
    }

    pub fn is_collateral(&self) -> bool {
        !self.is_not_collateral
    }

    pub fn is_zero(&self) -> bool {
        self.balance.is_zero()
    }

    pub fn balance_usd(&self) -> Decimal {
        self.balance * self.price
    }

    /// Room left under the supply cap, `None` when the market declares no cap.
    pub fn supply_headroom(&self) -> Option<Decimal> {
        match (self.supply_cap, self.total_supply) {
            (Some(cap), Some(total)) => Some((cap - total).max(Decimal::ZERO)),
            _ => None,
        }
    }
}

/// A borrow position of one asset within a market.
///
/// `balances[0]`/`apys[0]` are the primary (variable) rate; the remaining entries are other
/// rate modes such as Aave's stable rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrow {
    pub asset: FungibleAsset,
    pub price: Decimal,
    pub balances: Vec<Decimal>,
    pub apys: Vec<Decimal>,
    /// Minimum non-zero primary balance the market accepts.
    #[serde(default)]
    pub borrow_min: Option<Decimal>,
}

impl Borrow {
    pub fn new(asset: FungibleAsset, price: Decimal, balance: Decimal, apy: Decimal) -> Self {
        Self::with_rate_modes(asset, price, vec![balance], vec![apy])
    }

    pub fn with_rate_modes(
        asset: FungibleAsset,
        price: Decimal,
        balances: Vec<Decimal>,
        apys: Vec<Decimal>,
    ) -> Self {
        let balances = balances
            .into_iter()
            .map(|balance| truncate(balance, &asset))
            .collect();
        Self { asset, price, balances, apys, borrow_min: None }
    }

    pub fn with_borrow_min(mut self, borrow_min: Decimal) -> Self {
        self.borrow_min = Some(borrow_min);
        self
    }

    /// Sum over all rate modes.
    pub fn balance(&self) -> Decimal {
        self.balances.iter().sum()
    }

    pub fn primary_balance(&self) -> Decimal {
        self.balances
            .first()
            .copied()
            .unwrap_or_default()
    }

    pub fn apy(&self) -> Decimal {
        self.apys
            .first()
            .copied()
            .unwrap_or_default()
    }

    pub fn is_zero(&self) -> bool {
        self.balance().is_zero()
    }

    pub fn balance_usd(&self) -> Decimal {
        self.balance() * self.price
    }

    /// Whether a primary balance of `balance` violates the market's borrow minimum.
    pub fn is_below_min(&self, balance: Decimal) -> bool {
        match self.borrow_min {
            Some(min) => !balance.is_zero() && balance < min,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::asset::fixtures::{usdc, weth};

    #[test]
    fn test_supply_truncates_balance() {
        let supply = Supply::new(usdc(), dec!(1), dec!(1.23456789), dec!(0.03), true, dec!(0.8), dec!(0.85));

        assert_eq!(supply.balance, dec!(1.234567));
        assert!(supply.is_collateral());
        assert!(!supply.clone().not_collateral().is_collateral());
    }

    #[test]
    fn test_supply_headroom() {
        let supply = Supply::new(usdc(), dec!(1), dec!(0), dec!(0), true, dec!(0.8), dec!(0.85));

        assert_eq!(supply.supply_headroom(), None);
        assert_eq!(
            supply
                .clone()
                .with_supply_cap(dec!(1000), dec!(900))
                .supply_headroom(),
            Some(dec!(100))
        );
        assert_eq!(
            supply
                .with_supply_cap(dec!(1000), dec!(1200))
                .supply_headroom(),
            Some(dec!(0))
        );
    }

    #[test]
    fn test_borrow_rate_modes() {
        let borrow =
            Borrow::with_rate_modes(weth(), dec!(2000), vec![dec!(1.5), dec!(0.5)], vec![dec!(0.02), dec!(0.05)]);

        assert_eq!(borrow.balance(), dec!(2));
        assert_eq!(borrow.primary_balance(), dec!(1.5));
        assert_eq!(borrow.apy(), dec!(0.02));
        assert_eq!(borrow.balance_usd(), dec!(4000));
    }

    #[test]
    fn test_borrow_min() {
        let borrow = Borrow::new(usdc(), dec!(1), dec!(0), dec!(0.04)).with_borrow_min(dec!(100));

        assert!(borrow.is_below_min(dec!(50)));
        assert!(!borrow.is_below_min(dec!(0)));
        assert!(!borrow.is_below_min(dec!(100)));
    }

    #[test]
    fn test_rate_mode_values() {
        assert_eq!(InterestRateMode::Variable as u8, 2);
        assert_eq!(InterestRateMode::Stable.to_string(), "stable");
    }
}
