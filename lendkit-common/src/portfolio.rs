//! Position ledger of one account in one lending market.
//!
//! A [`Portfolio`] owns the supply and borrow positions of a `(chain, protocol, market)` triple
//! and keeps USD aggregates in step with every balance change. Aggregates are maintained
//! incrementally, so every balance change has to go through [`Portfolio::supply`],
//! [`Portfolio::withdraw`], [`Portfolio::borrow`] or [`Portfolio::repay`]. Balances and USD
//! aggregates saturate at `Decimal::MAX` rather than overflowing.

use std::{collections::HashMap, fmt};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::{
    asset::FungibleAsset,
    position::{truncate, Borrow, Supply},
    Address, Chain, MarketId, ProtocolId,
};

/// Health rate a ledger has to stay above. The extra basis point absorbs contract-side rounding.
pub const HEALTHY_THRESHOLD: Decimal = dec!(1.0001);

/// Ratio of liquidation-threshold-weighted collateral to debt. `Infinite` without debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthRate {
    Finite(Decimal),
    Infinite,
}

impl HealthRate {
    pub fn is_above(&self, threshold: Decimal) -> bool {
        match self {
            HealthRate::Finite(value) => *value > threshold,
            HealthRate::Infinite => true,
        }
    }
}

impl fmt::Display for HealthRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthRate::Finite(value) => write!(f, "{}", value.normalize()),
            HealthRate::Infinite => write!(f, "Infinity"),
        }
    }
}

/// Serializable positions of a ledger, without aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub chain: Chain,
    pub protocol_id: ProtocolId,
    pub market_id: MarketId,
    #[serde(default)]
    pub supplies: Vec<Supply>,
    #[serde(default)]
    pub borrows: Vec<Borrow>,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PortfolioSnapshot", into = "PortfolioSnapshot")]
pub struct Portfolio {
    chain: Chain,
    protocol_id: ProtocolId,
    market_id: MarketId,
    supplies: Vec<Supply>,
    supply_index: HashMap<Address, usize>,
    borrows: Vec<Borrow>,
    borrow_index: HashMap<Address, usize>,
    total_supply_usd: Decimal,
    total_collateral_usd: Decimal,
    total_borrow_usd: Decimal,
    total_borrow_capacity_usd: Decimal,
    liquidation_limit: Decimal,
    positive_proportion: Decimal,
    negative_proportion: Decimal,
}

impl Portfolio {
    /// Seeds a ledger from externally sourced positions. Repeated assets are merged.
    pub fn new(
        chain: Chain,
        protocol_id: &str,
        market_id: &str,
        supplies: Vec<Supply>,
        borrows: Vec<Borrow>,
    ) -> Self {
        let mut portfolio = Self {
            chain,
            protocol_id: protocol_id.to_string(),
            market_id: market_id.to_string(),
            supplies: Vec::with_capacity(supplies.len()),
            supply_index: HashMap::with_capacity(supplies.len()),
            borrows: Vec::with_capacity(borrows.len()),
            borrow_index: HashMap::with_capacity(borrows.len()),
            total_supply_usd: Decimal::ZERO,
            total_collateral_usd: Decimal::ZERO,
            total_borrow_usd: Decimal::ZERO,
            total_borrow_capacity_usd: Decimal::ZERO,
            liquidation_limit: Decimal::ZERO,
            positive_proportion: Decimal::ZERO,
            negative_proportion: Decimal::ZERO,
        };
        for supply in supplies {
            portfolio.supply_position(supply);
        }
        for borrow in borrows {
            portfolio.borrow_position(borrow);
        }
        portfolio
    }

    pub fn from_snapshot(snapshot: PortfolioSnapshot) -> Self {
        Self::new(
            snapshot.chain,
            &snapshot.protocol_id,
            &snapshot.market_id,
            snapshot.supplies,
            snapshot.borrows,
        )
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            chain: self.chain,
            protocol_id: self.protocol_id.clone(),
            market_id: self.market_id.clone(),
            supplies: self.supplies.clone(),
            borrows: self.borrows.clone(),
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn protocol_id(&self) -> &str {
        &self.protocol_id
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    pub fn supplies(&self) -> &[Supply] {
        &self.supplies
    }

    pub fn borrows(&self) -> &[Borrow] {
        &self.borrows
    }

    pub fn find_supply(&self, asset: &FungibleAsset) -> Option<&Supply> {
        self.supply_index
            .get(&asset.address)
            .map(|&index| &self.supplies[index])
    }

    pub fn find_borrow(&self, asset: &FungibleAsset) -> Option<&Borrow> {
        self.borrow_index
            .get(&asset.address)
            .map(|&index| &self.borrows[index])
    }

    pub fn total_supply_usd(&self) -> Decimal {
        self.total_supply_usd
    }

    pub fn total_collateral_usd(&self) -> Decimal {
        self.total_collateral_usd
    }

    pub fn total_borrow_usd(&self) -> Decimal {
        self.total_borrow_usd
    }

    pub fn total_borrow_capacity_usd(&self) -> Decimal {
        self.total_borrow_capacity_usd
    }

    pub fn liquidation_limit(&self) -> Decimal {
        self.liquidation_limit
    }

    pub fn positive_proportion(&self) -> Decimal {
        self.positive_proportion
    }

    pub fn negative_proportion(&self) -> Decimal {
        self.negative_proportion
    }

    /// Borrow capacity not yet used, floored at zero.
    pub fn available_borrow_capacity_usd(&self) -> Decimal {
        (self.total_borrow_capacity_usd - self.total_borrow_usd).max(Decimal::ZERO)
    }

    /// `totalBorrowUSD / totalBorrowCapacityUSD`.
    ///
    /// Reports zero whenever the capacity is zero, including the case of an outstanding borrow
    /// with no usable collateral left.
    pub fn utilization(&self) -> Decimal {
        if self.total_borrow_capacity_usd.is_zero() {
            return Decimal::ZERO;
        }
        self.total_borrow_usd / self.total_borrow_capacity_usd
    }

    pub fn health_rate(&self) -> HealthRate {
        if self.total_borrow_usd.is_zero() {
            return HealthRate::Infinite;
        }
        let liquidation_threshold = if self.total_collateral_usd.is_zero() {
            Decimal::ZERO
        } else {
            self.liquidation_limit / self.total_collateral_usd
        };
        HealthRate::Finite(
            self.total_collateral_usd
                .saturating_mul(liquidation_threshold)
                / self.total_borrow_usd,
        )
    }

    pub fn is_healthy(&self) -> bool {
        self.is_healthy_with(HEALTHY_THRESHOLD)
    }

    pub fn is_healthy_with(&self, threshold: Decimal) -> bool {
        self.health_rate().is_above(threshold)
    }

    /// APY earned on net worth, where supplies earn and borrows cost their respective rates.
    ///
    /// A ledger with zero net worth reports zero.
    pub fn net_apy(&self) -> Decimal {
        let net_worth = self.total_supply_usd - self.total_borrow_usd;
        if net_worth.is_zero() {
            return Decimal::ZERO;
        }
        (self.positive_proportion - self.negative_proportion) / net_worth
    }

    pub fn max_withdraw_amount(&self, asset: &FungibleAsset) -> Decimal {
        self.find_supply(asset)
            .map(|supply| supply.balance)
            .unwrap_or_default()
    }

    pub fn max_repay_amount(&self, asset: &FungibleAsset) -> Decimal {
        self.find_borrow(asset)
            .map(Borrow::primary_balance)
            .unwrap_or_default()
    }

    /// Adds `amount` to the matching supply. Returns the amount applied.
    ///
    /// Non-positive amounts and assets without a supply entry are silently ignored.
    pub fn supply(&mut self, asset: &FungibleAsset, amount: Decimal) -> Decimal {
        if amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let Some(&index) = self.supply_index.get(&asset.address) else {
            return Decimal::ZERO;
        };
        let supply = &mut self.supplies[index];
        let before = supply.balance;
        supply.balance = truncate(before.saturating_add(amount), &supply.asset);
        let applied = supply.balance - before;
        self.apply_supply_delta(index, applied);
        applied
    }

    /// Merges a whole supply position into the ledger, adding it if the asset is unseen.
    pub fn supply_position(&mut self, supply: Supply) -> Decimal {
        let amount = supply.balance;
        if !self
            .supply_index
            .contains_key(&supply.asset.address)
        {
            self.supply_index
                .insert(supply.asset.address, self.supplies.len());
            self.supplies
                .push(Supply { balance: Decimal::ZERO, ..supply.clone() });
        }
        self.supply(&supply.asset, amount)
    }

    /// Removes up to `amount` from the matching supply. Returns the amount applied.
    ///
    /// Requests above the current balance are clamped to it; callers that need strict
    /// validation compare the request against [`Portfolio::max_withdraw_amount`].
    pub fn withdraw(&mut self, asset: &FungibleAsset, amount: Decimal) -> Decimal {
        let amount = amount.min(self.max_withdraw_amount(asset));
        if amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let Some(&index) = self.supply_index.get(&asset.address) else {
            return Decimal::ZERO;
        };
        let supply = &mut self.supplies[index];
        let before = supply.balance;
        supply.balance = truncate(before - amount, &supply.asset);
        let applied = before - supply.balance;
        self.apply_supply_delta(index, -applied);
        applied
    }

    /// Adds `amount` to the primary rate mode of the matching borrow. Returns the amount
    /// applied.
    pub fn borrow(&mut self, asset: &FungibleAsset, amount: Decimal) -> Decimal {
        if amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let Some(&index) = self.borrow_index.get(&asset.address) else {
            return Decimal::ZERO;
        };
        self.apply_borrow_delta(index, 0, amount)
    }

    /// Merges a whole borrow position, every rate mode included.
    pub fn borrow_position(&mut self, borrow: Borrow) -> Decimal {
        if !self
            .borrow_index
            .contains_key(&borrow.asset.address)
        {
            self.borrow_index
                .insert(borrow.asset.address, self.borrows.len());
            self.borrows.push(Borrow {
                balances: vec![Decimal::ZERO; borrow.balances.len().max(1)],
                ..borrow.clone()
            });
        }
        let index = self.borrow_index[&borrow.asset.address];
        borrow
            .balances
            .iter()
            .enumerate()
            .filter(|(_, balance)| **balance > Decimal::ZERO)
            .map(|(mode, balance)| self.apply_borrow_delta(index, mode, *balance))
            .sum()
    }

    /// Removes up to `amount` from the primary rate mode of the matching borrow. Returns the
    /// amount applied; requests above [`Portfolio::max_repay_amount`] are clamped.
    pub fn repay(&mut self, asset: &FungibleAsset, amount: Decimal) -> Decimal {
        let amount = amount.min(self.max_repay_amount(asset));
        if amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let Some(&index) = self.borrow_index.get(&asset.address) else {
            return Decimal::ZERO;
        };
        -self.apply_borrow_delta(index, 0, -amount)
    }

    /// `Δcollateral × price / availableBorrowCapacityUSD` between `self` and `after`.
    pub fn calc_leverage_times(&self, asset: &FungibleAsset, after: &Portfolio) -> Decimal {
        let available = self.available_borrow_capacity_usd();
        let Some(supply) = self.find_supply(asset) else {
            return Decimal::ZERO;
        };
        if available.is_zero() {
            return Decimal::ZERO;
        }
        let delta = after.max_withdraw_amount(asset) - supply.balance;
        delta * supply.price / available
    }

    /// `1 / (1 − ltv)`. `None` for unknown assets or an LTV of 100% or more.
    pub fn calc_max_leverage_times(&self, asset: &FungibleAsset) -> Option<Decimal> {
        let supply = self.find_supply(asset)?;
        let margin = Decimal::ONE - supply.ltv;
        if margin <= Decimal::ZERO {
            return None;
        }
        Some(Decimal::ONE / margin)
    }

    fn apply_supply_delta(&mut self, index: usize, amount: Decimal) {
        let supply = &self.supplies[index];
        let amount_usd = amount.saturating_mul(supply.price);
        self.total_supply_usd = self.total_supply_usd.saturating_add(amount_usd);
        if supply.is_collateral() {
            self.total_collateral_usd = self.total_collateral_usd.saturating_add(amount_usd);
        }
        self.positive_proportion = self
            .positive_proportion
            .saturating_add(amount_usd.saturating_mul(supply.apy));
        if supply.usage_as_collateral_enabled {
            self.total_borrow_capacity_usd = self
                .total_borrow_capacity_usd
                .saturating_add(amount_usd.saturating_mul(supply.ltv));
            self.liquidation_limit = self
                .liquidation_limit
                .saturating_add(amount_usd.saturating_mul(supply.liquidation_threshold));
        }
    }

    fn apply_borrow_delta(&mut self, index: usize, mode: usize, amount: Decimal) -> Decimal {
        let borrow = &mut self.borrows[index];
        if borrow.balances.len() <= mode {
            borrow
                .balances
                .resize(mode + 1, Decimal::ZERO);
        }
        let before = borrow.balances[mode];
        borrow.balances[mode] = truncate(before.saturating_add(amount), &borrow.asset);
        let applied = borrow.balances[mode] - before;
        let apy = borrow
            .apys
            .get(mode)
            .copied()
            .unwrap_or_else(|| borrow.apy());
        let amount_usd = applied.saturating_mul(borrow.price);
        self.total_borrow_usd = self.total_borrow_usd.saturating_add(amount_usd);
        self.negative_proportion = self
            .negative_proportion
            .saturating_add(amount_usd.saturating_mul(apy));
        applied
    }
}

/// Rebuilds an independent ledger from the current positions.
impl Clone for Portfolio {
    fn clone(&self) -> Self {
        Portfolio::from_snapshot(self.snapshot())
    }
}

impl From<PortfolioSnapshot> for Portfolio {
    fn from(value: PortfolioSnapshot) -> Self {
        Portfolio::from_snapshot(value)
    }
}

impl From<Portfolio> for PortfolioSnapshot {
    fn from(value: Portfolio) -> Self {
        PortfolioSnapshot {
            chain: value.chain,
            protocol_id: value.protocol_id,
            market_id: value.market_id,
            supplies: value.supplies,
            borrows: value.borrows,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::models::asset::fixtures::{dai, usdc, wbtc, weth};

    fn portfolio() -> Portfolio {
        Portfolio::new(
            Chain::Ethereum,
            "aave-v3",
            "mainnet",
            vec![
                Supply::new(usdc(), dec!(1), dec!(10000), dec!(0.04), true, dec!(0.8), dec!(0.85)),
                Supply::new(weth(), dec!(2000), dec!(1), dec!(0.02), true, dec!(0.75), dec!(0.8)),
                Supply::new(wbtc(), dec!(30000), dec!(0), dec!(0.01), false, dec!(0.7), dec!(0.75)),
                Supply::new(dai(), dec!(1), dec!(500), dec!(0.05), false, dec!(0), dec!(0)).not_collateral(),
            ],
            vec![
                Borrow::new(usdc(), dec!(1), dec!(2000), dec!(0.06)),
                Borrow::with_rate_modes(weth(), dec!(2000), vec![dec!(0.5), dec!(0.25)], vec![dec!(0.03), dec!(0.05)]),
            ],
        )
    }

    /// Aggregates recomputed from scratch over the current positions.
    fn recomputed(portfolio: &Portfolio) -> [Decimal; 7] {
        let mut totals = [Decimal::ZERO; 7];
        for supply in portfolio.supplies() {
            let usd = supply.balance_usd();
            totals[0] += usd;
            if supply.is_collateral() {
                totals[1] += usd;
            }
            if supply.usage_as_collateral_enabled {
                totals[3] += usd * supply.ltv;
                totals[4] += usd * supply.liquidation_threshold;
            }
            totals[5] += usd * supply.apy;
        }
        for borrow in portfolio.borrows() {
            for (mode, balance) in borrow.balances.iter().enumerate() {
                let usd = balance * borrow.price;
                totals[2] += usd;
                totals[6] += usd * borrow.apys.get(mode).copied().unwrap_or(borrow.apy());
            }
        }
        totals
    }

    fn aggregates(portfolio: &Portfolio) -> [Decimal; 7] {
        [
            portfolio.total_supply_usd(),
            portfolio.total_collateral_usd(),
            portfolio.total_borrow_usd(),
            portfolio.total_borrow_capacity_usd(),
            portfolio.liquidation_limit(),
            portfolio.positive_proportion(),
            portfolio.negative_proportion(),
        ]
    }

    #[test]
    fn test_seeded_aggregates() {
        let portfolio = portfolio();

        assert_eq!(portfolio.total_supply_usd(), dec!(12500));
        assert_eq!(portfolio.total_collateral_usd(), dec!(12000));
        assert_eq!(portfolio.total_borrow_usd(), dec!(3500));
        assert_eq!(portfolio.total_borrow_capacity_usd(), dec!(9500));
        assert_eq!(portfolio.liquidation_limit(), dec!(10100));
        assert_eq!(aggregates(&portfolio), recomputed(&portfolio));
    }

    #[test]
    fn test_aggregates_track_every_mutation() {
        let mut portfolio = portfolio();
        let steps: Vec<Box<dyn Fn(&mut Portfolio) -> Decimal>> = vec![
            Box::new(|p: &mut Portfolio| p.supply(&usdc(), dec!(250.1234567))),
            Box::new(|p: &mut Portfolio| p.withdraw(&weth(), dec!(0.3))),
            Box::new(|p: &mut Portfolio| p.borrow(&usdc(), dec!(100))),
            Box::new(|p: &mut Portfolio| p.repay(&weth(), dec!(0.1))),
            Box::new(|p: &mut Portfolio| p.supply(&dai(), dec!(20))),
            Box::new(|p: &mut Portfolio| p.withdraw(&usdc(), dec!(1000000))),
            Box::new(|p: &mut Portfolio| p.repay(&usdc(), dec!(1000000))),
            Box::new(|p: &mut Portfolio| p.borrow(&weth(), dec!(0.000000000000000001))),
            Box::new(|p: &mut Portfolio| p.supply(&wbtc(), dec!(0.5))),
        ];

        for step in steps {
            step(&mut portfolio);
            assert_eq!(aggregates(&portfolio), recomputed(&portfolio));
        }
    }

    #[test]
    fn test_supply_truncates_to_asset_decimals() {
        let mut portfolio = portfolio();

        let applied = portfolio.supply(&usdc(), dec!(1.1234567));

        assert_eq!(applied, dec!(1.123456));
        assert_eq!(portfolio.max_withdraw_amount(&usdc()), dec!(10001.123456));
    }

    #[rstest]
    #[case::zero(usdc(), dec!(0))]
    #[case::negative(usdc(), dec!(-5))]
    #[case::unknown_asset(FungibleAsset::new(Chain::Ethereum, Address::ZERO, 18, "UNK", ""), dec!(5))]
    fn test_supply_noop(#[case] asset: FungibleAsset, #[case] amount: Decimal) {
        let before = portfolio();
        let mut after = before.clone();

        assert_eq!(after.supply(&asset, amount), Decimal::ZERO);
        assert_eq!(after.borrow(&asset, amount), Decimal::ZERO);
        assert_eq!(after, before);
    }

    #[test]
    fn test_withdraw_clamps_to_balance() {
        let mut portfolio = portfolio();

        let applied = portfolio.withdraw(&weth(), dec!(5));

        assert_eq!(applied, dec!(1));
        assert!(portfolio.find_supply(&weth()).unwrap().is_zero());
        assert_eq!(portfolio.total_supply_usd(), dec!(10500));
    }

    #[test]
    fn test_repay_clamps_to_primary_balance() {
        let mut portfolio = portfolio();

        let applied = portfolio.repay(&weth(), dec!(1));

        assert_eq!(applied, dec!(0.5));
        assert_eq!(portfolio.find_borrow(&weth()).unwrap().balances, vec![dec!(0), dec!(0.25)]);
        assert_eq!(portfolio.total_borrow_usd(), dec!(2500));
    }

    #[test]
    fn test_health_rate_formula() {
        let portfolio = Portfolio::new(
            Chain::Ethereum,
            "aave-v3",
            "mainnet",
            vec![Supply::new(usdc(), dec!(1), dec!(1000), dec!(0), true, dec!(0.8), dec!(0.85))],
            vec![Borrow::new(dai(), dec!(1), dec!(500), dec!(0))],
        );

        assert_eq!(portfolio.health_rate(), HealthRate::Finite(dec!(1.7)));
        assert_eq!(portfolio.health_rate().to_string(), "1.7");
        assert!(portfolio.is_healthy());
    }

    #[test]
    fn test_health_rate_without_debt_is_infinite() {
        let mut portfolio = portfolio();
        portfolio.repay(&usdc(), dec!(2000));
        portfolio.repay(&weth(), dec!(0.5));

        assert_eq!(
            portfolio.health_rate(),
            HealthRate::Finite(dec!(12000) * (dec!(10100) / dec!(12000)) / dec!(500))
        );

        let empty = Portfolio::new(Chain::Ethereum, "aave-v3", "mainnet", vec![], vec![]);

        assert_eq!(empty.health_rate(), HealthRate::Infinite);
        assert_eq!(empty.health_rate().to_string(), "Infinity");
        assert!(empty.is_healthy());
    }

    #[test]
    fn test_healthy_margin() {
        let portfolio = Portfolio::new(
            Chain::Ethereum,
            "aave-v3",
            "mainnet",
            vec![Supply::new(usdc(), dec!(1), dec!(1000), dec!(0), true, dec!(0.8), dec!(1))],
            vec![Borrow::new(dai(), dec!(1), dec!(1000), dec!(0))],
        );

        assert_eq!(portfolio.health_rate(), HealthRate::Finite(dec!(1)));
        assert!(!portfolio.is_healthy());
        assert!(portfolio.is_healthy_with(dec!(0.99)));
    }

    #[test]
    fn test_oversized_amounts_saturate() {
        let mut portfolio = portfolio();

        let applied = portfolio.supply(&weth(), Decimal::MAX);
        portfolio.borrow(&usdc(), Decimal::MAX);

        assert_eq!(applied, Decimal::MAX - dec!(1));
        assert_eq!(portfolio.total_supply_usd(), Decimal::MAX);
        assert_eq!(portfolio.total_borrow_usd(), Decimal::MAX);
        assert!(matches!(portfolio.health_rate(), HealthRate::Finite(_)));
    }

    #[test]
    fn test_utilization() {
        let portfolio = portfolio();

        assert_eq!(portfolio.utilization(), dec!(3500) / dec!(9500));
        assert_eq!(portfolio.available_borrow_capacity_usd(), dec!(6000));
    }

    #[test]
    fn test_utilization_zero_capacity_with_debt() {
        let portfolio = Portfolio::new(
            Chain::Ethereum,
            "aave-v3",
            "mainnet",
            vec![Supply::new(usdc(), dec!(1), dec!(1000), dec!(0), false, dec!(0.8), dec!(0.85))],
            vec![Borrow::new(dai(), dec!(1), dec!(10), dec!(0))],
        );

        assert_eq!(portfolio.utilization(), Decimal::ZERO);
    }

    #[test]
    fn test_net_apy() {
        let portfolio = portfolio();
        let positive = dec!(10000) * dec!(0.04) + dec!(2000) * dec!(0.02) + dec!(500) * dec!(0.05);
        let negative = dec!(2000) * dec!(0.06) + dec!(1000) * dec!(0.03) + dec!(500) * dec!(0.05);

        assert_eq!(portfolio.net_apy(), (positive - negative) / dec!(9000));
    }

    #[test]
    fn test_net_apy_zero_net_worth() {
        let portfolio = Portfolio::new(
            Chain::Ethereum,
            "aave-v3",
            "mainnet",
            vec![Supply::new(usdc(), dec!(1), dec!(1000), dec!(0.03), true, dec!(0.8), dec!(0.85))],
            vec![Borrow::new(dai(), dec!(1), dec!(1000), dec!(0.05))],
        );

        assert_eq!(portfolio.total_supply_usd(), portfolio.total_borrow_usd());
        assert_eq!(portfolio.net_apy(), Decimal::ZERO);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = portfolio();
        let mut projected = original.clone();

        assert_eq!(projected, original);

        projected.withdraw(&usdc(), dec!(1));
        projected.borrow(&weth(), dec!(1));

        assert_eq!(original.max_withdraw_amount(&usdc()), dec!(10000));
        assert_eq!(original.max_repay_amount(&weth()), dec!(0.5));
        assert_ne!(projected, original);
    }

    #[test]
    fn test_seeding_merges_repeated_assets() {
        let portfolio = Portfolio::new(
            Chain::Ethereum,
            "aave-v3",
            "mainnet",
            vec![
                Supply::new(usdc(), dec!(1), dec!(10), dec!(0), true, dec!(0.8), dec!(0.85)),
                Supply::new(usdc(), dec!(1), dec!(5), dec!(0), true, dec!(0.8), dec!(0.85)),
            ],
            vec![],
        );

        assert_eq!(portfolio.supplies().len(), 1);
        assert_eq!(portfolio.max_withdraw_amount(&usdc()), dec!(15));
        assert_eq!(portfolio.total_supply_usd(), dec!(15));
    }

    #[test]
    fn test_leverage_times() {
        let before = portfolio();
        let mut after = before.clone();
        after.supply(&weth(), dec!(1.5));
        after.borrow(&usdc(), dec!(3000));

        assert_eq!(before.calc_leverage_times(&weth(), &after), dec!(0.5));
        assert_eq!(before.calc_max_leverage_times(&usdc()), Some(dec!(5)));
        assert_eq!(before.calc_max_leverage_times(&weth()), Some(dec!(4)));
    }

    #[test]
    fn test_max_leverage_times_undefined() {
        let portfolio = Portfolio::new(
            Chain::Ethereum,
            "aave-v3",
            "mainnet",
            vec![Supply::new(usdc(), dec!(1), dec!(10), dec!(0), true, dec!(1), dec!(1))],
            vec![],
        );

        assert_eq!(portfolio.calc_max_leverage_times(&usdc()), None);
        assert_eq!(portfolio.calc_max_leverage_times(&weth()), None);
    }

    #[test]
    fn test_serde_round_trip() {
        let portfolio = portfolio();

        let json = serde_json::to_string(&portfolio).unwrap();
        let decoded: Portfolio = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, portfolio);
    }
}
