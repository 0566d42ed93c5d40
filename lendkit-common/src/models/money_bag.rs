use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{asset::FungibleAsset, error::MoneyError, money::Money, Address};

/// An insertion-ordered collection of amounts holding at most one entry per asset.
///
/// `add`/`sub` create a zero entry for an unseen asset before applying the delta. Entries are
/// never dropped implicitly, even when they reach zero; call [`MoneyBag::compact`] for that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Money>", into = "Vec<Money>")]
pub struct MoneyBag {
    entries: IndexMap<Address, Money>,
}

impl MoneyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bag from `(asset, decimal amount)` pairs, accumulating repeated assets.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a FungibleAsset, &'a str)>,
    ) -> Result<Self, MoneyError> {
        let mut bag = Self::new();
        for (asset, amount) in pairs {
            bag.add(&Money::from_pair(asset, amount)?)?;
        }
        Ok(bag)
    }

    pub fn from_instances<'a>(amounts: impl IntoIterator<Item = &'a Money>) -> Result<Self, MoneyError> {
        let mut bag = Self::new();
        for amount in amounts {
            bag.add(amount)?;
        }
        Ok(bag)
    }

    pub fn get(&self, asset: &FungibleAsset) -> Option<&Money> {
        self.entries
            .get(&asset.address)
            .filter(|money| money.asset() == asset)
    }

    pub fn has(&self, asset: &FungibleAsset) -> bool {
        self.get(asset).is_some()
    }

    pub fn add(&mut self, amount: &Money) -> Result<&mut Self, MoneyError> {
        self.entry(amount.asset())?.add(amount)?;
        Ok(self)
    }

    pub fn sub(&mut self, amount: &Money) -> Result<&mut Self, MoneyError> {
        self.entry(amount.asset())?.sub(amount)?;
        Ok(self)
    }

    pub fn add_amount(&mut self, asset: &FungibleAsset, amount: &str) -> Result<&mut Self, MoneyError> {
        self.entry(asset)?.add_amount(amount)?;
        Ok(self)
    }

    pub fn sub_amount(&mut self, asset: &FungibleAsset, amount: &str) -> Result<&mut Self, MoneyError> {
        self.entry(asset)?.sub_amount(amount)?;
        Ok(self)
    }

    /// Accumulates every entry of `other` into a copy of `self`.
    pub fn merge(&self, other: &MoneyBag) -> Result<MoneyBag, MoneyError> {
        let mut merged = self.clone();
        for amount in other.iter() {
            merged.add(amount)?;
        }
        Ok(merged)
    }

    /// A new bag without zero-valued entries.
    pub fn compact(&self) -> MoneyBag {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(_, money)| !money.is_zero())
                .map(|(address, money)| (*address, money.clone()))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Money> {
        self.entries.values()
    }

    pub fn assets(&self) -> impl Iterator<Item = &FungibleAsset> {
        self.entries.values().map(Money::asset)
    }

    pub fn to_vec(&self) -> Vec<Money> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&mut self, asset: &FungibleAsset) -> Result<&mut Money, MoneyError> {
        let entry = self
            .entries
            .entry(asset.address)
            .or_insert_with(|| Money::zero(asset));
        if entry.asset() != asset {
            return Err(MoneyError::different_asset(entry.asset(), asset));
        }
        Ok(entry)
    }
}

impl From<Vec<Money>> for MoneyBag {
    fn from(value: Vec<Money>) -> Self {
        let mut bag = MoneyBag::new();
        for amount in value {
            let key = amount.asset().address;
            if let Some(existing) = bag.entries.get_mut(&key) {
                if existing.asset() == amount.asset() {
                    existing.add_wei(amount.amount_wei().clone());
                    continue;
                }
            }
            bag.entries.insert(key, amount);
        }
        bag
    }
}

impl From<MoneyBag> for Vec<Money> {
    fn from(value: MoneyBag) -> Self {
        value.entries.into_values().collect()
    }
}

impl<'a> IntoIterator for &'a MoneyBag {
    type Item = &'a Money;
    type IntoIter = indexmap::map::Values<'a, Address, Money>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
