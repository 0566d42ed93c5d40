//! Precision-bound token amounts.
//!
//! A [`Money`] is an amount of one [`FungibleAsset`]. The amount is held as an exact signed
//! integer in the asset's smallest unit, so every value is, by construction, truncated toward
//! zero at `asset.decimals` places. Decimal strings are only produced at the edges
//! ([`Money::amount`]) and parsed with the same round-down rule ([`precise`]).

use std::{cmp::Ordering, fmt};

use num_bigint::{BigInt, Sign};
use num_traits::{pow, ToPrimitive, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{asset::FungibleAsset, error::MoneyError, Address};

/// Largest scale a ledger `Decimal` can carry.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Truncates a decimal string to `decimals` places, rounding toward zero.
///
/// Idempotent: re-applying it to its own output returns the same string.
pub fn precise(amount: &str, decimals: u32) -> Result<String, MoneyError> {
    Ok(format_wei(&parse_wei(amount, decimals)?, decimals))
}

/// Parses a plain decimal string (`"-12.345"`, `".5"`, `"7"`) into smallest units.
fn parse_wei(amount: &str, decimals: u32) -> Result<BigInt, MoneyError> {
    let invalid = || MoneyError::InvalidAmount(amount.to_string());
    let trimmed = amount.trim();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (unsigned, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part
        .bytes()
        .chain(frac_part.bytes())
        .all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(int_part);
    let kept = frac_part.len().min(decimals as usize);
    digits.push_str(&frac_part[..kept]);
    digits.extend(std::iter::repeat('0').take(decimals as usize - kept));
    if digits.is_empty() {
        digits.push('0');
    }

    let magnitude = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Renders smallest units as a decimal string without trailing zeros.
fn format_wei(wei: &BigInt, decimals: u32) -> String {
    if wei.is_zero() {
        return "0".to_string();
    }
    let mut digits = wei.magnitude().to_str_radix(10);
    let decimals = decimals as usize;
    if digits.len() <= decimals {
        digits = format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits);
    }
    let (int_part, frac_part) = digits.split_at(digits.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');

    let sign = if wei.sign() == Sign::Minus { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{int_part}")
    } else {
        format!("{sign}{int_part}.{frac_part}")
    }
}

/// Plain `{asset, amount}` shape used for (de)serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyObject {
    pub asset: FungibleAsset,
    pub amount: String,
}

/// An amount of a single fungible asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MoneyObject", into = "MoneyObject")]
pub struct Money {
    asset: FungibleAsset,
    wei: BigInt,
}

impl Money {
    pub fn zero(asset: &FungibleAsset) -> Self {
        Self { asset: asset.clone(), wei: BigInt::zero() }
    }

    /// Builds an amount from a decimal string, truncating it to the asset's decimals.
    pub fn from_pair(asset: &FungibleAsset, amount: &str) -> Result<Self, MoneyError> {
        Ok(Self { asset: asset.clone(), wei: parse_wei(amount, asset.decimals)? })
    }

    pub fn from_object(object: MoneyObject) -> Result<Self, MoneyError> {
        let wei = parse_wei(&object.amount, object.asset.decimals)?;
        Ok(Self { asset: object.asset, wei })
    }

    pub fn from_instance(other: &Money) -> Self {
        other.clone()
    }

    /// Builds an amount from smallest units. Exact.
    pub fn from_wei(asset: &FungibleAsset, wei: impl Into<BigInt>) -> Self {
        Self { asset: asset.clone(), wei: wei.into() }
    }

    /// Builds an amount from a ledger decimal, truncating it to the asset's decimals.
    pub fn from_decimal(asset: &FungibleAsset, amount: Decimal) -> Self {
        let mantissa = BigInt::from(amount.mantissa());
        let scale = amount.scale();
        let wei = match asset.decimals.cmp(&scale) {
            Ordering::Equal => mantissa,
            Ordering::Greater => {
                mantissa * pow(BigInt::from(10u32), (asset.decimals - scale) as usize)
            }
            // BigInt division truncates toward zero.
            Ordering::Less => mantissa / pow(BigInt::from(10u32), (scale - asset.decimals) as usize),
        };
        Self { asset: asset.clone(), wei }
    }

    pub fn asset(&self) -> &FungibleAsset {
        &self.asset
    }

    /// Decimal string, truncated to the asset's decimals, without trailing zeros.
    pub fn amount(&self) -> String {
        format_wei(&self.wei, self.asset.decimals)
    }

    pub fn amount_wei(&self) -> &BigInt {
        &self.wei
    }

    /// Converts into a ledger decimal.
    ///
    /// Assets with more than 28 decimals, or amounts too large for the 96 bit mantissa, lose
    /// their least significant digits (toward zero). Only integer parts that do not fit at all
    /// are an error.
    pub fn to_decimal(&self) -> Result<Decimal, MoneyError> {
        let mut mantissa = self.wei.clone();
        let mut scale = self.asset.decimals;
        while scale > MAX_DECIMAL_SCALE {
            mantissa /= 10;
            scale -= 1;
        }
        loop {
            if let Some(value) = mantissa
                .to_i128()
                .and_then(|m| Decimal::try_from_i128_with_scale(m, scale).ok())
            {
                return Ok(value.normalize());
            }
            if scale == 0 {
                return Err(MoneyError::Overflow(self.amount()));
            }
            mantissa /= 10;
            scale -= 1;
        }
    }

    pub fn to_object(&self) -> MoneyObject {
        MoneyObject { asset: self.asset.clone(), amount: self.amount() }
    }

    /// `(asset address, smallest units)`, the shape contract calls take.
    pub fn to_values(&self) -> (Address, BigInt) {
        (self.asset.address, self.wei.clone())
    }

    pub fn set(&mut self, amount: &str) -> Result<&mut Self, MoneyError> {
        self.wei = parse_wei(amount, self.asset.decimals)?;
        Ok(self)
    }

    pub fn set_wei(&mut self, wei: impl Into<BigInt>) -> &mut Self {
        self.wei = wei.into();
        self
    }

    pub fn add_wei(&mut self, wei: impl Into<BigInt>) -> &mut Self {
        self.wei += wei.into();
        self
    }

    pub fn sub_wei(&mut self, wei: impl Into<BigInt>) -> &mut Self {
        self.wei -= wei.into();
        self
    }

    pub fn add_amount(&mut self, amount: &str) -> Result<&mut Self, MoneyError> {
        self.wei += parse_wei(amount, self.asset.decimals)?;
        Ok(self)
    }

    pub fn sub_amount(&mut self, amount: &str) -> Result<&mut Self, MoneyError> {
        self.wei -= parse_wei(amount, self.asset.decimals)?;
        Ok(self)
    }

    pub fn add(&mut self, other: &Money) -> Result<&mut Self, MoneyError> {
        self.ensure_same_asset(other)?;
        self.wei += &other.wei;
        Ok(self)
    }

    pub fn sub(&mut self, other: &Money) -> Result<&mut Self, MoneyError> {
        self.ensure_same_asset(other)?;
        self.wei -= &other.wei;
        Ok(self)
    }

    /// Same amount with `wei` smallest units subtracted, floored at zero.
    pub fn saturating_sub_wei(&self, wei: u64) -> Money {
        let mut out = self.clone();
        out.sub_wei(wei);
        if out.is_negative() {
            out.set_wei(0u32);
        }
        out
    }

    /// `self × bps / 10_000`, rounded down.
    pub fn mul_bps(&self, bps: u32) -> Money {
        Money { asset: self.asset.clone(), wei: &self.wei * BigInt::from(bps) / BigInt::from(super::BPS_BASE) }
    }

    pub fn is_zero(&self) -> bool {
        self.wei.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.wei.sign() == Sign::Minus
    }

    /// Compares amounts on their smallest-unit representation.
    pub fn cmp_amount(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.ensure_same_asset(other)?;
        Ok(self.wei.cmp(&other.wei))
    }

    pub fn min(self, other: Money) -> Result<Money, MoneyError> {
        Ok(match self.cmp_amount(&other)? {
            Ordering::Greater => other,
            _ => self,
        })
    }

    fn ensure_same_asset(&self, other: &Money) -> Result<(), MoneyError> {
        if self.asset != other.asset {
            return Err(MoneyError::different_asset(&self.asset, &other.asset));
        }
        Ok(())
    }
}

/// Amounts of different assets are unordered.
impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.cmp_amount(other).ok()
    }
}

impl TryFrom<MoneyObject> for Money {
    type Error = MoneyError;

    fn try_from(value: MoneyObject) -> Result<Self, Self::Error> {
        Money::from_object(value)
    }
}

impl From<Money> for MoneyObject {
    fn from(value: Money) -> Self {
        value.to_object()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount(), self.asset.symbol)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::asset::fixtures::{usdc, weth};

    #[rstest]
    #[case::integer("10000", 6, "10000")]
    #[case::truncates("1.23456789", 6, "1.234567")]
    #[case::rounds_down_not_half_up("0.9999999", 6, "0.999999")]
    #[case::strips_trailing_zeros("1.500000", 6, "1.5")]
    #[case::leading_dot(".5", 18, "0.5")]
    #[case::trailing_dot("3.", 18, "3")]
    #[case::negative_toward_zero("-1.2345678", 6, "-1.234567")]
    #[case::below_precision("0.0000001", 6, "0")]
    #[case::zero_decimals("12.99", 0, "12")]
    fn test_precise(#[case] input: &str, #[case] decimals: u32, #[case] expected: &str) {
        let out = precise(input, decimals).unwrap();

        assert_eq!(out, expected);
        assert_eq!(precise(&out, decimals).unwrap(), out);
    }

    #[rstest]
    #[case::empty("")]
    #[case::dot(".")]
    #[case::letters("1e5")]
    #[case::two_dots("1.2.3")]
    #[case::inner_sign("1-2")]
    fn test_precise_rejects(#[case] input: &str) {
        assert_eq!(precise(input, 6), Err(MoneyError::InvalidAmount(input.to_string())));
    }

    #[test]
    fn test_wei_round_trip() {
        let amount = Money::from_pair(&usdc(), "1234.5678919").unwrap();

        assert_eq!(amount.amount(), "1234.567891");
        assert_eq!(amount.amount_wei(), &BigInt::from(1_234_567_891u64));
        assert_eq!(Money::from_wei(&usdc(), amount.amount_wei().clone()), amount);
    }

    #[test]
    fn test_wei_arithmetic() {
        let mut amount = Money::from_pair(&weth(), "1").unwrap();
        amount.add_wei(1u32);

        assert_eq!(amount.amount(), "1.000000000000000001");

        amount.sub_wei(2u32);

        assert_eq!(amount.amount(), "0.999999999999999999");
    }

    #[test]
    fn test_add_sub() {
        let mut amount = Money::from_pair(&usdc(), "10").unwrap();
        amount
            .add(&Money::from_pair(&usdc(), "2.5").unwrap())
            .unwrap();
        amount.sub_amount("0.0000015").unwrap();

        assert_eq!(amount.amount(), "12.499999");
    }

    #[test]
    fn test_sub_below_zero() {
        let mut amount = Money::from_pair(&usdc(), "1").unwrap();
        amount.sub_amount("1.5").unwrap();

        assert!(amount.is_negative());
        assert_eq!(amount.amount(), "-0.5");
    }

    #[test]
    fn test_different_asset_fails_fast() {
        let mut amount = Money::from_pair(&usdc(), "1").unwrap();
        let other = Money::from_pair(&weth(), "1").unwrap();

        assert_eq!(amount.add(&other).unwrap_err(), MoneyError::different_asset(&usdc(), &weth()));
        assert!(amount.cmp_amount(&other).is_err());
        assert_eq!(amount.partial_cmp(&other), None);
        assert_eq!(amount.amount(), "1");
    }

    #[test]
    fn test_compares_on_wei() {
        let small = Money::from_pair(&weth(), "0.000000000000000009").unwrap();
        let large = Money::from_pair(&weth(), "0.00000000000000001").unwrap();

        assert!(small < large);
        assert_eq!(small.clone().min(large).unwrap(), small);
    }

    #[rstest]
    #[case::usdc(usdc(), "1234.567891", dec!(1234.567891))]
    #[case::weth(weth(), "0.000000000000000001", dec!(0.000000000000000001))]
    #[case::negative(usdc(), "-3.5", dec!(-3.5))]
    fn test_to_decimal(#[case] asset: FungibleAsset, #[case] amount: &str, #[case] expected: Decimal) {
        let money = Money::from_pair(&asset, amount).unwrap();

        assert_eq!(money.to_decimal().unwrap(), expected);
        assert_eq!(Money::from_decimal(&asset, expected), money);
    }

    #[test]
    fn test_to_decimal_drops_digits_that_do_not_fit() {
        let money = Money::from_pair(&weth(), "123456789012.123456789012345678").unwrap();

        let value = money.to_decimal().unwrap();

        assert_eq!(value.trunc(), dec!(123456789012));
        assert!(value > dec!(123456789012.1234));
        assert!(value < dec!(123456789012.1235));
    }

    #[test]
    fn test_from_decimal_truncates() {
        assert_eq!(Money::from_decimal(&usdc(), dec!(1.23456789)).amount(), "1.234567");
    }

    #[test]
    fn test_mul_bps() {
        let amount = Money::from_pair(&usdc(), "100").unwrap();

        assert_eq!(amount.mul_bps(9).amount(), "0.09");
        assert_eq!(amount.saturating_sub_wei(1).amount(), "99.999999");
        assert_eq!(Money::zero(&usdc()).saturating_sub_wei(1).amount(), "0");
    }

    #[test]
    fn test_serde() {
        let amount = Money::from_pair(&usdc(), "1.5").unwrap();

        let json = serde_json::to_value(&amount).unwrap();

        assert_eq!(json["amount"], "1.5");
        assert_eq!(serde_json::from_value::<Money>(json).unwrap(), amount);
    }
}
