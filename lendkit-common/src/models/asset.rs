use std::{
    fmt,
    hash::{Hash, Hasher},
};

use num_bigint::BigUint;
use num_traits::pow;
use serde::{Deserialize, Serialize};

use super::{Address, Chain};

/// Sentinel address used by routers and aggregators for the chain's native currency.
pub const NATIVE_ADDRESS: Address = Address::new([0xee; 20]);

/// A fungible asset on a specific chain.
///
/// Identity is `(chain, address)`: two descriptors that only differ in their symbol or name
/// compare equal.
#[derive(Debug, Clone, Deserialize, Serialize, Eq)]
pub struct FungibleAsset {
    pub chain: Chain,
    pub address: Address,
    pub decimals: u32,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
}

impl FungibleAsset {
    pub fn new(chain: Chain, address: Address, decimals: u32, symbol: &str, name: &str) -> Self {
        Self { chain, address, decimals, symbol: symbol.to_string(), name: name.to_string() }
    }

    /// The native currency of `chain` (ETH, BNB, MATIC, ...) using the router sentinel address.
    pub fn native(chain: Chain, symbol: &str, name: &str) -> Self {
        Self::new(chain, NATIVE_ADDRESS, 18, symbol, name)
    }

    pub fn is_native(&self) -> bool {
        self.address == NATIVE_ADDRESS
    }

    /// One whole unit of this asset in its smallest unit.
    pub fn one(&self) -> BigUint {
        pow(BigUint::from(10u32), self.decimals as usize)
    }
}

impl PartialEq for FungibleAsset {
    fn eq(&self, other: &Self) -> bool {
        self.chain == other.chain && self.address == other.address
    }
}

impl Hash for FungibleAsset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain.hash(state);
        self.address.hash(state);
    }
}

impl PartialOrd for FungibleAsset {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FungibleAsset {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.chain, self.address).cmp(&(other.chain, other.address))
    }
}

impl fmt::Display for FungibleAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.symbol, self.address)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use alloy_primitives::address;

    use super::*;

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
}
