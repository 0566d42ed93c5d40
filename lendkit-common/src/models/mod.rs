pub mod asset;
pub mod error;
pub mod money;
pub mod money_bag;
pub mod position;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Address literal type to uniquely identify tokens, contracts and accounts on a chain.
pub type Address = alloy_primitives::Address;

/// Protocol id literal type, e.g. `aave-v3` or `compound-v3`.
pub type ProtocolId = String;

/// Market id literal type. Single-market protocols use their chain name as market id.
pub type MarketId = String;

/// Basis points denominator. `BPS_BASE` bps is 100%.
pub const BPS_BASE: u32 = 10_000;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Chain {
    #[default]
    Ethereum,
    Optimism,
    Bsc,
    Gnosis,
    Polygon,
    ZkSync,
    Metis,
    Base,
    Arbitrum,
    Avalanche,
}

impl Chain {
    /// EIP-155 chain id.
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Optimism => 10,
            Chain::Bsc => 56,
            Chain::Gnosis => 100,
            Chain::Polygon => 137,
            Chain::ZkSync => 324,
            Chain::Metis => 1088,
            Chain::Base => 8453,
            Chain::Arbitrum => 42161,
            Chain::Avalanche => 43114,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Chain> {
        [
            Chain::Ethereum,
            Chain::Optimism,
            Chain::Bsc,
            Chain::Gnosis,
            Chain::Polygon,
            Chain::ZkSync,
            Chain::Metis,
            Chain::Base,
            Chain::Arbitrum,
            Chain::Avalanche,
        ]
        .into_iter()
        .find(|chain| chain.chain_id() == chain_id)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::ethereum(Chain::Ethereum, 1)]
    #[case::arbitrum(Chain::Arbitrum, 42161)]
    #[case::zksync(Chain::ZkSync, 324)]
    fn test_chain_id(#[case] chain: Chain, #[case] id: u64) {
        assert_eq!(chain.chain_id(), id);
        assert_eq!(Chain::from_chain_id(id), Some(chain));
    }

    #[test]
    fn test_chain_from_str() {
        assert_eq!(Chain::from_str("polygon").unwrap(), Chain::Polygon);
        assert_eq!(Chain::Base.to_string(), "base");
        assert!(Chain::from_chain_id(5).is_none());
    }
}
