use std::{fs, path::Path};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lendkit_common::portfolio::HEALTHY_THRESHOLD;

use crate::errors::ConfigError;

/// Tunables shared by every compound action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Used when an action does not pass its own slippage.
    default_slippage_bps: u32,
    /// Smallest units held back from amounts crossing a withdraw→swap boundary, and added to the
    /// withdraw that settles a deleverage flash loan.
    withdraw_slack_wei: u64,
    /// Smallest units added to swap outputs that feed a repay.
    repay_slack_wei: u64,
    /// Projected health rates at or below this are flagged `UNHEALTHY`.
    health_margin: Decimal,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            default_slippage_bps: 100,
            withdraw_slack_wei: 1,
            repay_slack_wei: 2,
            health_margin: HEALTHY_THRESHOLD,
        }
    }
}

impl ComposerConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn default_slippage_bps(&self) -> u32 {
        self.default_slippage_bps
    }

    pub fn withdraw_slack_wei(&self) -> u64 {
        self.withdraw_slack_wei
    }

    pub fn repay_slack_wei(&self) -> u64 {
        self.repay_slack_wei
    }

    pub fn health_margin(&self) -> Decimal {
        self.health_margin
    }

    pub fn with_default_slippage_bps(mut self, default_slippage_bps: u32) -> Self {
        self.default_slippage_bps = default_slippage_bps;
        self
    }

    pub fn with_withdraw_slack_wei(mut self, withdraw_slack_wei: u64) -> Self {
        self.withdraw_slack_wei = withdraw_slack_wei;
        self
    }

    pub fn with_repay_slack_wei(mut self, repay_slack_wei: u64) -> Self {
        self.repay_slack_wei = repay_slack_wei;
        self
    }

    pub fn with_health_margin(mut self, health_margin: Decimal) -> Self {
        self.health_margin = health_margin;
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ComposerConfig::default();

        assert_eq!(config.default_slippage_bps(), 100);
        assert_eq!(config.withdraw_slack_wei(), 1);
        assert_eq!(config.repay_slack_wei(), 2);
        assert_eq!(config.health_margin(), dec!(1.0001));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
default_slippage_bps: 30
health_margin: "1.05"
"#;

        let config = ComposerConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(
            config,
            ComposerConfig::default()
                .with_default_slippage_bps(30)
                .with_health_margin(dec!(1.05))
        );
    }

    #[test]
    fn test_invalid_yaml() {
        let err = ComposerConfig::from_yaml_str("default_slippage_bps: lots").unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
