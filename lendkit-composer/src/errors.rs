use std::io;

use lendkit_common::models::{
    error::{MoneyError, ServiceError},
    Chain,
};
use thiserror::Error;

/// Failures that abort a compound action.
///
/// Amount validation problems are not errors at this level; they are reported as
/// [`OperationError`](crate::composer::OperationError) data on a successful result.
#[derive(Error, Debug, PartialEq)]
pub enum ComposerError {
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error("Collaborator failed: {0}")]
    Service(#[from] ServiceError),
    #[error("No adapter registered for protocol {protocol_id} on {chain}")]
    UnknownProtocol { protocol_id: String, chain: Chain },
    #[error("Protocol {protocol_id} does not serve market {market_id}")]
    UnknownMarket { protocol_id: String, market_id: String },
    #[error("No {position} position for {asset} in market {market_id}")]
    UnknownAsset { position: &'static str, asset: String, market_id: String },
    #[error("Receipt {receipt} does not wrap {asset}")]
    ReceiptMismatch { receipt: String, asset: String },
    #[error("No swapper registered")]
    NoSwapper,
    #[error("No flash-loan source supports {0}")]
    NoFlashLoanSource(String),
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}
