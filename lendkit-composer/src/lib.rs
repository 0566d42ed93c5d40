pub mod cli;
pub mod composer;
pub mod config;
pub mod errors;
pub mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use composer::{Action, ActionOutput, ActionParams, AmountField, Composer, ErrorCode, OperationError};
pub use config::ComposerConfig;
pub use errors::ComposerError;
pub use registry::Registry;
