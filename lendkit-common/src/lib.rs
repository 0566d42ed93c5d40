pub mod flash_loan;
pub mod models;
pub mod operation;
pub mod portfolio;
pub mod protocol;
pub mod swap;
pub mod traits;

pub use models::{
    asset::FungibleAsset,
    error::{MoneyError, ServiceError},
    money::Money,
    money_bag::MoneyBag,
    Address, Chain,
};
pub use portfolio::{HealthRate, Portfolio};
