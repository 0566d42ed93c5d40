use std::{fs, path::PathBuf};

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use lendkit_common::{models::Address, portfolio::Portfolio};

use crate::config::ComposerConfig;

/// Lending position inspector
///
/// Loads a serialized ledger and reports its aggregates and leverage limits.
#[derive(Parser, PartialEq, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone()
    }
}

#[derive(Subcommand, Clone, PartialEq, Debug)]
pub enum Command {
    /// Prints the aggregates, utilization, health rate and net APY of a ledger.
    Inspect(InspectArgs),
    /// Prints the maximum leverage reachable by looping one supplied asset.
    MaxLeverage(MaxLeverageArgs),
}

#[derive(Args, Clone, PartialEq, Eq, Debug)]
pub struct InspectArgs {
    /// Path to a JSON ledger snapshot
    #[clap(long, env = "LENDKIT_PORTFOLIO")]
    pub portfolio: PathBuf,

    /// Path to a YAML composer configuration
    #[clap(long, env = "LENDKIT_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Clone, PartialEq, Eq, Debug)]
pub struct MaxLeverageArgs {
    /// Path to a JSON ledger snapshot
    #[clap(long, env = "LENDKIT_PORTFOLIO")]
    pub portfolio: PathBuf,

    /// Address of the supplied asset
    #[clap(long)]
    pub asset: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectReport {
    pub protocol_id: String,
    pub market_id: String,
    pub total_supply_usd: Decimal,
    pub total_collateral_usd: Decimal,
    pub total_borrow_usd: Decimal,
    pub total_borrow_capacity_usd: Decimal,
    pub available_borrow_capacity_usd: Decimal,
    pub liquidation_limit: Decimal,
    pub utilization: Decimal,
    pub health_rate: String,
    pub healthy: bool,
    pub net_apy: Decimal,
}

impl InspectReport {
    pub fn new(portfolio: &Portfolio, config: &ComposerConfig) -> Self {
        Self {
            protocol_id: portfolio.protocol_id().to_string(),
            market_id: portfolio.market_id().to_string(),
            total_supply_usd: portfolio.total_supply_usd(),
            total_collateral_usd: portfolio.total_collateral_usd(),
            total_borrow_usd: portfolio.total_borrow_usd(),
            total_borrow_capacity_usd: portfolio.total_borrow_capacity_usd(),
            available_borrow_capacity_usd: portfolio.available_borrow_capacity_usd(),
            liquidation_limit: portfolio.liquidation_limit(),
            utilization: portfolio.utilization(),
            health_rate: portfolio.health_rate().to_string(),
            healthy: portfolio.is_healthy_with(config.health_margin()),
            net_apy: portfolio.net_apy(),
        }
    }
}

pub fn load_portfolio(path: &PathBuf) -> Result<Portfolio, anyhow::Error> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read ledger from {}", path.display()))?;
    let portfolio: Portfolio = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse ledger in {}", path.display()))?;
    debug!(
        protocol_id = portfolio.protocol_id(),
        market_id = portfolio.market_id(),
        supplies = portfolio.supplies().len(),
        borrows = portfolio.borrows().len(),
        "Loaded ledger"
    );
    Ok(portfolio)
}

pub fn inspect(args: &InspectArgs) -> Result<InspectReport, anyhow::Error> {
    let config = match &args.config {
        Some(path) => ComposerConfig::from_yaml(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ComposerConfig::default(),
    };
    let portfolio = load_portfolio(&args.portfolio)?;
    Ok(InspectReport::new(&portfolio, &config))
}

pub fn max_leverage(args: &MaxLeverageArgs) -> Result<Decimal, anyhow::Error> {
    let portfolio = load_portfolio(&args.portfolio)?;
    let supply = portfolio
        .supplies()
        .iter()
        .find(|supply| supply.asset.address == args.asset)
        .ok_or_else(|| anyhow!("no supply position for {}", args.asset))?;
    portfolio
        .calc_max_leverage_times(&supply.asset)
        .ok_or_else(|| anyhow!("{} has no leverage limit at ltv {}", supply.asset, supply.ltv))
}

pub fn run(cli: Cli) -> Result<(), anyhow::Error> {
    match cli.command() {
        Command::Inspect(args) => {
            let report = inspect(&args)?;
            info!(market_id = %report.market_id, health_rate = %report.health_rate, "Inspected ledger");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::MaxLeverage(args) => {
            let times = max_leverage(&args)?;
            println!("{}", times.round_dp(4).normalize());
        }
    }
    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use std::{env, str::FromStr};

    use alloy_primitives::address;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::testing;

    fn write_fixture(name: &str, contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("lendkit-{}-{name}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_arg_parsing_inspect_cmd() {
        let cli = Cli::try_parse_from([
            "lendkit",
            "inspect",
            "--portfolio",
            "ledger.json",
            "--config",
            "composer.yaml",
        ])
        .expect("parse errored");

        assert_eq!(
            cli.command(),
            Command::Inspect(InspectArgs {
                portfolio: PathBuf::from("ledger.json"),
                config: Some(PathBuf::from("composer.yaml")),
            })
        );
    }

    #[test]
    fn test_arg_parsing_max_leverage_cmd() {
        let cli = Cli::try_parse_from([
            "lendkit",
            "max-leverage",
            "--portfolio",
            "ledger.json",
            "--asset",
            "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
        ])
        .expect("parse errored");

        assert_eq!(
            cli.command(),
            Command::MaxLeverage(MaxLeverageArgs {
                portfolio: PathBuf::from("ledger.json"),
                asset: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            })
        );
    }

    #[test]
    fn test_arg_parsing_rejects_bad_address() {
        let res = Cli::try_parse_from([
            "lendkit",
            "max-leverage",
            "--portfolio",
            "ledger.json",
            "--asset",
            "weth",
        ]);

        assert!(res.is_err());
    }

    #[test]
    fn test_inspect_reports_aggregates() {
        let ledger = serde_json::to_string(&testing::portfolio()).unwrap();
        let portfolio = write_fixture("inspect.json", &ledger);
        let config = write_fixture("inspect.yaml", "health_margin: \"2.5\"\n");

        let report = inspect(&InspectArgs { portfolio, config: Some(config) }).unwrap();

        assert_eq!(report.market_id, testing::MARKET_ID);
        assert_eq!(report.total_supply_usd, dec!(10000));
        assert_eq!(report.total_borrow_usd, dec!(2000));
        assert_eq!(report.health_rate, "4.25");
        assert!(report.healthy);
    }

    #[test]
    fn test_max_leverage_of_supplied_asset() {
        let ledger = serde_json::to_string(&testing::portfolio()).unwrap();
        let portfolio = write_fixture("leverage.json", &ledger);

        let times = max_leverage(&MaxLeverageArgs { portfolio, asset: testing::usdc().address })
            .unwrap();

        assert_eq!(times, dec!(5));
    }

    #[test]
    fn test_max_leverage_unknown_asset() {
        let ledger = serde_json::to_string(&testing::portfolio()).unwrap();
        let portfolio = write_fixture("unknown.json", &ledger);

        let err = max_leverage(&MaxLeverageArgs {
            portfolio,
            asset: Address::from_str("0x0000000000000000000000000000000000000001").unwrap(),
        })
        .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("no supply position"));
    }
}
