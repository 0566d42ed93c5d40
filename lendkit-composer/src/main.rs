use clap::Parser;
use tracing_subscriber::EnvFilter;

use lendkit_composer::cli::{run, Cli};

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    run(Cli::parse())
}
