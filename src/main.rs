//! eCash split contract tool - Main CLI Entry Point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xec_split::commands::*;

#[derive(Parser, Debug)]
#[command(name = "xec_split", about = "eCash split contracts: contract addresses and signed payouts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Compile a contract and print its address, hash and value limits
    Contract(ContractOpts),
    /// Sign the transaction distributing one coin held by a contract
    Tx(TxOpts),
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xec_split=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Contract(o) => run_contract(o),
        Commands::Tx(o) => run_tx(o),
    }
}
