//! Spend verification tool
//!
//! Runs a split transaction through the local script verifier:
//! - The spent input's last push is the compiled contract
//! - Every contract check passes for the given coin value
//! - Both signature checks succeed
//! - Outputs match what the payout calculator produces

use anyhow::*;
use bitcoin::{consensus::encode::deserialize, Transaction};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xec_split::commands::ContractArgs;
use xec_split::contract::{compile_script, create_outputs, verify_spend};
use xec_split::ecash_utils::derive_public_key;

/// CLI: `cargo run --bin verify_spend -- --tx <hex> --value 8000 --fee 2000 --party ...`
#[derive(Parser, Debug)]
struct Opts {
    #[command(flatten)]
    contract: ContractArgs,

    /// Raw transaction hex
    #[arg(long)]
    tx: String,

    /// Value of the spent coin in sats
    #[arg(long)]
    value: u64,

    /// Input spending the contract coin
    #[arg(long, default_value_t = 0)]
    input: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xec_split=info,verify_spend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let opts = Opts::parse();

    let tx: Transaction = deserialize(&hex::decode(opts.tx.trim())?)?;
    let sk = opts.contract.signing_key()?;
    let parties = opts.contract.parse_parties()?;
    let contract = compile_script(&derive_public_key(&sk), opts.contract.fee, &parties)?;

    eprintln!("=== Spend Verification ===\n");
    eprintln!("Txid: {}", tx.txid());
    eprintln!("Contract address: {}", contract.address());
    eprintln!("Input: {} ({} sats)", opts.input, opts.value);
    eprintln!();

    verify_spend(&tx, opts.input, opts.value, &contract)
        .with_context(|| format!("input {} rejected by the contract", opts.input))?;
    eprintln!("  ✓ Script accepted");

    let expected = create_outputs(opts.value, opts.contract.fee, &contract, &parties)?;
    ensure!(
        tx.output == expected,
        "outputs differ from the payout for {} sats",
        opts.value
    );
    eprintln!("  ✓ Outputs match payout ({} output(s))", expected.len());

    println!(
        "{}",
        serde_json::json!({ "txid": tx.txid().to_string(), "valid": true })
    );
    Ok(())
}
