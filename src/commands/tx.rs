//! Tx command: sign the split transaction for one coin at the contract address
use anyhow::*;
use tracing::info;

use super::contract::ContractArgs;
use crate::contract::{create_tx, summarize_spend};
use crate::types::*;

#[derive(clap::Parser, Debug)]
pub struct TxOpts {
    #[command(flatten)]
    pub contract: ContractArgs,
    /// Coin to spend, `<txid>:<vout>`
    #[arg(long)]
    pub utxo: String,
    /// Value of the coin in sats
    #[arg(long)]
    pub value: u64,
}

pub fn run_tx(o: TxOpts) -> Result<()> {
    let sk = o.contract.signing_key()?;
    let parties = o.contract.parse_parties()?;
    let utxo = Utxo::parse(&o.utxo, o.value)?;
    ensure!(utxo.value > 0, "--value must be positive");

    let tx = create_tx(&sk, &utxo, o.contract.fee, &parties)
        .with_context(|| format!("cannot spend {}", o.utxo))?;
    let summary = summarize_spend(&tx);
    info!(txid = %summary.txid, size = summary.size, "built split transaction");

    for output in &summary.outputs {
        eprintln!("  {} sats -> {}", output.value, output.script);
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
