//! Payout calculator
//!
//! Mirrors the arithmetic the contract script performs on chain. The outputs returned
//! here are the only ones the script accepts for a given coin.

use bitcoin::{opcodes::all::OP_RETURN, script::Builder, Amount, TxOut};
use tracing::debug;

use super::script::{validate_contract, ContractScript};
use super::shares::{exact_quotient, min_unit_for_all_shares};
use crate::error::Result;
use crate::types::{Party, DUST_THRESHOLD, MAX_VALUE, SHARE_TOTAL};

/// How a coin's value gets paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutMode {
    /// Too large for script arithmetic: two outputs back to the contract.
    Split,
    /// Each party whose part clears dust is paid `unit * share`.
    Distribute { unit: u64 },
    /// Nobody clears dust: a single zero-value `OP_RETURN` output.
    NoPayout,
}

impl PayoutMode {
    pub fn for_value(value: u64, fee: u64, parties: &[Party]) -> Result<Self> {
        if value > MAX_VALUE {
            return Ok(Self::Split);
        }
        let Some(net) = value.checked_sub(fee) else {
            return Ok(Self::NoPayout);
        };
        let unit = exact_quotient(net, SHARE_TOTAL)?;
        if unit < min_unit_for_all_shares(parties)? {
            return Ok(Self::NoPayout);
        }
        Ok(Self::Distribute { unit })
    }
}

/// Zero-value output with a bare `OP_RETURN` locking script.
pub fn no_payout_output() -> TxOut {
    TxOut {
        value: Amount::ZERO,
        script_pubkey: Builder::new().push_opcode(OP_RETURN).into_script(),
    }
}

/// Outputs of the transaction spending a `value` coin held by `contract`.
pub fn create_outputs(
    value: u64,
    fee: u64,
    contract: &ContractScript,
    parties: &[Party],
) -> Result<Vec<TxOut>> {
    let addresses = validate_contract(fee, parties)?;
    let mode = PayoutMode::for_value(value, fee, parties)?;
    debug!(value, fee, ?mode, "payout mode");

    let outputs = match mode {
        PayoutMode::Split => {
            // value > MAX_VALUE >= fee
            let net = value - fee;
            let second = exact_quotient(net, 2)?;
            vec![
                TxOut {
                    value: Amount::from_sat(net - second),
                    script_pubkey: contract.script_pubkey(),
                },
                TxOut {
                    value: Amount::from_sat(second),
                    script_pubkey: contract.script_pubkey(),
                },
            ]
        }
        PayoutMode::Distribute { unit } => parties
            .iter()
            .zip(&addresses)
            .map(|(party, address)| (unit * party.share as u64, address))
            .filter(|(amount, _)| *amount >= DUST_THRESHOLD)
            .map(|(amount, address)| TxOut {
                value: Amount::from_sat(amount),
                script_pubkey: address.script_pubkey(),
            })
            .collect(),
        PayoutMode::NoPayout => Vec::new(),
    };

    if outputs.is_empty() {
        return Ok(vec![no_payout_output()]);
    }
    Ok(outputs)
}
