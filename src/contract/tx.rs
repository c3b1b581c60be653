//! Transaction construction and signing for contract spends
//!
//! A spend has a single input whose script pushes everything the contract needs to check
//! the outputs: the serialized prevouts and outputs, the flagged signature, the preimage in
//! nine fragments and finally the redeem script.

use bitcoin::{
    absolute::LockTime,
    consensus::encode::serialize,
    script::{Builder, PushBytesBuf},
    transaction::Version,
    OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};
use secp256k1::SecretKey;
use tracing::{info, warn};

use super::payment::create_outputs;
use super::script::{compile_script, ContractScript};
use crate::ecash_utils::{
    derive_public_key, schnorr_sign, serialize_outputs, serialize_prevouts, Preimage,
    SIGHASH_ALL_FORKID,
};
use crate::error::{Error, Result};
use crate::types::{Party, Utxo};

/// Build and sign the transaction distributing `utxo`, checking that `fee` pays at least
/// 1 sat per byte.
pub fn create_tx(sk: &SecretKey, utxo: &Utxo, fee: u64, parties: &[Party]) -> Result<Transaction> {
    let tx = build_tx(sk, utxo, fee, parties)?;
    check_fee(&tx, fee)?;
    info!(
        txid = %tx.txid(),
        size = serialize(&tx).len(),
        outputs = tx.output.len(),
        "signed split transaction"
    );
    Ok(tx)
}

/// Same as [`create_tx`] without the fee rate check.
pub fn build_tx(sk: &SecretKey, utxo: &Utxo, fee: u64, parties: &[Party]) -> Result<Transaction> {
    let contract = compile_script(&derive_public_key(sk), fee, parties)?;
    let outputs = create_outputs(utxo.value, fee, &contract, parties)?;
    sign_spend(sk, utxo, &contract, outputs)
}

/// Sign a spend of `utxo` with arbitrary `outputs`.
///
/// Nothing checks that the contract accepts these outputs; [`create_tx`] is the way to
/// get a valid spend.
pub fn sign_spend(
    sk: &SecretKey,
    utxo: &Utxo,
    contract: &ContractScript,
    outputs: Vec<TxOut>,
) -> Result<Transaction> {
    let mut tx = unsigned_tx(utxo.outpoint, outputs);
    sign_input(sk, &mut tx, 0, utxo.value, contract)?;
    Ok(tx)
}

/// Fill in the spend script of `tx.input[input_index]`, which spends `value` sats from
/// `contract`. The pushed prevouts cover every input of `tx`.
pub fn sign_input(
    sk: &SecretKey,
    tx: &mut Transaction,
    input_index: usize,
    value: u64,
    contract: &ContractScript,
) -> Result<()> {
    let preimage = Preimage::new(tx, input_index, contract.as_bytes(), value, SIGHASH_ALL_FORKID)?;
    let mut sig = schnorr_sign(sk, &preimage.sighash())?.to_vec();
    sig.push(SIGHASH_ALL_FORKID as u8);

    let prevouts: Vec<_> = tx.input.iter().map(|i| i.previous_output).collect();
    let mut pushes = vec![serialize_prevouts(&prevouts), serialize_outputs(&tx.output), sig];
    pushes.extend(preimage.fragments().iter().map(|f| f.to_vec()));
    pushes.push(contract.as_bytes().to_vec());

    tx.input[input_index].script_sig = push_all(pushes)?;
    Ok(())
}

/// Fails when the serialized transaction is larger than `fee`.
pub fn check_fee(tx: &Transaction, fee: u64) -> Result<()> {
    let min_fee = serialize(tx).len() as u64;
    if fee < min_fee {
        warn!(fee, min_fee, "fee below 1 sat/byte");
        return Err(Error::FeeTooLow { fee, min_fee });
    }
    Ok(())
}

fn unsigned_tx(outpoint: OutPoint, outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }],
        output: outputs,
    }
}

fn push_all(pushes: Vec<Vec<u8>>) -> Result<ScriptBuf> {
    let mut builder = Builder::new();
    for data in pushes {
        builder = builder.push_slice(PushBytesBuf::try_from(data)?);
    }
    Ok(builder.into_script())
}
