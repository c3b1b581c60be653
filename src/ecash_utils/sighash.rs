//! BIP143-style signature preimage with the eCash FORKID flag
//!
//! The contract script receives this preimage in pieces, so it is kept as named
//! fields rather than a flat buffer.

use bitcoin::{
    consensus::encode::serialize,
    hashes::{sha256d, Hash},
    Transaction,
};

use super::encode::{serialize_outputs, serialize_prevouts, write_compact_size};
use crate::error::{Error, Result};

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_FORKID: u32 = 0x40;
/// Commits to every input outpoint and every output.
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

/// Number of pushes the preimage is split into for the spend script.
pub const PREIMAGE_FRAGMENTS: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preimage {
    pub version: [u8; 4],
    pub hash_prevouts: [u8; 32],
    pub hash_sequence: [u8; 32],
    pub outpoint: [u8; 36],
    /// Compact-size-prefixed script code.
    pub script_code: Vec<u8>,
    pub value: [u8; 8],
    pub sequence: [u8; 4],
    pub hash_outputs: [u8; 32],
    /// Lock time followed by the 4-byte sighash type; the script never splits these.
    pub lock_time_and_type: [u8; 8],
}

impl Preimage {
    /// Build the preimage for one input spending `value` with `script_code`.
    pub fn new(
        tx: &Transaction,
        input_index: usize,
        script_code: &[u8],
        value: u64,
        sighash_type: u32,
    ) -> Result<Self> {
        let input = tx.input.get(input_index).ok_or_else(|| {
            Error::Script(format!(
                "input index {input_index} out of bounds for {} inputs",
                tx.input.len()
            ))
        })?;

        let prevouts: Vec<_> = tx.input.iter().map(|i| i.previous_output).collect();
        let mut sequences = Vec::with_capacity(4 * tx.input.len());
        for i in &tx.input {
            sequences.extend_from_slice(&i.sequence.0.to_le_bytes());
        }

        let mut outpoint = [0u8; 36];
        outpoint.copy_from_slice(&serialize(&input.previous_output));

        let mut code = Vec::with_capacity(script_code.len() + 3);
        write_compact_size(&mut code, script_code.len() as u64);
        code.extend_from_slice(script_code);

        let mut lock_time_and_type = [0u8; 8];
        lock_time_and_type[..4].copy_from_slice(&tx.lock_time.to_consensus_u32().to_le_bytes());
        lock_time_and_type[4..].copy_from_slice(&sighash_type.to_le_bytes());

        Ok(Self {
            version: tx.version.0.to_le_bytes(),
            hash_prevouts: sha256d::Hash::hash(&serialize_prevouts(&prevouts)).to_byte_array(),
            hash_sequence: sha256d::Hash::hash(&sequences).to_byte_array(),
            outpoint,
            script_code: code,
            value: value.to_le_bytes(),
            sequence: input.sequence.0.to_le_bytes(),
            hash_outputs: sha256d::Hash::hash(&serialize_outputs(&tx.output)).to_byte_array(),
            lock_time_and_type,
        })
    }

    /// The preimage in the order the contract script expects its pushes.
    pub fn fragments(&self) -> [&[u8]; PREIMAGE_FRAGMENTS] {
        [
            &self.version,
            &self.hash_prevouts,
            &self.hash_sequence,
            &self.outpoint,
            &self.script_code,
            &self.value,
            &self.sequence,
            &self.hash_outputs,
            &self.lock_time_and_type,
        ]
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.fragments().concat()
    }

    /// Double SHA-256 of the preimage, the message that gets signed.
    pub fn sighash(&self) -> [u8; 32] {
        sha256d::Hash::hash(&self.to_bytes()).to_byte_array()
    }
}
