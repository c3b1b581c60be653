//! Canonical encodings checked byte-for-byte by the contract script

use bitcoin::{
    consensus::encode::{deserialize_partial, serialize},
    OutPoint, TxOut,
};

use crate::error::{Error, Result};

/// Serialize outpoints as the concatenation hashed into hashPrevouts:
/// 32-byte txid in internal (reversed) order followed by the 4-byte little-endian index.
pub fn serialize_prevouts(prevouts: &[OutPoint]) -> Vec<u8> {
    let mut out = Vec::with_capacity(36 * prevouts.len());
    for prevout in prevouts {
        out.extend_from_slice(&serialize(prevout));
    }
    out
}

/// Serialize outputs as the concatenation hashed into hashOutputs:
/// 8-byte little-endian value followed by the compact-size-prefixed locking script.
pub fn serialize_outputs(outputs: &[TxOut]) -> Vec<u8> {
    let mut out = Vec::new();
    for output in outputs {
        out.extend_from_slice(&serialize(output));
    }
    out
}

/// Inverse of [`serialize_outputs`].
pub fn deserialize_outputs(mut bytes: &[u8]) -> Result<Vec<TxOut>> {
    let mut outputs = Vec::new();
    while !bytes.is_empty() {
        let (output, used) = deserialize_partial::<TxOut>(bytes)
            .map_err(|e| Error::Script(format!("malformed output list: {e}")))?;
        outputs.push(output);
        bytes = &bytes[used..];
    }
    Ok(outputs)
}

/// CompactSize (Bitcoin varint)
pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=252 => out.push(n as u8),
        253..=0xFFFF => {
            out.push(253);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(254);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(255);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Minimal script number encoding: little-endian magnitude with the sign in the top bit
/// of the last byte, adding a byte when the magnitude already uses it. Zero is empty.
///
/// Script arithmetic only accepts results of at most 4 bytes; callers pushing literals
/// for arithmetic must stay within that range.
pub fn encode_script_num(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }

    let negative = n < 0;
    let mut magnitude = n.unsigned_abs();
    let mut out = Vec::with_capacity(9);
    while magnitude > 0 {
        out.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }

    // out is non-empty since n != 0
    let last = out.len() - 1;
    if out[last] & 0x80 != 0 {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        out[last] |= 0x80;
    }
    out
}
