//! CashAddr encoding for eCash addresses
//!
//! `<prefix>:<base32 payload>` where the payload is a version byte, a 160-bit hash and
//! a 40-bit BCH checksum over the prefix and payload.

use bitcoin::{opcodes::all::*, script::Builder, ScriptBuf};

use crate::error::ValidationError;
use crate::types::ECASH_PREFIX;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

const VERSION_P2PKH: u8 = 0x00;
const VERSION_P2SH: u8 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    P2pkh,
    P2sh,
}

/// A decoded CashAddr with 160-bit hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashAddress {
    pub prefix: String,
    pub kind: AddressKind,
    pub hash: [u8; 20],
}

impl CashAddress {
    pub fn new(prefix: &str, kind: AddressKind, hash: [u8; 20]) -> Self {
        Self {
            prefix: prefix.to_string(),
            kind,
            hash,
        }
    }

    /// Decode an address; a missing prefix is taken to be `ecash`.
    pub fn decode(address: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::Address {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let (prefix, payload) = match address.rsplit_once(':') {
            Some((prefix, payload)) => (prefix, payload),
            None => (ECASH_PREFIX, address),
        };

        let has_lower = address.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = address.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(invalid("mixed case"));
        }
        let prefix = prefix.to_ascii_lowercase();
        let payload = payload.to_ascii_lowercase();

        let mut data = Vec::with_capacity(payload.len());
        for c in payload.bytes() {
            let value = CHARSET
                .iter()
                .position(|&x| x == c)
                .ok_or_else(|| invalid("invalid character"))?;
            data.push(value as u8);
        }
        if data.len() <= 8 {
            return Err(invalid("too short"));
        }
        if polymod(&checksum_input(&prefix, &data)) != 0 {
            return Err(invalid("bad checksum"));
        }

        let raw = convert_bits(&data[..data.len() - 8], 5, 8, false)
            .ok_or_else(|| invalid("bad padding"))?;
        if raw.len() != 21 {
            return Err(invalid("only 160-bit hashes are supported"));
        }
        let kind = match raw[0] {
            VERSION_P2PKH => AddressKind::P2pkh,
            VERSION_P2SH => AddressKind::P2sh,
            _ => return Err(invalid("unknown address type")),
        };

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&raw[1..]);
        Ok(Self { prefix, kind, hash })
    }

    pub fn encode(&self) -> String {
        let version = match self.kind {
            AddressKind::P2pkh => VERSION_P2PKH,
            AddressKind::P2sh => VERSION_P2SH,
        };
        let mut raw = Vec::with_capacity(21);
        raw.push(version);
        raw.extend_from_slice(&self.hash);

        // padding is allowed when encoding, so this always succeeds
        let mut data = convert_bits(&raw, 8, 5, true).unwrap_or_default();
        let mut input = checksum_input(&self.prefix, &data);
        input.extend_from_slice(&[0u8; 8]);
        let checksum = polymod(&input);
        for i in 0..8 {
            data.push(((checksum >> (5 * (7 - i))) & 0x1f) as u8);
        }

        let payload: String = data.iter().map(|&d| CHARSET[d as usize] as char).collect();
        format!("{}:{}", self.prefix, payload)
    }

    /// Locking script paying this address.
    pub fn script_pubkey(&self) -> ScriptBuf {
        match self.kind {
            AddressKind::P2pkh => Builder::new()
                .push_opcode(OP_DUP)
                .push_opcode(OP_HASH160)
                .push_slice(self.hash)
                .push_opcode(OP_EQUALVERIFY)
                .push_opcode(OP_CHECKSIG)
                .into_script(),
            AddressKind::P2sh => p2sh_script(&self.hash),
        }
    }
}

/// `OP_HASH160 <hash> OP_EQUAL`
pub fn p2sh_script(hash: &[u8; 20]) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_HASH160)
        .push_slice(hash)
        .push_opcode(OP_EQUAL)
        .into_script()
}

fn checksum_input(prefix: &str, data: &[u8]) -> Vec<u8> {
    let mut input: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    input.push(0);
    input.extend_from_slice(data);
    input
}

fn polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ d as u64;
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max = (1u32 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for &value in data {
        acc = (acc << from) | value as u32;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max) != 0 {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_p2pkh_script() {
        let addr = CashAddress::decode("ecash:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc").unwrap();
        assert_eq!(addr.kind, AddressKind::P2pkh);
        assert_eq!(
            hex::encode(addr.script_pubkey().as_bytes()),
            "76a914147c021a6995105ea0e62762b23f5497520d555688ac"
        );

        let token = CashAddress::decode("etoken:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cg7f3czj0").unwrap();
        assert_eq!(token.prefix, "etoken");
        assert_eq!(token.script_pubkey(), addr.script_pubkey());
    }

    #[test]
    fn test_p2sh_script() {
        let addr = CashAddress::decode("ecash:prfhcnyqnl5cgrnmlfmms675w93ld7mvvqd0y8lz07").unwrap();
        assert_eq!(addr.kind, AddressKind::P2sh);
        assert_eq!(
            hex::encode(addr.script_pubkey().as_bytes()),
            "a914d37c4c809fe9840e7bfa77b86bd47163f6fb6c6087"
        );
    }

    #[test]
    fn test_encode_matches_decode() {
        for s in [
            "ecash:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc",
            "ecash:prfhcnyqnl5cgrnmlfmms675w93ld7mvvqd0y8lz07",
            "etoken:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cg7f3czj0",
        ] {
            assert_eq!(CashAddress::decode(s).unwrap().encode(), s);
        }
    }

    #[test]
    fn test_missing_prefix_defaults_to_ecash() {
        let addr = CashAddress::decode("qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc").unwrap();
        assert_eq!(addr.prefix, "ecash");
    }

    #[test]
    fn test_invalid_fails() {
        assert!(CashAddress::decode("ecash:qr0").is_err());
        assert!(CashAddress::decode("ecash:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kd").is_err());
        assert!(CashAddress::decode("ecash:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kb").is_err());
        assert!(CashAddress::decode("ecash:QQ28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc").is_err());
    }
}
