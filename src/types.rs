//! Shared data structures and types

use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ── Constants ────────────────────────────────────────────────────────────────

/// Smallest output value the network relays.
pub const DUST_THRESHOLD: u64 = 546;

/// Shares are expressed in thousandths.
pub const SHARE_TOTAL: u64 = 1000;

pub const MIN_PARTIES: usize = 2;
pub const MAX_PARTIES: usize = 3;

/// Largest input value the script can distribute (largest positive 4-byte script number).
pub const MAX_VALUE: u64 = 0x7fff_ffff;

/// 0x7fffffff - 0xffffff - 0xffffff: the fee is added to the sum of two 24-bit limbs and the
/// result must still be a 4-byte script number.
pub const MAX_FEE: u64 = 2_113_929_217;

/// Key used to sign every split. It can be public because the script allows a single
/// combination of outputs per coin; knowing it only lets someone run the split early.
///
/// address: ecash:qqvvpj6k6u2klccpag6nfpt6k53yl9uwcvt0qecxej
pub const CONTRACT_PRV_KEY: &str = "57607b06ad855ecf808440130a2b466c1ce5fca269dff8a92b69697216460d6e";

pub const ECASH_PREFIX: &str = "ecash";

// ── Contract Types ───────────────────────────────────────────────────────────

/// A payee and its share of every distributed value, in thousandths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub address: String,
    pub share: u32,
}

impl Party {
    pub fn new(address: impl Into<String>, share: u32) -> Self {
        Self {
            address: address.into(),
            share,
        }
    }
}

/// A coin sitting at the contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub value: u64,
}

impl Utxo {
    pub fn new(txid: Txid, vout: u32, value: u64) -> Self {
        Self {
            outpoint: OutPoint { txid, vout },
            value,
        }
    }

    /// Parse `<txid>:<vout>` as accepted by the API and the CLI.
    pub fn parse(utxo: &str, value: u64) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::Utxo {
            utxo: utxo.to_string(),
            reason: reason.to_string(),
        };

        let (txid, vout) = utxo
            .split_once(':')
            .ok_or_else(|| invalid("expected <txid>:<vout>"))?;
        if txid.len() != 64 || !txid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("txid must be 64 hex characters"));
        }
        let txid: Txid = txid.parse().map_err(|_| invalid("bad txid"))?;
        let vout: u32 = vout.parse().map_err(|_| invalid("bad output index"))?;
        Ok(Self::new(txid, vout, value))
    }
}

// ── Response Types ───────────────────────────────────────────────────────────

/// Everything a client needs to publish and fund a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSummary {
    pub address: String,
    pub hash: String,
    pub fee: u64,
    pub parties: Vec<Party>,
    /// Below this value the split transaction cannot pay 1 sat/byte.
    pub dust_value: u64,
    /// Smallest value that pays at least one party.
    pub min_value: u64,
    pub max_value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSummary {
    pub value: u64,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendSummary {
    pub tx: String,
    pub txid: String,
    pub size: usize,
    pub outputs: Vec<OutputSummary>,
}
