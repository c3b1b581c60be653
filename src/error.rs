//! Error types shared by the contract compiler, payout calculator and signer

use thiserror::Error;

use crate::contract::interpreter::ScriptError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid private key: {0}")]
    Key(String),

    /// The signed transaction is larger than the fee can pay for at 1 sat/byte.
    #[error("the fee must be at least 1 sat per byte, that is, {min_fee} or more (got {fee})")]
    FeeTooLow { fee: u64, min_fee: u64 },

    #[error("division by zero ({numerator} / 0)")]
    DivisionByZero { numerator: u64 },

    #[error("script build error: {0}")]
    Script(String),

    #[error("spend rejected: {0}")]
    Verify(#[from] ScriptError),
}

/// Contract parameters that can never produce a valid script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the contract must have between {min} and {max} parties, got {got}")]
    PartyCount { got: usize, min: usize, max: usize },

    #[error("shares must be a value between 1 and 999, got {share} for {address}")]
    ShareRange { address: String, share: u32 },

    #[error("shares must add to 1000, got {total}")]
    ShareTotal { total: u64 },

    #[error("the fee must be between 1 and {max}, got {fee}")]
    FeeRange { fee: u64, max: u64 },

    #[error("only ecash addresses are acceptable, got {prefix} for {address}")]
    AddressPrefix { address: String, prefix: String },

    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("invalid utxo {utxo}: {reason}")]
    Utxo { utxo: String, reason: String },
}

impl From<bitcoin::script::PushBytesError> for Error {
    fn from(e: bitcoin::script::PushBytesError) -> Self {
        Self::Script(e.to_string())
    }
}

impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Self {
        Self::Key(e.to_string())
    }
}
