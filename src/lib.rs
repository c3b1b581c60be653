//! Self-enforcing payment split contracts for eCash.
//!
//! A contract is a P2SH redeem script that only accepts spends paying every party its
//! share of the input value. The crate compiles that script, computes the matching
//! payouts off-chain and signs the spending transaction.

pub mod commands;
pub mod contract;
pub mod ecash_utils;
pub mod error;
pub mod types;

pub use error::{Error, Result, ValidationError};
