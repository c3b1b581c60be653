//! Command handlers for each subcommand

pub mod contract;
pub mod tx;

pub use contract::*;
pub use tx::*;
