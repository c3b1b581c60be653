//! eCash utilities: addresses, opcodes, canonical encoding, keys, sighash and Schnorr signing

pub mod cashaddr;
pub mod encode;
pub mod keys;
pub mod opcodes;
pub mod schnorr;
pub mod sighash;

pub use cashaddr::*;
pub use encode::*;
pub use keys::*;
pub use schnorr::*;
pub use sighash::*;
