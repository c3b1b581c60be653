//! Share arithmetic shared by the payout calculator and the script compiler

use crate::error::{Error, Result};
use crate::types::{Party, DUST_THRESHOLD};

/// Floor division on integers; never goes through floating point.
pub fn exact_quotient(numerator: u64, divisor: u64) -> Result<u64> {
    numerator
        .checked_div(divisor)
        .ok_or(Error::DivisionByZero { numerator })
}

/// Smallest unit `u` such that `u * share` reaches the dust threshold, i.e.
/// `ceil(546 / share)`.
pub fn min_unit_for_share(share: u32) -> Result<u64> {
    let share = share as u64;
    let unit = exact_quotient(DUST_THRESHOLD, share)?;
    Ok(if DUST_THRESHOLD % share == 0 { unit } else { unit + 1 })
}

/// Unit below which no party can be paid.
///
/// The largest share reaches the dust threshold with the smallest unit, so this single
/// value lets the script decide between paying and the no-payout output without
/// tracking which parties were paid.
pub fn min_unit_for_all_shares(parties: &[Party]) -> Result<u64> {
    let largest = parties.iter().map(|p| p.share).max().unwrap_or(0);
    min_unit_for_share(largest)
}
