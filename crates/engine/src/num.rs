//! Truncating fixed-point arithmetic.
//!
//! Every adjustment layer applies the exact same formula,
//! `rate * (10_000 + bps) / 10_000`, with truncating 256-bit integer
//! division. Floating point is never involved, so composed adjustments are
//! reproducible bit for bit.

use alloy::primitives::U256;

use crate::{
    error::RatesError,
    types::{Bps, MAX_BPS_ADJUSTMENT, MAX_RATE, MIN_BPS_ADJUSTMENT, PRECISION},
};

const BPS_DIVISOR: u64 = 10_000;

/// Apply a basis-point adjustment to a rate.
///
/// Rejects rates above [`MAX_RATE`] and adjustments outside
/// [`MIN_BPS_ADJUSTMENT`]..=[`MAX_BPS_ADJUSTMENT`].
pub fn apply_bps(rate: U256, bps: Bps) -> Result<U256, RatesError> {
    if rate > MAX_RATE {
        return Err(RatesError::RateOutOfBounds);
    }
    if !(MIN_BPS_ADJUSTMENT..=MAX_BPS_ADJUSTMENT).contains(&bps) {
        return Err(RatesError::BpsOutOfBounds(bps));
    }

    // MIN_BPS_ADJUSTMENT == -BPS_DIVISOR, so the factor is never negative.
    let factor = (BPS_DIVISOR as i128 + bps as i128) as u128;
    Ok(rate * U256::from(factor) / U256::from(BPS_DIVISOR))
}

/// Destination quantity for a source quantity at the given rate,
/// `src_qty * rate / PRECISION`, truncating.
pub fn dst_qty(src_qty: U256, rate: U256) -> Result<U256, RatesError> {
    let scaled = src_qty.checked_mul(rate).ok_or(RatesError::AmountOverflow)?;
    Ok(scaled / PRECISION)
}

/// Narrow an unsigned quantity into signed imbalance arithmetic, saturating.
/// Over-cap values feed the step evaluator unchanged rather than failing, so
/// saturation is the correct behavior at the extreme.
pub(crate) fn saturating_i128(value: U256) -> i128 {
    const I128_MAX: U256 = U256::from_limbs([u64::MAX, i64::MAX as u64, 0, 0]);
    if value > I128_MAX { i128::MAX } else { value.to::<u128>() as i128 }
}
