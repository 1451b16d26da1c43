use alloy::primitives::Address;
use thiserror::Error;

use crate::types::Role;

/// Errors surfaced by the rate engine.
///
/// Every operation fails atomically: an error means no state was mutated by
/// the call that produced it. Batch setters validate all inputs up front.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RatesError {
    /// Batch-operation input arrays have inconsistent lengths.
    #[error("batch input arrays have mismatched lengths")]
    ArityMismatch,

    /// Caller lacks the role required for the operation.
    #[error("caller {caller} lacks the {role:?} role")]
    Unauthorized { caller: Address, role: Role },

    /// Control info contains a zero resolution or cap.
    #[error("control info values must be nonzero")]
    InvalidControlInfo,

    /// Operation references an asset that was never registered.
    #[error("asset {0} is not registered")]
    UnknownAsset(Address),

    /// Asset registration is append-only and once-only.
    #[error("asset {0} is already registered")]
    AlreadyRegistered(Address),

    /// Compact data for the asset is older than the validity window and the
    /// engine is configured to reject stale rates.
    #[error("rate data for asset {0} is stale")]
    StaleRate(Address),

    /// Compact update blocks must fit in 32 bits.
    #[error("block number {0} exceeds the compact encoding range")]
    InvalidBlockNumber(u64),

    /// Compact-data update referenced a slot that does not exist.
    #[error("compact slot index {0} is out of range")]
    UnknownSlot(usize),

    /// Step function exceeds the maximum number of entries.
    #[error("step function has more than {max} entries", max = crate::types::MAX_STEPS_IN_FUNCTION)]
    TooManySteps,

    /// Rate fed into a bps adjustment exceeds `MAX_RATE`.
    #[error("rate exceeds the maximum adjustable rate")]
    RateOutOfBounds,

    /// Bps adjustment outside `[MIN_BPS_ADJUSTMENT, MAX_BPS_ADJUSTMENT]`.
    #[error("bps adjustment {0} is out of bounds")]
    BpsOutOfBounds(i64),

    /// Inclusive block range query with start above end.
    #[error("block range start {0} is above end {1}")]
    InvalidBlockRange(u64, u64),

    /// Quantity arithmetic overflowed the 256-bit rate computation.
    #[error("quantity computation overflowed")]
    AmountOverflow,
}
