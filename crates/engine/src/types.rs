use alloy::primitives::{Address, U256};

/// A listed asset, identified by its token contract address.
/// The base currency uses a sentinel address by convention of the caller.
pub type Asset = Address;

/// Chain height. The engine never reads a wall clock; block numbers supplied
/// by the caller are the only time source.
pub type BlockNumber = u64;

/// Basis-point adjustment, units of 1/10_000.
pub type Bps = i64;

/// Fixed-point rate unit: rates are expressed per `PRECISION` of source.
pub const PRECISION: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Upper bound on any rate the engine will adjust (10^24).
pub const MAX_RATE: U256 = U256::from_limbs([2_003_764_205_206_896_640, 54_210, 0, 0]);

/// A rate cannot be adjusted down by more than 100%.
pub const MIN_BPS_ADJUSTMENT: Bps = -10_000;

/// Upper bound on a single bps adjustment (10^11).
pub const MAX_BPS_ADJUSTMENT: Bps = 100_000_000_000;

/// Number of per-asset compact deltas packed into one slot.
pub const COMPACT_SLOT_FIELDS: usize = 14;

/// Compact slot update blocks are stored in 32 bits.
pub const MAX_COMPACT_BLOCK: BlockNumber = 0xFFFF_FFFF;

/// Maximum number of entries in a step function.
pub const MAX_STEPS_IN_FUNCTION: usize = 10;

/// Number of per-block imbalance records kept per asset.
pub const SLIDING_WINDOW_SIZE: usize = 5;

/// Side of a rate query or trade, from the reserve's point of view:
/// `Buy` converts base currency into the asset, `Sell` the reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn is_buy(&self) -> bool { matches!(self, TradeDirection::Buy) }
}

/// Roles gating mutating operations. Checked through [`crate::auth::Authorizer`]
/// before any state is touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Registers assets, sets control info, validity window, trade enabling.
    Admin,
    /// Refreshes rates, compact data and step functions.
    Operator,
    /// Pauses trading for an asset.
    Alerter,
    /// Records executed trade volume.
    Reserve,
}

/// Per-asset imbalance bookkeeping parameters.
///
/// All three values must be nonzero: the resolution divides recorded volume
/// (bounding storage width at the cost of up to one resolution unit of
/// rounding per read), the caps bound per-block and since-update net volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlInfo {
    pub minimal_record_resolution: u64,
    pub max_per_block_imbalance: u64,
    pub max_total_imbalance: u64,
}

impl ControlInfo {
    pub fn new(
        minimal_record_resolution: u64,
        max_per_block_imbalance: u64,
        max_total_imbalance: u64,
    ) -> Self {
        Self { minimal_record_resolution, max_per_block_imbalance, max_total_imbalance }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.minimal_record_resolution != 0
            && self.max_per_block_imbalance != 0
            && self.max_total_imbalance != 0
    }
}
