//! Per-asset trade-volume bookkeeping.
//!
//! Volume is recorded in a sliding window of [`SLIDING_WINDOW_SIZE`] per-block
//! records, indexed by `block % SLIDING_WINDOW_SIZE`. Each record carries a
//! running total since the price-update block it was written under, so totals
//! survive the window wrapping. Amounts are compressed to units of the asset's
//! minimal record resolution with truncating division; reads re-expand, which
//! bounds the error of either counter by one resolution unit.

use alloy::primitives::U256;
use dashmap::DashMap;
use tracing::trace;

use crate::{
    error::RatesError,
    types::{Asset, BlockNumber, ControlInfo, SLIDING_WINDOW_SIZE},
};

/// One per-block imbalance record. All fields are 64-bit so a record packs
/// into a single 256-bit storage word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImbalanceRecord {
    /// Net traded units within `last_block`.
    pub last_block_units: i64,
    /// Block the per-block counter belongs to.
    pub last_block: u64,
    /// Net traded units since `rate_update_block`.
    pub total_units: i64,
    /// Price-update block the running total was accumulated under.
    pub rate_update_block: u64,
}

impl ImbalanceRecord {
    /// Pack into one 256-bit word: units in the low 64 bits, then block,
    /// total units, and the price-update block in the high 64 bits. Signed
    /// fields are two's complement.
    pub fn encode(&self) -> U256 {
        U256::from_limbs([
            self.last_block_units as u64,
            self.last_block,
            self.total_units as u64,
            self.rate_update_block,
        ])
    }

    /// Inverse of [`ImbalanceRecord::encode`].
    pub fn decode(word: U256) -> Self {
        let limbs = word.as_limbs();
        Self {
            last_block_units: limbs[0] as i64,
            last_block: limbs[1],
            total_units: limbs[2] as i64,
            rate_update_block: limbs[3],
        }
    }
}

type Window = [ImbalanceRecord; SLIDING_WINDOW_SIZE];

/// Tracks per-asset net trade volume since the last price update and within
/// the most recent block, and holds the per-asset control caps.
///
/// Recording never fails on cap breaches: caps are observational here and
/// acted upon by the rate query layer.
#[derive(Debug, Default)]
pub struct ImbalanceRecorder {
    control: DashMap<Asset, ControlInfo>,
    windows: DashMap<Asset, Window>,
}

impl ImbalanceRecorder {
    pub fn new() -> Self {
        Self { control: DashMap::new(), windows: DashMap::new() }
    }

    /// Set the resolution and caps for an asset. All values must be nonzero.
    /// First call for an asset also initializes its window.
    pub fn set_control_info(&self, asset: Asset, info: ControlInfo) -> Result<(), RatesError> {
        if !info.is_valid() {
            return Err(RatesError::InvalidControlInfo);
        }
        self.control.insert(asset, info);
        self.windows.entry(asset).or_default();
        Ok(())
    }

    pub fn control_info(&self, asset: Asset) -> Result<ControlInfo, RatesError> {
        self.control
            .get(&asset)
            .map(|info| *info)
            .ok_or(RatesError::UnknownAsset(asset))
    }

    /// Record a signed trade volume for `asset` observed at `current_block`,
    /// priced off the update that landed at `rate_update_block`.
    pub fn add_trade(
        &self,
        asset: Asset,
        volume: i128,
        rate_update_block: BlockNumber,
        current_block: BlockNumber,
    ) -> Result<(), RatesError> {
        let resolution = self.control_info(asset)?.minimal_record_resolution;
        let recorded = clamp_units(volume / resolution as i128);
        let index = (current_block % SLIDING_WINDOW_SIZE as u64) as usize;

        let mut window = self
            .windows
            .get_mut(&asset)
            .ok_or(RatesError::UnknownAsset(asset))?;
        let mut record = window[index];

        if record.last_block == current_block {
            if record.rate_update_block == rate_update_block {
                // Another trade in the same block and price epoch.
                record.last_block_units = record.last_block_units.saturating_add(recorded);
                record.total_units = record.total_units.saturating_add(recorded);
            } else {
                // A price update landed in the middle of the current block:
                // fold only the post-update portion into the running total.
                let prev = units_in_range(&window, rate_update_block, current_block);
                record.total_units = clamp_units(prev as i128 + recorded as i128);
                record.last_block_units = record.last_block_units.saturating_add(recorded);
                record.rate_update_block = rate_update_block;
            }
        } else {
            // First trade in a new block: carry the total forward.
            let (prev, _) = units_since_update(&window, rate_update_block, current_block);
            record = ImbalanceRecord {
                last_block_units: recorded,
                last_block: current_block,
                total_units: clamp_units(prev as i128 + recorded as i128),
                rate_update_block,
            };
        }

        window[index] = record;
        trace!(
            %asset,
            volume,
            rate_update_block,
            current_block,
            total_units = record.total_units,
            "recorded trade"
        );
        Ok(())
    }

    /// Net volume since `rate_update_block` and within `current_block`,
    /// re-expanded to raw volume units. Read-only projection.
    pub fn imbalance(
        &self,
        asset: Asset,
        rate_update_block: BlockNumber,
        current_block: BlockNumber,
    ) -> Result<(i128, i128), RatesError> {
        let resolution = self.control_info(asset)?.minimal_record_resolution as i128;
        let window = self
            .windows
            .get(&asset)
            .ok_or(RatesError::UnknownAsset(asset))?;
        let (total, current) = units_since_update(&window, rate_update_block, current_block);
        Ok((total as i128 * resolution, current as i128 * resolution))
    }

    /// Net volume recorded in blocks within `[from_block, to_block]`,
    /// re-expanded to raw volume units. Only blocks still covered by the
    /// sliding window contribute.
    pub fn imbalance_in_range(
        &self,
        asset: Asset,
        from_block: BlockNumber,
        to_block: BlockNumber,
    ) -> Result<i128, RatesError> {
        if from_block > to_block {
            return Err(RatesError::InvalidBlockRange(from_block, to_block));
        }
        let resolution = self.control_info(asset)?.minimal_record_resolution as i128;
        let window = self
            .windows
            .get(&asset)
            .ok_or(RatesError::UnknownAsset(asset))?;
        Ok(units_in_range(&window, from_block, to_block) as i128 * resolution)
    }

    /// The asset's window as packed storage words, for persistence layers.
    pub fn window_words(&self, asset: Asset) -> Result<[U256; SLIDING_WINDOW_SIZE], RatesError> {
        let window = self
            .windows
            .get(&asset)
            .ok_or(RatesError::UnknownAsset(asset))?;
        Ok((*window).map(|record| record.encode()))
    }
}

fn clamp_units(units: i128) -> i64 {
    units.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Sum of per-block unit counters for blocks within the inclusive range.
fn units_in_range(window: &Window, from_block: u64, to_block: u64) -> i64 {
    window
        .iter()
        .filter(|record| record.last_block >= from_block && record.last_block <= to_block)
        .fold(0i64, |sum, record| sum.saturating_add(record.last_block_units))
}

/// Units traded since `rate_update_block`, and within `current_block`.
///
/// The newest record written under the queried price-update block carries the
/// authoritative running total. When no record matches (the update is newer
/// than every record, or a zero total is indistinguishable from no activity),
/// fall back to summing the per-block counters still in range.
fn units_since_update(window: &Window, rate_update_block: u64, current_block: u64) -> (i64, i64) {
    let mut total = 0i64;
    let mut current = 0i64;
    let mut latest_block = 0u64;
    let mut in_range = 0i64;

    for record in window {
        if record.last_block >= rate_update_block && record.last_block <= current_block {
            in_range = in_range.saturating_add(record.last_block_units);
        }
        if record.rate_update_block != rate_update_block || record.last_block < latest_block {
            continue;
        }
        latest_block = record.last_block;
        total = record.total_units;
        if record.last_block == current_block {
            current = record.last_block_units;
        }
    }

    if total == 0 {
        total = in_range;
    }
    (total, current)
}
