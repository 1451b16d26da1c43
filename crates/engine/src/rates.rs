//! Base rates and batched compact deltas.
//!
//! Base rates change rarely and are stored per asset. The frequent small
//! corrections ride in compact slots: groups of [`COMPACT_SLOT_FIELDS`]
//! signed bytes (one per asset, ±bps×10) sharing a single update block, so a
//! whole batch refreshes with one slot write. An asset's slot and field are
//! assigned at listing time, in registration order, and never move.

use std::sync::RwLock;

use alloy::primitives::U256;
use dashmap::DashMap;
use itertools::izip;
use tracing::debug;

use crate::{
    error::RatesError,
    num,
    types::{Asset, BlockNumber, COMPACT_SLOT_FIELDS, MAX_COMPACT_BLOCK, TradeDirection},
};

/// One compact update payload: a delta byte per slot field.
pub type CompactPayload = [i8; COMPACT_SLOT_FIELDS];

/// A packed group of compact deltas sharing one update block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompactSlot {
    pub buy: CompactPayload,
    pub sell: CompactPayload,
    pub update_block: BlockNumber,
}

impl CompactSlot {
    /// Pack into one 256-bit word: buy bytes in the low 112 bits, sell bytes
    /// in the next 112, the 32-bit update block on top. Byte 0 of each
    /// payload is the most significant of its 14-byte group.
    pub fn encode(&self) -> U256 {
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&(self.update_block as u32).to_be_bytes());
        for (i, delta) in self.sell.iter().enumerate() {
            bytes[4 + i] = *delta as u8;
        }
        for (i, delta) in self.buy.iter().enumerate() {
            bytes[18 + i] = *delta as u8;
        }
        U256::from_be_bytes(bytes)
    }

    /// Inverse of [`CompactSlot::encode`].
    pub fn decode(word: U256) -> Self {
        let bytes: [u8; 32] = word.to_be_bytes();
        let mut slot = CompactSlot {
            update_block: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
            ..Default::default()
        };
        for i in 0..COMPACT_SLOT_FIELDS {
            slot.sell[i] = bytes[4 + i] as i8;
            slot.buy[i] = bytes[18 + i] as i8;
        }
        slot
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct RateRecord {
    slot_index: usize,
    field_index: usize,
    base_buy: U256,
    base_sell: U256,
}

/// Stores base buy/sell rates and the compact delta slots, and answers
/// adjusted-rate reads. Listing is append-only.
#[derive(Debug, Default)]
pub struct RateStore {
    records: DashMap<Asset, RateRecord>,
    slots: RwLock<Vec<CompactSlot>>,
    listed: RwLock<Vec<Asset>>,
}

impl RateStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// List an asset, assigning the next `(slot, field)` pair.
    pub(crate) fn list(&self, asset: Asset) -> Result<(usize, usize), RatesError> {
        let mut listed = self.listed.write().expect("listing lock poisoned");
        if self.records.contains_key(&asset) {
            return Err(RatesError::AlreadyRegistered(asset));
        }

        let order = listed.len();
        let slot_index = order / COMPACT_SLOT_FIELDS;
        let field_index = order % COMPACT_SLOT_FIELDS;

        let mut slots = self.slots.write().expect("slot lock poisoned");
        if slot_index == slots.len() {
            slots.push(CompactSlot::default());
        }
        drop(slots);

        self.records
            .insert(asset, RateRecord { slot_index, field_index, ..Default::default() });
        listed.push(asset);
        debug!(%asset, slot_index, field_index, "listed asset");
        Ok((slot_index, field_index))
    }

    pub(crate) fn is_listed(&self, asset: Asset) -> bool {
        self.records.contains_key(&asset)
    }

    /// Listed assets in registration order.
    pub(crate) fn listed_assets(&self) -> Vec<Asset> {
        self.listed.read().expect("listing lock poisoned").clone()
    }

    /// Bulk-set base rates. All-or-nothing: arity and listing are validated
    /// for every entry before any rate is written.
    pub(crate) fn set_base_rate(
        &self,
        assets: &[Asset],
        buy_rates: &[U256],
        sell_rates: &[U256],
    ) -> Result<(), RatesError> {
        if assets.len() != buy_rates.len() || assets.len() != sell_rates.len() {
            return Err(RatesError::ArityMismatch);
        }
        for asset in assets {
            if !self.records.contains_key(asset) {
                return Err(RatesError::UnknownAsset(*asset));
            }
        }

        for (asset, buy, sell) in izip!(assets, buy_rates, sell_rates) {
            let mut record = self
                .records
                .get_mut(asset)
                .ok_or(RatesError::UnknownAsset(*asset))?;
            record.base_buy = *buy;
            record.base_sell = *sell;
        }
        debug!(count = assets.len(), "base rates updated");
        Ok(())
    }

    /// Refresh compact deltas for the identified slots, stamping them all
    /// with `update_block`. All-or-nothing.
    pub(crate) fn set_compact_data(
        &self,
        buy_deltas: &[CompactPayload],
        sell_deltas: &[CompactPayload],
        update_block: BlockNumber,
        slot_indices: &[usize],
    ) -> Result<(), RatesError> {
        if slot_indices.len() != buy_deltas.len() || slot_indices.len() != sell_deltas.len() {
            return Err(RatesError::ArityMismatch);
        }
        if update_block > MAX_COMPACT_BLOCK {
            return Err(RatesError::InvalidBlockNumber(update_block));
        }

        let mut slots = self.slots.write().expect("slot lock poisoned");
        for index in slot_indices {
            if *index >= slots.len() {
                return Err(RatesError::UnknownSlot(*index));
            }
        }
        for (index, buy, sell) in izip!(slot_indices, buy_deltas, sell_deltas) {
            slots[*index] = CompactSlot { buy: *buy, sell: *sell, update_block };
        }
        debug!(slots = slot_indices.len(), update_block, "compact data updated");
        Ok(())
    }

    /// The unadjusted base rate.
    pub(crate) fn base_rate(
        &self,
        asset: Asset,
        direction: TradeDirection,
    ) -> Result<U256, RatesError> {
        let record = self.records.get(&asset).ok_or(RatesError::UnknownAsset(asset))?;
        Ok(match direction {
            TradeDirection::Buy => record.base_buy,
            TradeDirection::Sell => record.base_sell,
        })
    }

    /// The asset's compact position and current deltas:
    /// `(slot_index, field_index, buy_delta, sell_delta)`.
    pub(crate) fn compact_data(&self, asset: Asset) -> Result<(usize, usize, i8, i8), RatesError> {
        let record = self.records.get(&asset).ok_or(RatesError::UnknownAsset(asset))?;
        let (slot_index, field_index) = (record.slot_index, record.field_index);
        drop(record);

        let slots = self.slots.read().expect("slot lock poisoned");
        let slot = &slots[slot_index];
        Ok((slot_index, field_index, slot.buy[field_index], slot.sell[field_index]))
    }

    /// Block the asset's compact slot was last refreshed at.
    pub(crate) fn rate_update_block(&self, asset: Asset) -> Result<BlockNumber, RatesError> {
        let record = self.records.get(&asset).ok_or(RatesError::UnknownAsset(asset))?;
        let slot_index = record.slot_index;
        drop(record);

        let slots = self.slots.read().expect("slot lock poisoned");
        Ok(slots[slot_index].update_block)
    }

    /// Base rate with the compact delta applied (delta byte is ±bps×10).
    /// Staleness is not gated here; the engine façade owns that policy.
    pub(crate) fn adjusted_rate(
        &self,
        asset: Asset,
        direction: TradeDirection,
    ) -> Result<U256, RatesError> {
        let (_, _, buy_delta, sell_delta) = self.compact_data(asset)?;
        let base = self.base_rate(asset, direction)?;
        let delta = match direction {
            TradeDirection::Buy => buy_delta,
            TradeDirection::Sell => sell_delta,
        };
        num::apply_bps(base, delta as i64 * 10)
    }

    pub(crate) fn num_slots(&self) -> usize {
        self.slots.read().expect("slot lock poisoned").len()
    }

    /// A slot as its packed storage word, for persistence layers.
    pub(crate) fn slot_word(&self, index: usize) -> Result<U256, RatesError> {
        let slots = self.slots.read().expect("slot lock poisoned");
        slots
            .get(index)
            .map(CompactSlot::encode)
            .ok_or(RatesError::UnknownSlot(index))
    }
}
