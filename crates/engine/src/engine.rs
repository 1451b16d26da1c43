//! The rate engine façade.
//!
//! Composes the rate store, the step book and the imbalance recorder behind
//! one authorization-checked surface. Rate queries are read-only and may run
//! concurrently; mutations serialize per asset (or per slot batch) inside the
//! component stores.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use tracing::debug;

use crate::{
    auth::Authorizer,
    error::RatesError,
    imbalance::ImbalanceRecorder,
    num,
    rates::{CompactPayload, RateStore},
    step::{StepBook, StepConfig, StepFunction},
    types::{Asset, BlockNumber, Bps, ControlInfo, Role, TradeDirection},
};

/// Default number of blocks a compact refresh stays fresh for.
pub const DEFAULT_VALID_RATE_DURATION: u64 = 10;

/// What a rate query does with compact data older than the validity window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StalenessPolicy {
    /// Evaluate regardless; the caller owns the freshness decision.
    Allow,
    /// Yield the zero rate, the untradeable sentinel.
    #[default]
    ZeroRate,
    /// Fail the query with [`RatesError::StaleRate`].
    Reject,
}

/// Façade-level policy knobs for the open questions the components leave to
/// their caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnginePolicy {
    pub staleness: StalenessPolicy,
    /// Yield the zero rate when the projected post-trade imbalance breaches
    /// the per-block or total cap.
    pub enforce_caps: bool,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self { staleness: StalenessPolicy::default(), enforce_caps: true }
    }
}

/// Rate & imbalance engine.
///
/// Assets are registered once and never removed. All mutating operations take
/// the caller address and are gated through the [`Authorizer`]; a failed check
/// leaves no side effects.
#[derive(derive_more::Debug)]
pub struct RateEngine<A: Authorizer> {
    #[debug(skip)]
    auth: A,
    policy: EnginePolicy,
    valid_rate_duration: AtomicU64,
    rates: RateStore,
    steps: StepBook,
    recorder: ImbalanceRecorder,
    enabled: DashMap<Asset, bool>,
}

impl<A: Authorizer> RateEngine<A> {
    pub fn new(auth: A) -> Self {
        Self::with_policy(auth, EnginePolicy::default())
    }

    pub fn with_policy(auth: A, policy: EnginePolicy) -> Self {
        Self {
            auth,
            policy,
            valid_rate_duration: AtomicU64::new(DEFAULT_VALID_RATE_DURATION),
            rates: RateStore::new(),
            steps: StepBook::new(),
            recorder: ImbalanceRecorder::new(),
            enabled: DashMap::new(),
        }
    }

    pub fn policy(&self) -> EnginePolicy { self.policy }

    pub fn valid_rate_duration(&self) -> u64 { self.valid_rate_duration.load(Ordering::Relaxed) }

    fn check(&self, caller: Address, role: Role) -> Result<(), RatesError> {
        if self.auth.is_authorized(caller, role) {
            Ok(())
        } else {
            Err(RatesError::Unauthorized { caller, role })
        }
    }

    fn require_listed(&self, asset: Asset) -> Result<(), RatesError> {
        if self.rates.is_listed(asset) { Ok(()) } else { Err(RatesError::UnknownAsset(asset)) }
    }

    /// Register a new asset with its control info and initial step functions.
    /// Trading starts disabled; see [`RateEngine::enable_trading`].
    pub fn register_asset(
        &self,
        caller: Address,
        asset: Asset,
        control: ControlInfo,
        steps: StepConfig,
    ) -> Result<(), RatesError> {
        self.check(caller, Role::Admin)?;
        if !control.is_valid() {
            return Err(RatesError::InvalidControlInfo);
        }

        let (slot_index, field_index) = self.rates.list(asset)?;
        self.recorder.set_control_info(asset, control)?;
        self.steps.register(asset, steps);
        self.enabled.insert(asset, false);
        debug!(%asset, slot_index, field_index, "registered asset");
        Ok(())
    }

    /// Number of blocks a compact refresh stays valid for.
    pub fn set_valid_rate_duration(
        &self,
        caller: Address,
        blocks: u64,
    ) -> Result<(), RatesError> {
        self.check(caller, Role::Admin)?;
        self.valid_rate_duration.store(blocks, Ordering::Relaxed);
        Ok(())
    }

    /// Replace an asset's imbalance resolution and caps.
    pub fn set_token_control_info(
        &self,
        caller: Address,
        asset: Asset,
        control: ControlInfo,
    ) -> Result<(), RatesError> {
        self.check(caller, Role::Admin)?;
        self.require_listed(asset)?;
        self.recorder.set_control_info(asset, control)
    }

    /// Allow the asset to trade. Requires registration (which also fixes the
    /// control info) to have happened.
    pub fn enable_trading(&self, caller: Address, asset: Asset) -> Result<(), RatesError> {
        self.check(caller, Role::Admin)?;
        self.require_listed(asset)?;
        self.recorder.control_info(asset)?;
        self.enabled.insert(asset, true);
        debug!(%asset, "trading enabled");
        Ok(())
    }

    /// Pause trading for the asset; its rate queries yield the zero rate.
    pub fn disable_trading(&self, caller: Address, asset: Asset) -> Result<(), RatesError> {
        self.check(caller, Role::Alerter)?;
        self.require_listed(asset)?;
        self.enabled.insert(asset, false);
        debug!(%asset, "trading disabled");
        Ok(())
    }

    /// Bulk-set base rates.
    pub fn set_base_rate(
        &self,
        caller: Address,
        assets: &[Asset],
        buy_rates: &[U256],
        sell_rates: &[U256],
    ) -> Result<(), RatesError> {
        self.check(caller, Role::Operator)?;
        self.rates.set_base_rate(assets, buy_rates, sell_rates)
    }

    /// Refresh compact deltas for the identified slots at `update_block`.
    pub fn set_compact_data(
        &self,
        caller: Address,
        buy_deltas: &[CompactPayload],
        sell_deltas: &[CompactPayload],
        update_block: BlockNumber,
        slot_indices: &[usize],
    ) -> Result<(), RatesError> {
        self.check(caller, Role::Operator)?;
        self.rates
            .set_compact_data(buy_deltas, sell_deltas, update_block, slot_indices)
    }

    /// Replace the asset's quantity step functions.
    pub fn set_qty_step_function(
        &self,
        caller: Address,
        asset: Asset,
        buy_x: Vec<i128>,
        buy_y: Vec<Bps>,
        sell_x: Vec<i128>,
        sell_y: Vec<Bps>,
    ) -> Result<(), RatesError> {
        self.check(caller, Role::Operator)?;
        self.require_listed(asset)?;
        let buy = StepFunction::new(buy_x, buy_y)?;
        let sell = StepFunction::new(sell_x, sell_y)?;
        self.steps.set_qty_steps(asset, buy, sell)
    }

    /// Replace the asset's imbalance step functions.
    pub fn set_imbalance_step_function(
        &self,
        caller: Address,
        asset: Asset,
        buy_x: Vec<i128>,
        buy_y: Vec<Bps>,
        sell_x: Vec<i128>,
        sell_y: Vec<Bps>,
    ) -> Result<(), RatesError> {
        self.check(caller, Role::Operator)?;
        self.require_listed(asset)?;
        let buy = StepFunction::new(buy_x, buy_y)?;
        let sell = StepFunction::new(sell_x, sell_y)?;
        self.steps.set_imbalance_steps(asset, buy, sell)
    }

    /// Record executed trade volume (signed: buys positive, sells negative).
    /// Cap breaches never fail the call; they surface through rate queries.
    pub fn record_trade(
        &self,
        caller: Address,
        asset: Asset,
        volume: i128,
        rate_update_block: BlockNumber,
        current_block: BlockNumber,
    ) -> Result<(), RatesError> {
        self.check(caller, Role::Reserve)?;
        self.recorder
            .add_trade(asset, volume, rate_update_block, current_block)
    }

    /// Quote a rate for trading `qty` of the source side at `current_block`.
    ///
    /// Composes, in order and each with truncating bps application: the
    /// compact delta, the quantity step and the imbalance step. A zero rate
    /// means the asset cannot trade right now (paused, stale compact data,
    /// or an imbalance cap would be breached); callers must treat zero as
    /// untradeable, never as a price.
    pub fn get_rate(
        &self,
        asset: Asset,
        current_block: BlockNumber,
        direction: TradeDirection,
        qty: U256,
    ) -> Result<U256, RatesError> {
        self.require_listed(asset)?;
        if !self.is_enabled(asset) {
            return Ok(U256::ZERO);
        }

        let update_block = self.rates.rate_update_block(asset)?;
        let stale = current_block >= update_block.saturating_add(self.valid_rate_duration());
        match self.policy.staleness {
            StalenessPolicy::ZeroRate if stale => return Ok(U256::ZERO),
            StalenessPolicy::Reject if stale => return Err(RatesError::StaleRate(asset)),
            _ => {}
        }

        let (total_imbalance, block_imbalance) =
            self.recorder.imbalance(asset, update_block, current_block)?;

        let mut rate = self.rates.adjusted_rate(asset, direction)?;

        // Quantity steps are keyed by asset-side quantity: the destination
        // estimate at the adjusted rate for buys, the source quantity for
        // sells. The same quantity, signed by direction, projects the
        // post-trade imbalance.
        let (step_qty, trade_qty) = match direction {
            TradeDirection::Buy => {
                let dst = num::saturating_i128(num::dst_qty(qty, rate)?);
                (dst, dst)
            }
            TradeDirection::Sell => {
                let src = num::saturating_i128(qty);
                (src, -src)
            }
        };
        let projected_imbalance = total_imbalance.saturating_add(trade_qty);

        rate = num::apply_bps(rate, self.steps.qty_bps(asset, direction, step_qty)?)?;
        rate = num::apply_bps(
            rate,
            self.steps.imbalance_bps(asset, direction, projected_imbalance)?,
        )?;

        if self.policy.enforce_caps {
            let control = self.recorder.control_info(asset)?;
            if projected_imbalance.unsigned_abs() >= control.max_total_imbalance as u128 {
                return Ok(U256::ZERO);
            }
            let block_projected = block_imbalance.saturating_add(trade_qty);
            if block_projected.unsigned_abs() >= control.max_per_block_imbalance as u128 {
                return Ok(U256::ZERO);
            }
        }

        Ok(rate)
    }

    // Reads, mostly diagnostics. All are pure projections.

    pub fn is_enabled(&self, asset: Asset) -> bool {
        self.enabled.get(&asset).map(|flag| *flag).unwrap_or(false)
    }

    /// `(listed, enabled)` without failing for unknown assets.
    pub fn asset_basic_data(&self, asset: Asset) -> (bool, bool) {
        (self.rates.is_listed(asset), self.is_enabled(asset))
    }

    pub fn listed_assets(&self) -> Vec<Asset> { self.rates.listed_assets() }

    pub fn base_rate(&self, asset: Asset, direction: TradeDirection) -> Result<U256, RatesError> {
        self.rates.base_rate(asset, direction)
    }

    /// `(slot_index, field_index, buy_delta, sell_delta)` for the asset.
    pub fn compact_data(&self, asset: Asset) -> Result<(usize, usize, i8, i8), RatesError> {
        self.rates.compact_data(asset)
    }

    pub fn rate_update_block(&self, asset: Asset) -> Result<BlockNumber, RatesError> {
        self.rates.rate_update_block(asset)
    }

    pub fn control_info(&self, asset: Asset) -> Result<ControlInfo, RatesError> {
        self.recorder.control_info(asset)
    }

    /// `(total_since_update, last_block_volume)` as-of the given blocks.
    pub fn imbalance(
        &self,
        asset: Asset,
        rate_update_block: BlockNumber,
        current_block: BlockNumber,
    ) -> Result<(i128, i128), RatesError> {
        self.recorder.imbalance(asset, rate_update_block, current_block)
    }

    /// Net recorded volume over an inclusive block range (analytics path).
    pub fn imbalance_in_range(
        &self,
        asset: Asset,
        from_block: BlockNumber,
        to_block: BlockNumber,
    ) -> Result<i128, RatesError> {
        self.recorder.imbalance_in_range(asset, from_block, to_block)
    }

    pub fn qty_steps(
        &self,
        asset: Asset,
        direction: TradeDirection,
    ) -> Result<StepFunction, RatesError> {
        self.steps.qty_steps(asset, direction)
    }

    pub fn imbalance_steps(
        &self,
        asset: Asset,
        direction: TradeDirection,
    ) -> Result<StepFunction, RatesError> {
        self.steps.imbalance_steps(asset, direction)
    }

    /// Packed storage words for persistence: one per compact slot.
    pub fn compact_slot_words(&self) -> Vec<U256> {
        (0..self.rates.num_slots())
            .filter_map(|index| self.rates.slot_word(index).ok())
            .collect()
    }

    /// Packed storage words for persistence: the asset's imbalance window.
    pub fn imbalance_window_words(
        &self,
        asset: Asset,
    ) -> Result<[U256; crate::types::SLIDING_WINDOW_SIZE], RatesError> {
        self.recorder.window_words(asset)
    }
}
