//! Piecewise-constant adjustment curves.

use dashmap::DashMap;

use crate::{
    error::RatesError,
    types::{Asset, Bps, MAX_STEPS_IN_FUNCTION, TradeDirection},
};

/// An ordered sequence of `(threshold, bps)` pairs.
///
/// Evaluation returns the bps of the first entry whose threshold is at or
/// above the input; past the last threshold the last entry's bps applies.
/// Thresholds are expected ascending; the setter does not validate ordering
/// and evaluation of an unordered function follows the same first-match scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepFunction {
    x: Vec<i128>,
    y: Vec<Bps>,
}

impl StepFunction {
    /// Build a step function from matching threshold and adjustment arrays.
    pub fn new(x: Vec<i128>, y: Vec<Bps>) -> Result<Self, RatesError> {
        if x.len() != y.len() {
            return Err(RatesError::ArityMismatch);
        }
        if x.len() > MAX_STEPS_IN_FUNCTION {
            return Err(RatesError::TooManySteps);
        }
        Ok(Self { x, y })
    }

    /// Bps adjustment for the given input. An empty function adjusts by 0.
    ///
    /// The scan is linear: functions are bounded by
    /// [`MAX_STEPS_IN_FUNCTION`] entries, and first-match semantics make a
    /// threshold hit resolve to its own tier, not the next one.
    pub fn evaluate(&self, input: i128) -> Bps {
        for (threshold, bps) in self.x.iter().zip(&self.y) {
            if input <= *threshold {
                return *bps;
            }
        }
        self.y.last().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize { self.x.len() }

    pub fn is_empty(&self) -> bool { self.x.is_empty() }

    pub fn thresholds(&self) -> &[i128] { &self.x }

    pub fn adjustments(&self) -> &[Bps] { &self.y }
}

#[derive(Clone, Debug, Default)]
struct AssetSteps {
    qty_buy: StepFunction,
    qty_sell: StepFunction,
    imbalance_buy: StepFunction,
    imbalance_sell: StepFunction,
}

/// Step-function configuration for one asset, supplied at registration or
/// refreshed later through the setters.
#[derive(Clone, Debug, Default)]
pub struct StepConfig {
    pub qty_buy: StepFunction,
    pub qty_sell: StepFunction,
    pub imbalance_buy: StepFunction,
    pub imbalance_sell: StepFunction,
}

/// Per-asset store of the four adjustment curves: buy/sell by quantity and
/// buy/sell by imbalance.
#[derive(Debug, Default)]
pub struct StepBook {
    steps: DashMap<Asset, AssetSteps>,
}

impl StepBook {
    pub(crate) fn new() -> Self {
        Self { steps: DashMap::new() }
    }

    pub(crate) fn register(&self, asset: Asset, config: StepConfig) {
        self.steps.insert(
            asset,
            AssetSteps {
                qty_buy: config.qty_buy,
                qty_sell: config.qty_sell,
                imbalance_buy: config.imbalance_buy,
                imbalance_sell: config.imbalance_sell,
            },
        );
    }

    pub(crate) fn set_qty_steps(
        &self,
        asset: Asset,
        buy: StepFunction,
        sell: StepFunction,
    ) -> Result<(), RatesError> {
        let mut entry = self.steps.get_mut(&asset).ok_or(RatesError::UnknownAsset(asset))?;
        entry.qty_buy = buy;
        entry.qty_sell = sell;
        Ok(())
    }

    pub(crate) fn set_imbalance_steps(
        &self,
        asset: Asset,
        buy: StepFunction,
        sell: StepFunction,
    ) -> Result<(), RatesError> {
        let mut entry = self.steps.get_mut(&asset).ok_or(RatesError::UnknownAsset(asset))?;
        entry.imbalance_buy = buy;
        entry.imbalance_sell = sell;
        Ok(())
    }

    /// Quantity adjustment for a trade of `qty` destination units.
    pub(crate) fn qty_bps(
        &self,
        asset: Asset,
        direction: TradeDirection,
        qty: i128,
    ) -> Result<Bps, RatesError> {
        let entry = self.steps.get(&asset).ok_or(RatesError::UnknownAsset(asset))?;
        let function = match direction {
            TradeDirection::Buy => &entry.qty_buy,
            TradeDirection::Sell => &entry.qty_sell,
        };
        Ok(function.evaluate(qty))
    }

    /// Imbalance adjustment for the projected post-trade imbalance.
    pub(crate) fn imbalance_bps(
        &self,
        asset: Asset,
        direction: TradeDirection,
        imbalance: i128,
    ) -> Result<Bps, RatesError> {
        let entry = self.steps.get(&asset).ok_or(RatesError::UnknownAsset(asset))?;
        let function = match direction {
            TradeDirection::Buy => &entry.imbalance_buy,
            TradeDirection::Sell => &entry.imbalance_sell,
        };
        Ok(function.evaluate(imbalance))
    }

    /// Snapshot of one of the asset's curves, for diagnostics.
    pub(crate) fn qty_steps(
        &self,
        asset: Asset,
        direction: TradeDirection,
    ) -> Result<StepFunction, RatesError> {
        let entry = self.steps.get(&asset).ok_or(RatesError::UnknownAsset(asset))?;
        Ok(match direction {
            TradeDirection::Buy => entry.qty_buy.clone(),
            TradeDirection::Sell => entry.qty_sell.clone(),
        })
    }

    pub(crate) fn imbalance_steps(
        &self,
        asset: Asset,
        direction: TradeDirection,
    ) -> Result<StepFunction, RatesError> {
        let entry = self.steps.get(&asset).ok_or(RatesError::UnknownAsset(asset))?;
        Ok(match direction {
            TradeDirection::Buy => entry.imbalance_buy.clone(),
            TradeDirection::Sell => entry.imbalance_sell.clone(),
        })
    }
}
