use std::iter;

use colored::Colorize;
use tabled::{
    Table,
    settings::{Alignment, Panel, Style, Width, object::Rows},
};

use crate::{auth::Authorizer, engine::RateEngine, types::BlockNumber};

/// View of the engine's per-asset pricing state.
/// Renders as a plain table by default; the alternate form adds the imbalance
/// counters evaluated at `current_block`.
pub struct RateBookView<'a, A: Authorizer> {
    engine: &'a RateEngine<A>,
    current_block: Option<BlockNumber>,
}

impl<A: Authorizer> RateEngine<A> {
    /// Tabular view of every listed asset. Pass a block number to evaluate
    /// the imbalance columns of the alternate (`{:#}`) form.
    pub fn view(&self, current_block: Option<BlockNumber>) -> RateBookView<'_, A> {
        RateBookView { engine: self, current_block }
    }
}

impl<'a, A: Authorizer> std::fmt::Display for RateBookView<'a, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let assets = self.engine.listed_assets();
        let with_imbalance = f.alternate() && self.current_block.is_some();

        let mut header = vec![
            "Asset".to_string(),
            "Slot".to_string(),
            "Field".to_string(),
            "Base Buy".to_string(),
            "Base Sell".to_string(),
            "Δ Buy".to_string(),
            "Δ Sell".to_string(),
            "Updated".to_string(),
            "Trading".to_string(),
        ];
        if with_imbalance {
            header.push("Imbalance".to_string());
            header.push("Block Imb".to_string());
        }

        let mut enabled_count = 0usize;
        let mut rows = Vec::with_capacity(assets.len());
        for asset in &assets {
            let (slot, field, buy_delta, sell_delta) =
                self.engine.compact_data(*asset).map_err(|_| std::fmt::Error)?;
            let base_buy = self
                .engine
                .base_rate(*asset, crate::types::TradeDirection::Buy)
                .map_err(|_| std::fmt::Error)?;
            let base_sell = self
                .engine
                .base_rate(*asset, crate::types::TradeDirection::Sell)
                .map_err(|_| std::fmt::Error)?;
            let update_block =
                self.engine.rate_update_block(*asset).map_err(|_| std::fmt::Error)?;

            let trading = if self.engine.is_enabled(*asset) {
                enabled_count += 1;
                "enabled".green().to_string()
            } else {
                "paused".red().to_string()
            };

            let mut row = vec![
                asset.to_string(),
                slot.to_string(),
                field.to_string(),
                base_buy.to_string(),
                base_sell.to_string(),
                buy_delta.to_string(),
                sell_delta.to_string(),
                update_block.to_string(),
                trading,
            ];
            if with_imbalance {
                let current_block = self.current_block.unwrap_or_default();
                let (total, block) = self
                    .engine
                    .imbalance(*asset, update_block, current_block)
                    .map_err(|_| std::fmt::Error)?;
                row.push(total.to_string());
                row.push(block.to_string());
            }
            rows.push(row);
        }

        let mut table = Table::from_iter(iter::once(&header).chain(rows.iter()));
        table.with(Panel::header(format!(
            "Assets: {} :: trading: {}, paused: {} :: slots: {}",
            assets.len(),
            enabled_count,
            assets.len() - enabled_count,
            self.engine.compact_slot_words().len(),
        )));
        table.modify(Rows::first(), Alignment::right());

        if let Some(max_width) = f.width() {
            table.with(Width::wrap(max_width));
        }

        if f.alternate() {
            table.with(Style::modern());
        } else {
            table.with(Style::sharp());
        }
        writeln!(f, "{}", table)
    }
}
