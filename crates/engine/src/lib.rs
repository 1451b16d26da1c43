//! Reserve rate & imbalance engine.
//!
//! # Overview
//!
//! In-memory pricing engine for a market-making reserve: per-asset base
//! rates refreshed through packed compact deltas, piecewise step adjustments
//! by trade size and accumulated imbalance, and per-block volume tracking
//! that caps exposure between price updates.
//!
//! Use [`engine::RateEngine`] as the entry point: register assets with their
//! [`types::ControlInfo`] and [`step::StepConfig`], feed it base rates and
//! compact refreshes, record executed trades, and query [`RateEngine::get_rate`]
//! for the adjusted rate. A zero rate is the untradeable sentinel.
//!
//! Every mutating call is gated through an [`auth::Authorizer`]; bring your
//! own implementation or use the bundled [`auth::RoleTable`].
//!
//! See `./tests` for end-to-end scenarios.
//!
//! # Features
//!
//! | Feature | Default | Description |
//! | --- | --- | --- |
//! | `display` | yes | Enables the tabular [`std::fmt::Display`] view of engine state. |
//!
//! [`RateEngine::get_rate`]: engine::RateEngine::get_rate

pub mod auth;
#[cfg(feature = "display")]
pub mod display;
pub mod engine;
pub mod error;
pub mod imbalance;
pub mod num;
pub mod rates;
pub mod step;
pub mod types;

pub use auth::{Authorizer, RoleTable};
pub use engine::{EnginePolicy, RateEngine, StalenessPolicy};
pub use error::RatesError;
pub use step::{StepConfig, StepFunction};
pub use types::{Asset, Bps, ControlInfo, Role, TradeDirection};
