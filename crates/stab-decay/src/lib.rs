//! # stab-decay — Time-based balance decay (demurrage).
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! - **Lazy decay**: effective balances are derived on read from the raw
//!   balance and the last-activity anchor; nothing is written until commit.
//! - **Grace period**: no decay until the account has been idle longer than
//!   the configured grace window.
//! - **Fiat-activity tiers**: accounts with verified offramp usage decay at
//!   the slower high-tier rate.
//! - **Cap**: cumulative decay never exceeds `max_decay_cap` of the raw
//!   balance, however long the account sleeps.

pub mod engine;
pub mod tier;

pub use engine::{apply_fraction, decayable_hours, DemurrageEngine};
pub use tier::FiatRatioTierSelector;
