//! # stab-engine — Account ledger, transfer pipeline, and health driver.
//!
//! Composes the stability subsystems into one engine:
//! - [`ledger::Ledger`] — concurrent account store with ordered pair locking
//! - [`engine::StabilityEngine`] — decay, risk scoring, penalties and breaker
//!   gating around every transfer, plus owner controls
//! - [`activity::EpochTracker`] — epoch clock and per-epoch statistics
//! - [`driver`] — tokio loop that feeds metrics into periodic health ticks
//! - [`settings::Settings`] — layered process settings

pub mod activity;
pub mod driver;
pub mod engine;
pub mod ledger;
pub mod settings;

pub use activity::EpochTracker;
pub use driver::{run_health_loop, MetricsSource};
pub use engine::StabilityEngine;
pub use ledger::Ledger;
pub use settings::Settings;
