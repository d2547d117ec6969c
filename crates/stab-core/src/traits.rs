//! Strategy interfaces for the stability engine.
//!
//! These traits are the seams between crates:
//! - [`DecayTierSelector`]: picks an hourly decay rate (stab-decay implements)
//! - [`RiskCombiner`]: folds behavioral signals into one score (stab-risk implements)
//! - [`PenaltyCurve`]: maps a risk score and transfer size to a surcharge (stab-risk implements)
//!
//! Every implementation must be deterministic and integer-only so that two
//! engines fed the same inputs agree exactly.

use crate::config::EngineConfig;
use crate::error::InvariantError;
use crate::types::{RiskSignals, SettlementTotals};

/// Selects the hourly decay rate for an account.
pub trait DecayTierSelector: Send + Sync {
    /// Hourly decay rate in parts-per-billion.
    fn hourly_rate_ppb(&self, settlement: &SettlementTotals, config: &EngineConfig) -> u64;
}

/// Combines per-transfer signals into a composite risk score.
pub trait RiskCombiner: Send + Sync {
    /// Composite score in `0..=MAX_RISK_SCORE`.
    ///
    /// `fiat_ratio_ppm` is the sender's offramp/onramp ratio; combiners may
    /// discount verified fiat usage.
    fn combine(&self, signals: &RiskSignals, fiat_ratio_ppm: u64, config: &EngineConfig) -> u16;
}

/// Inputs to a surcharge computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenaltyInput {
    pub risk_score: u16,
    pub base_fee: u64,
    pub amount: u64,
    /// Violations recorded inside the penalty window, excluding this transfer.
    pub prior_violations: u32,
}

/// Maps risk to a fee surcharge.
///
/// Implementations must be non-decreasing in `risk_score` and in
/// `prior_violations`, and must respect `penalty_multiplier_cap_bps`.
pub trait PenaltyCurve: Send + Sync {
    /// Surcharge in the smallest unit.
    fn surcharge(&self, input: &PenaltyInput, config: &EngineConfig) -> Result<u64, InvariantError>;
}
