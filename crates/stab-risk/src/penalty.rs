//! Progressive penalty surcharges.
//!
//! The surcharge multiplier (BPS of the base fee) is
//!
//! ```text
//! tier_surcharge[band] * size_factor * escalation^prior_violations
//! ```
//!
//! capped at `penalty_multiplier_cap_bps`. The size factor grows linearly
//! from 1x to 2x as the amount approaches `large_transfer_threshold`.

use stab_core::config::EngineConfig;
use stab_core::constants::BPS;
use stab_core::error::InvariantError;
use stab_core::fixed::fixed_pow;
use stab_core::traits::{PenaltyCurve, PenaltyInput};
use stab_core::types::{Account, RiskBand, Timestamp};
use tracing::debug;

/// `BPS + min(amount * BPS / large_transfer_threshold, BPS)`.
pub fn size_factor_bps(amount: u64, large_transfer_threshold: u64) -> u64 {
    if large_transfer_threshold == 0 {
        return 2 * BPS;
    }
    let extra = (amount as u128 * BPS as u128 / large_transfer_threshold as u128).min(BPS as u128);
    BPS + extra as u64
}

/// Tiered, size-scaled, compounding surcharge curve.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressivePenaltyCurve;

impl ProgressivePenaltyCurve {
    /// Uncapped-then-capped multiplier in BPS of the base fee.
    pub fn multiplier_bps(&self, input: &PenaltyInput, c: &EngineConfig) -> u64 {
        let band = RiskBand::from_score(input.risk_score, &c.risk_tier_thresholds);
        let tier = c.tier_surcharge_bps[band.index()];
        if tier == 0 {
            return 0;
        }
        let bps = BPS as u128;
        let size = size_factor_bps(input.amount, c.large_transfer_threshold) as u128;
        let escalation = fixed_pow(c.penalty_escalation_bps, input.prior_violations, BPS);
        let m = (tier as u128)
            .saturating_mul(size)
            / bps;
        let m = m.saturating_mul(escalation) / bps;
        m.min(c.penalty_multiplier_cap_bps as u128) as u64
    }
}

impl PenaltyCurve for ProgressivePenaltyCurve {
    fn surcharge(&self, input: &PenaltyInput, c: &EngineConfig) -> Result<u64, InvariantError> {
        let multiplier = self.multiplier_bps(input, c);
        let fee = input.base_fee as u128 * multiplier as u128 / BPS as u128;
        u64::try_from(fee).map_err(|_| InvariantError::ArithmeticOverflow)
    }
}

/// Outcome of a penalty evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenaltyAssessment {
    pub band: RiskBand,
    pub prior_violations: u32,
    pub surcharge: u64,
}

impl PenaltyAssessment {
    /// Whether committing this transfer appends to the violation log.
    pub fn is_violation(&self) -> bool {
        self.band.is_violation()
    }
}

/// Applies a [`PenaltyCurve`] to an account's violation record.
#[derive(Debug, Clone, Default)]
pub struct PenaltyEngine<P = ProgressivePenaltyCurve> {
    curve: P,
}

impl PenaltyEngine {
    pub fn new() -> Self {
        Self {
            curve: ProgressivePenaltyCurve,
        }
    }
}

impl<P: PenaltyCurve> PenaltyEngine<P> {
    pub fn with_curve(curve: P) -> Self {
        Self { curve }
    }

    /// Surcharge for a transfer of `amount` by `account` scored `risk_score`.
    ///
    /// Exempt accounts are never penalized; passing one here is a caller bug.
    pub fn assess(
        &self,
        account: &Account,
        risk_score: u16,
        base_fee: u64,
        amount: u64,
        now: Timestamp,
        config: &EngineConfig,
    ) -> Result<PenaltyAssessment, InvariantError> {
        if account.exempt {
            return Err(InvariantError::ExemptAccountMisuse(account.id.clone()));
        }
        let prior_violations = account
            .violations
            .count_within(now, config.penalty_window_secs);
        let input = PenaltyInput {
            risk_score,
            base_fee,
            amount,
            prior_violations,
        };
        let surcharge = self.curve.surcharge(&input, config)?;
        let band = RiskBand::from_score(risk_score, &config.risk_tier_thresholds);
        if surcharge > 0 {
            debug!(
                account = %account.id,
                risk_score,
                ?band,
                prior_violations,
                base_fee,
                surcharge,
                "penalty surcharge"
            );
        }
        Ok(PenaltyAssessment {
            band,
            prior_violations,
            surcharge,
        })
    }
}
