//! Composite risk scoring with time relaxation.

use stab_core::config::EngineConfig;
use stab_core::constants::{BPS, MAX_RISK_SCORE, SECS_PER_HOUR};
use stab_core::traits::RiskCombiner;
use stab_core::types::{
    Account, RiskBand, RiskSignals, RiskState, Timestamp, TransferEvent, TransferHistory,
};
use tracing::debug;

use crate::signals;

/// Weighted sum of signals with a discount for verified fiat usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedRiskCombiner;

impl RiskCombiner for WeightedRiskCombiner {
    fn combine(&self, s: &RiskSignals, fiat_ratio_ppm: u64, c: &EngineConfig) -> u16 {
        let weighted = s.velocity as u128 * c.velocity_weight_bps as u128
            + s.concentration as u128 * c.concentration_weight_bps as u128
            + s.reciprocity as u128 * c.reciprocity_weight_bps as u128;
        let mut score = weighted / BPS as u128;
        if fiat_ratio_ppm > 0 && fiat_ratio_ppm >= c.fiat_ratio_threshold_ppm {
            let discount = score * c.fiat_backing_discount_bps.min(BPS) as u128 / BPS as u128;
            score -= discount;
        }
        score.min(MAX_RISK_SCORE as u128) as u16
    }
}

/// Linear relaxation of a persisted score toward zero.
///
/// # Examples
///
/// ```
/// use stab_core::types::RiskState;
/// use stab_risk::scorer::decayed_score;
///
/// let state = RiskState { score: 600, updated_at: 0 };
/// assert_eq!(decayed_score(&state, 1_800, 100), 550);
/// assert_eq!(decayed_score(&state, 100 * 3_600, 100), 0);
/// ```
pub fn decayed_score(state: &RiskState, now: Timestamp, per_hour: u64) -> u16 {
    let elapsed = now.saturating_sub(state.updated_at) as u128;
    let relaxed = elapsed * per_hour as u128 / SECS_PER_HOUR as u128;
    (state.score as u128).saturating_sub(relaxed) as u16
}

/// Result of scoring one candidate outbound transfer.
///
/// Nothing here has been written to the account; the engine commits
/// `history` and `state` only if the transfer commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    pub signals: RiskSignals,
    /// Score of this transfer alone.
    pub composite: u16,
    /// `max(decayed previous, composite)`, the value to persist.
    pub score: u16,
    pub band: RiskBand,
    pub state: RiskState,
    /// Sender history with the candidate appended.
    pub history: TransferHistory,
}

/// Pattern analyzer and risk scorer.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer<C = WeightedRiskCombiner> {
    combiner: C,
}

impl RiskScorer {
    pub fn new() -> Self {
        Self {
            combiner: WeightedRiskCombiner,
        }
    }
}

impl<C: RiskCombiner> RiskScorer<C> {
    pub fn with_combiner(combiner: C) -> Self {
        Self { combiner }
    }

    /// Score `candidate` (an outbound event for `account`) without mutating
    /// the account.
    pub fn record_and_score(
        &self,
        account: &Account,
        candidate: TransferEvent,
        config: &EngineConfig,
    ) -> RiskAssessment {
        let now = candidate.timestamp;
        let history = signals::with_event(&account.history, candidate.clone(), config);
        let signals = signals::evaluate(&account.history, &history, &candidate, config);
        let composite =
            self.combiner
                .combine(&signals, account.settlement.fiat_ratio_ppm(), config);

        let previous = decayed_score(&account.risk, now, config.risk_decay_per_hour);
        let score = previous.max(composite);
        let mut state = account.risk;
        state.set(score as u64, now.max(account.risk.updated_at));
        let band = RiskBand::from_score(state.score, &config.risk_tier_thresholds);

        debug!(
            account = %account.id,
            velocity = signals.velocity,
            concentration = signals.concentration,
            reciprocity = signals.reciprocity,
            composite,
            previous,
            score = state.score,
            ?band,
            "risk scored"
        );

        RiskAssessment {
            signals,
            composite,
            score: state.score,
            band,
            state,
            history,
        }
    }

    /// Current persisted score relaxed to `now`, without a new transfer.
    pub fn current_score(&self, account: &Account, now: Timestamp, config: &EngineConfig) -> u16 {
        decayed_score(&account.risk, now, config.risk_decay_per_hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stab_core::types::{AccountId, Direction, SettlementDirection};

    fn out(amount: u64, ts: Timestamp, to: &str) -> TransferEvent {
        TransferEvent {
            amount,
            timestamp: ts,
            counterparty: AccountId::from(to),
            direction: Direction::Outbound,
        }
    }

    fn commit(account: &mut Account, a: RiskAssessment) {
        account.history = a.history;
        account.risk = a.state;
    }

    #[test]
    fn combiner_weights() {
        let c = EngineConfig::default();
        let s = RiskSignals {
            velocity: 1000,
            concentration: 1000,
            reciprocity: 1000,
        };
        assert_eq!(WeightedRiskCombiner.combine(&s, 0, &c), 1000);
        let s = RiskSignals {
            velocity: 500,
            concentration: 0,
            reciprocity: 0,
        };
        assert_eq!(WeightedRiskCombiner.combine(&s, 0, &c), 300);
    }

    #[test]
    fn fiat_backing_discount() {
        let c = EngineConfig::default();
        let s = RiskSignals {
            velocity: 1000,
            concentration: 0,
            reciprocity: 0,
        };
        assert_eq!(WeightedRiskCombiner.combine(&s, 499_999, &c), 600);
        assert_eq!(WeightedRiskCombiner.combine(&s, 500_000, &c), 480);
    }

    #[test]
    fn burst_climbs_through_bands() {
        let c = EngineConfig::default();
        let scorer = RiskScorer::new();
        let mut a = Account::new(AccountId::from("alice"), 0);
        let mut bands = Vec::new();
        for i in 0..12u64 {
            let r = scorer.record_and_score(&a, out(100, 1_000 + i * 300, "bob"), &c);
            bands.push(r.band);
            commit(&mut a, r);
        }
        assert_eq!(bands[3], RiskBand::None);
        assert_eq!(bands[4], RiskBand::Tier1);
        assert_eq!(bands[8], RiskBand::Tier2);
        assert_eq!(bands[10], RiskBand::Tier2);
        assert_eq!(bands[11], RiskBand::Tier2);
    }

    #[test]
    fn score_relaxes_between_bursts() {
        let c = EngineConfig::default();
        let scorer = RiskScorer::new();
        let mut a = Account::new(AccountId::from("alice"), 0);
        for i in 0..10u64 {
            let r = scorer.record_and_score(&a, out(100, 1_000 + i * 60, "bob"), &c);
            commit(&mut a, r);
        }
        assert_eq!(a.risk.score, 600);
        // Five hours later the persisted score has relaxed by 500 points.
        let later = a.risk.updated_at + 5 * SECS_PER_HOUR;
        assert_eq!(scorer.current_score(&a, later, &c), 100);
    }

    #[test]
    fn scoring_does_not_mutate_account() {
        let c = EngineConfig::default();
        let scorer = RiskScorer::new();
        let a = Account::new(AccountId::from("alice"), 0);
        let before = a.clone();
        let r = scorer.record_and_score(&a, out(100, 10, "bob"), &c);
        assert_eq!(r.history.len(), 1);
        assert_eq!(a, before);
    }

    #[test]
    fn fiat_user_scores_lower() {
        let c = EngineConfig::default();
        let scorer = RiskScorer::new();
        let mut plain = Account::new(AccountId::from("plain"), 0);
        let mut fiat = Account::new(AccountId::from("fiat"), 0);
        fiat.settlement.record(SettlementDirection::Onramp, 1_000);
        fiat.settlement.record(SettlementDirection::Offramp, 900);
        for i in 0..8u64 {
            let ev = out(100, 1_000 + i * 300, "bob");
            let r1 = scorer.record_and_score(&plain, ev.clone(), &c);
            let r2 = scorer.record_and_score(&fiat, ev, &c);
            assert!(r2.score <= r1.score);
            commit(&mut plain, r1);
            commit(&mut fiat, r2);
        }
        assert!(fiat.risk.score < plain.risk.score);
    }

    proptest! {
        #[test]
        fn combine_monotone_in_signals(
            v in 0u16..=1000, k in 0u16..=1000, r in 0u16..=1000,
            dv in 0u16..=1000, dk in 0u16..=1000, dr in 0u16..=1000,
        ) {
            let c = EngineConfig::default();
            let lo = RiskSignals { velocity: v, concentration: k, reciprocity: r };
            let hi = RiskSignals {
                velocity: v.saturating_add(dv).min(1000),
                concentration: k.saturating_add(dk).min(1000),
                reciprocity: r.saturating_add(dr).min(1000),
            };
            prop_assert!(
                WeightedRiskCombiner.combine(&lo, 0, &c) <= WeightedRiskCombiner.combine(&hi, 0, &c)
            );
        }

        #[test]
        fn persisted_score_never_below_composite(gaps in proptest::collection::vec(1u64..7_200, 1..40)) {
            let c = EngineConfig::default();
            let scorer = RiskScorer::new();
            let mut a = Account::new(AccountId::from("alice"), 0);
            let mut now = 0;
            for gap in gaps {
                now += gap;
                let r = scorer.record_and_score(&a, out(100, now, "bob"), &c);
                prop_assert!(r.score >= r.composite);
                prop_assert!(r.score <= MAX_RISK_SCORE);
                commit(&mut a, r);
            }
        }
    }
}
