//! Demurrage engine.
//!
//! Decay is linear in whole hours past the grace period and capped, so the
//! effective balance of an account is a pure function of its raw balance,
//! its activity anchor, its settlement totals and `now`. Nothing is stored
//! between commits; [`DemurrageEngine::realize`] folds pending decay into
//! the raw balance and moves the anchor forward.
//!
//! All arithmetic is integer-only with u128 intermediates.

use stab_core::config::EngineConfig;
use stab_core::constants::{PPB, SECS_PER_HOUR};
use stab_core::error::InvariantError;
use stab_core::traits::DecayTierSelector;
use stab_core::types::{Account, Timestamp};
use tracing::debug;

use crate::tier::FiatRatioTierSelector;

/// Computes and realizes time-based balance decay.
///
/// Generic over the tier strategy; the default is the fiat-ratio selector.
#[derive(Debug, Clone, Default)]
pub struct DemurrageEngine<S = FiatRatioTierSelector> {
    selector: S,
}

impl DemurrageEngine {
    /// Create an engine with the fiat-ratio tier selector.
    pub fn new() -> Self {
        Self {
            selector: FiatRatioTierSelector,
        }
    }
}

/// Whole hours of decay accrued between `last_activity` and `now`.
///
/// Zero inside the grace period and when `now` precedes the anchor.
///
/// # Examples
///
/// ```
/// use stab_decay::engine::decayable_hours;
///
/// let grace = 24 * 3_600;
/// assert_eq!(decayable_hours(0, grace, grace), 0);
/// assert_eq!(decayable_hours(0, grace + 3_599, grace), 0);
/// assert_eq!(decayable_hours(0, grace + 3_600, grace), 1);
/// assert_eq!(decayable_hours(500, 100, grace), 0);
/// ```
pub fn decayable_hours(last_activity: Timestamp, now: Timestamp, grace_secs: u64) -> u64 {
    let elapsed = now.saturating_sub(last_activity);
    if elapsed <= grace_secs {
        return 0;
    }
    (elapsed - grace_secs) / SECS_PER_HOUR
}

/// `floor(raw * (PPB - fraction) / PPB)`. Fractions above [`PPB`] clamp to a
/// zero result.
pub fn apply_fraction(raw: u64, fraction_ppb: u64) -> u64 {
    let retained = PPB.saturating_sub(fraction_ppb);
    // retained <= PPB, so the quotient never exceeds raw.
    (raw as u128 * retained as u128 / PPB as u128) as u64
}

impl<S: DecayTierSelector> DemurrageEngine<S> {
    pub fn with_selector(selector: S) -> Self {
        Self { selector }
    }

    pub fn selector(&self) -> &S {
        &self.selector
    }

    /// Share of the raw balance lost to decay at `now`, in ppb.
    ///
    /// `min(hours * rate, max_decay_cap)`; exempt accounts always return 0.
    pub fn decay_fraction_ppb(&self, account: &Account, now: Timestamp, config: &EngineConfig) -> u64 {
        if account.exempt {
            return 0;
        }
        let hours = decayable_hours(account.last_activity, now, config.grace_period_secs());
        if hours == 0 {
            return 0;
        }
        let rate = self.selector.hourly_rate_ppb(&account.settlement, config);
        // Saturates for multi-year dormancy instead of wrapping.
        let fraction = (hours as u128).saturating_mul(rate as u128);
        fraction.min(config.max_decay_cap_ppb as u128) as u64
    }

    /// Post-decay balance at `now`. Pure.
    pub fn effective_balance(&self, account: &Account, now: Timestamp, config: &EngineConfig) -> u64 {
        if account.exempt {
            return account.balance;
        }
        apply_fraction(account.balance, self.decay_fraction_ppb(account, now, config))
    }

    /// Amount that realizing decay at `now` would remove.
    ///
    /// Asking this of an exempt account is a caller bug.
    pub fn pending_decay(
        &self,
        account: &Account,
        now: Timestamp,
        config: &EngineConfig,
    ) -> Result<u64, InvariantError> {
        if account.exempt {
            return Err(InvariantError::ExemptAccountMisuse(account.id.clone()));
        }
        Ok(account.balance - self.effective_balance(account, now, config))
    }

    /// Fold pending decay into the raw balance and reset the activity anchor.
    ///
    /// Returns the new raw balance. Calling twice with the same `now` is a
    /// no-op the second time. The anchor never moves backwards.
    pub fn realize(&self, account: &mut Account, now: Timestamp, config: &EngineConfig) -> u64 {
        let effective = self.effective_balance(account, now, config);
        if effective != account.balance {
            debug!(
                account = %account.id,
                raw = account.balance,
                effective,
                last_activity = account.last_activity,
                now,
                "realized decay"
            );
        }
        account.balance = effective;
        account.last_activity = account.last_activity.max(now);
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stab_core::constants::{SECS_PER_DAY, SECS_PER_HOUR};
    use stab_core::types::{AccountId, SettlementDirection};

    fn engine() -> DemurrageEngine {
        DemurrageEngine::new()
    }

    fn account(balance: u64, last_activity: Timestamp) -> Account {
        let mut a = Account::new(AccountId::from("alice"), last_activity);
        a.balance = balance;
        a
    }

    fn high_tier(mut a: Account) -> Account {
        a.settlement.record(SettlementDirection::Onramp, 1_000);
        a.settlement.record(SettlementDirection::Offramp, 800);
        a
    }

    // --- grace period ---

    #[test]
    fn no_decay_inside_grace() {
        let e = engine();
        let c = EngineConfig::default();
        let a = account(1_000, 0);
        assert_eq!(e.effective_balance(&a, 0, &c), 1_000);
        assert_eq!(e.effective_balance(&a, SECS_PER_DAY, &c), 1_000);
    }

    #[test]
    fn first_hour_after_grace() {
        let e = engine();
        let c = EngineConfig::default();
        let a = account(1_000_000, 0);
        // 0.10% of 1_000_000
        assert_eq!(
            e.effective_balance(&a, SECS_PER_DAY + SECS_PER_HOUR, &c),
            999_000
        );
    }

    #[test]
    fn clock_skew_counts_as_zero_elapsed() {
        let e = engine();
        let c = EngineConfig::default();
        let a = account(1_000, 10 * SECS_PER_DAY);
        assert_eq!(e.effective_balance(&a, 0, &c), 1_000);
    }

    // --- tiers and cap ---

    #[test]
    fn forty_days_idle_hits_cap() {
        let e = engine();
        let c = EngineConfig::default();
        let a = account(1_000, 0);
        // 39 decayable days = 936 hours * 0.1% = 93.6% > 50% cap
        assert_eq!(e.effective_balance(&a, 40 * SECS_PER_DAY, &c), 500);
    }

    #[test]
    fn high_tier_decays_slower() {
        let e = engine();
        let c = EngineConfig::default();
        let now = SECS_PER_DAY + 100 * SECS_PER_HOUR;
        let low = account(1_000_000, 0);
        let high = high_tier(account(1_000_000, 0));
        assert_eq!(e.effective_balance(&low, now, &c), 900_000);
        assert_eq!(e.effective_balance(&high, now, &c), 950_000);
    }

    #[test]
    fn cap_follows_config() {
        let e = engine();
        let c = EngineConfig {
            max_decay_cap_ppb: 100_000_000,
            ..EngineConfig::default()
        };
        let a = account(1_000, 0);
        assert_eq!(e.effective_balance(&a, 400 * SECS_PER_DAY, &c), 900);
    }

    #[test]
    fn multi_year_dormancy_saturates() {
        let e = engine();
        let c = EngineConfig {
            hourly_decay_rate_low_ppb: PPB,
            ..EngineConfig::default()
        };
        let a = account(u64::MAX, 0);
        assert_eq!(e.decay_fraction_ppb(&a, u64::MAX, &c), c.max_decay_cap_ppb);
        assert_eq!(e.effective_balance(&a, u64::MAX, &c), u64::MAX / 2);
    }

    // --- exempt ---

    #[test]
    fn exempt_never_decays() {
        let e = engine();
        let c = EngineConfig::default();
        let mut a = Account::exempt(AccountId::from("reserve"), 0);
        a.balance = 1_000;
        assert_eq!(e.effective_balance(&a, 1_000 * SECS_PER_DAY, &c), 1_000);
        assert_eq!(e.decay_fraction_ppb(&a, 1_000 * SECS_PER_DAY, &c), 0);
    }

    #[test]
    fn pending_decay_on_exempt_is_misuse() {
        let e = engine();
        let c = EngineConfig::default();
        let a = Account::exempt(AccountId::from("reserve"), 0);
        assert_eq!(
            e.pending_decay(&a, SECS_PER_DAY * 3, &c),
            Err(InvariantError::ExemptAccountMisuse(AccountId::from("reserve")))
        );
    }

    // --- realize ---

    #[test]
    fn realize_is_idempotent() {
        let e = engine();
        let c = EngineConfig::default();
        let mut a = account(1_000, 0);
        let now = 40 * SECS_PER_DAY;
        assert_eq!(e.realize(&mut a, now, &c), 500);
        assert_eq!(a.last_activity, now);
        assert_eq!(e.realize(&mut a, now, &c), 500);
        assert_eq!(e.effective_balance(&a, now, &c), 500);
    }

    #[test]
    fn realize_never_moves_anchor_back() {
        let e = engine();
        let c = EngineConfig::default();
        let mut a = account(1_000, 5_000);
        e.realize(&mut a, 1_000, &c);
        assert_eq!(a.last_activity, 5_000);
        assert_eq!(a.balance, 1_000);
    }

    #[test]
    fn pending_plus_effective_is_raw() {
        let e = engine();
        let c = EngineConfig::default();
        let a = account(123_456, 0);
        let now = SECS_PER_DAY + 7 * SECS_PER_HOUR;
        let pending = e.pending_decay(&a, now, &c).unwrap();
        assert_eq!(pending + e.effective_balance(&a, now, &c), 123_456);
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn decay_never_exceeds_cap(
            raw in any::<u64>(),
            idle in any::<u64>(),
            cap in 0u64..PPB,
        ) {
            let e = engine();
            let c = EngineConfig { max_decay_cap_ppb: cap, ..EngineConfig::default() };
            let a = account(raw, 0);
            let eff = e.effective_balance(&a, idle, &c);
            prop_assert!(eff <= raw);
            prop_assert!(eff >= apply_fraction(raw, cap));
        }

        #[test]
        fn effective_non_increasing_in_time(
            raw in 0u64..=u64::MAX / 2,
            t1 in 0u64..400 * SECS_PER_DAY,
            dt in 0u64..400 * SECS_PER_DAY,
        ) {
            let e = engine();
            let c = EngineConfig::default();
            let a = account(raw, 0);
            prop_assert!(e.effective_balance(&a, t1 + dt, &c) <= e.effective_balance(&a, t1, &c));
        }

        #[test]
        fn realize_then_read_matches(raw in any::<u64>(), now in 0u64..1_000 * SECS_PER_DAY) {
            let e = engine();
            let c = EngineConfig::default();
            let mut a = account(raw, 0);
            let expected = e.effective_balance(&a, now, &c);
            prop_assert_eq!(e.realize(&mut a, now, &c), expected);
            prop_assert_eq!(e.effective_balance(&a, now, &c), expected);
        }
    }
}
