//! Fiat-activity decay tiers.
//!
//! Accounts whose verified offramp volume is a large enough share of their
//! onramp volume are treated as real economic users and decay at the
//! slower high-tier rate. Everyone else, including accounts that never
//! onramped, decays at the low-tier rate.

use stab_core::config::EngineConfig;
use stab_core::traits::DecayTierSelector;
use stab_core::types::SettlementTotals;

/// Two-tier selector keyed on `offramp / onramp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FiatRatioTierSelector;

impl FiatRatioTierSelector {
    pub fn new() -> Self {
        Self
    }

    /// True when the account qualifies for the high (slower) tier.
    pub fn is_high_tier(settlement: &SettlementTotals, config: &EngineConfig) -> bool {
        settlement.onramp > 0 && settlement.fiat_ratio_ppm() >= config.fiat_ratio_threshold_ppm
    }
}

impl DecayTierSelector for FiatRatioTierSelector {
    fn hourly_rate_ppb(&self, settlement: &SettlementTotals, config: &EngineConfig) -> u64 {
        if Self::is_high_tier(settlement, config) {
            config.hourly_decay_rate_high_ppb
        } else {
            config.hourly_decay_rate_low_ppb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(onramp: u64, offramp: u64) -> SettlementTotals {
        SettlementTotals { onramp, offramp }
    }

    #[test]
    fn no_onramp_is_low_tier() {
        let c = EngineConfig::default();
        let s = FiatRatioTierSelector::new();
        assert_eq!(s.hourly_rate_ppb(&totals(0, 0), &c), c.hourly_decay_rate_low_ppb);
        // Offramp without onramp never qualifies.
        assert_eq!(s.hourly_rate_ppb(&totals(0, 5_000), &c), c.hourly_decay_rate_low_ppb);
    }

    #[test]
    fn threshold_is_inclusive() {
        let c = EngineConfig::default();
        let s = FiatRatioTierSelector::new();
        // 499/1000 = 0.499 < 0.5
        assert_eq!(s.hourly_rate_ppb(&totals(1_000, 499), &c), c.hourly_decay_rate_low_ppb);
        // 500/1000 = 0.5 >= 0.5
        assert_eq!(s.hourly_rate_ppb(&totals(1_000, 500), &c), c.hourly_decay_rate_high_ppb);
    }

    #[test]
    fn threshold_follows_config() {
        let c = EngineConfig {
            fiat_ratio_threshold_ppm: 100_000,
            ..EngineConfig::default()
        };
        assert!(FiatRatioTierSelector::is_high_tier(&totals(1_000, 100), &c));
        assert!(!FiatRatioTierSelector::is_high_tier(&totals(1_000, 99), &c));
    }
}
