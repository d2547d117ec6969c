//! Engine configuration surface.
//!
//! [`EngineConfig`] carries every numeric threshold the engine uses. Updates
//! arrive as a list of named [`ConfigOption`]s, are applied to a copy, and
//! the copy is validated as a whole before it replaces the active
//! configuration.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // --- demurrage ---
    pub grace_period_hours: u64,
    pub hourly_decay_rate_low_ppb: u64,
    pub hourly_decay_rate_high_ppb: u64,
    pub max_decay_cap_ppb: u64,
    pub fiat_ratio_threshold_ppm: u64,
    pub epoch_duration_secs: u64,

    // --- pattern analysis ---
    pub history_capacity: usize,
    pub history_window_secs: u64,
    pub risk_window_secs: u64,
    pub velocity_saturation_count: u32,
    pub min_interval_secs: u64,
    pub reciprocity_window_secs: u64,
    pub risk_tier_thresholds: [u16; RISK_TIER_COUNT],
    pub risk_decay_per_hour: u64,
    pub velocity_weight_bps: u64,
    pub concentration_weight_bps: u64,
    pub reciprocity_weight_bps: u64,
    pub fiat_backing_discount_bps: u64,

    // --- penalties ---
    pub penalty_window_secs: u64,
    pub penalty_escalation_bps: u64,
    pub penalty_multiplier_cap_bps: u64,
    pub tier_surcharge_bps: [u64; RISK_TIER_COUNT + 1],
    pub large_transfer_threshold: u64,

    // --- fees and health ---
    pub base_fee: u64,
    pub min_fee: u64,
    pub max_fee: u64,
    pub lhi_fee_floor_ppm: u64,
    pub lhi_upper_threshold_ppm: u64,
    pub lhi_emergency_threshold_ppm: u64,
    pub lhi_halt_threshold_ppm: u64,
    pub lhi_recovery_hysteresis_ppm: u64,
    pub fee_split_host_bps: u64,
    pub fee_split_pool_bps: u64,
    pub fee_split_reserve_bps: u64,
    pub cross_chain_bonus_bps: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_period_hours: DEFAULT_GRACE_PERIOD_HOURS,
            hourly_decay_rate_low_ppb: DEFAULT_HOURLY_DECAY_RATE_LOW_PPB,
            hourly_decay_rate_high_ppb: DEFAULT_HOURLY_DECAY_RATE_HIGH_PPB,
            max_decay_cap_ppb: DEFAULT_MAX_DECAY_CAP_PPB,
            fiat_ratio_threshold_ppm: DEFAULT_FIAT_RATIO_THRESHOLD_PPM,
            epoch_duration_secs: DEFAULT_EPOCH_DURATION_SECS,

            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_window_secs: DEFAULT_HISTORY_WINDOW_SECS,
            risk_window_secs: DEFAULT_RISK_WINDOW_SECS,
            velocity_saturation_count: DEFAULT_VELOCITY_SATURATION_COUNT,
            min_interval_secs: DEFAULT_MIN_INTERVAL_SECS,
            reciprocity_window_secs: DEFAULT_RECIPROCITY_WINDOW_SECS,
            risk_tier_thresholds: DEFAULT_RISK_TIER_THRESHOLDS,
            risk_decay_per_hour: DEFAULT_RISK_DECAY_PER_HOUR,
            velocity_weight_bps: DEFAULT_VELOCITY_WEIGHT_BPS,
            concentration_weight_bps: DEFAULT_CONCENTRATION_WEIGHT_BPS,
            reciprocity_weight_bps: DEFAULT_RECIPROCITY_WEIGHT_BPS,
            fiat_backing_discount_bps: DEFAULT_FIAT_BACKING_DISCOUNT_BPS,

            penalty_window_secs: DEFAULT_PENALTY_WINDOW_SECS,
            penalty_escalation_bps: DEFAULT_PENALTY_ESCALATION_BPS,
            penalty_multiplier_cap_bps: DEFAULT_PENALTY_MULTIPLIER_CAP_BPS,
            tier_surcharge_bps: DEFAULT_TIER_SURCHARGE_BPS,
            large_transfer_threshold: DEFAULT_LARGE_TRANSFER_THRESHOLD,

            base_fee: DEFAULT_BASE_FEE,
            min_fee: DEFAULT_MIN_FEE,
            max_fee: DEFAULT_MAX_FEE,
            lhi_fee_floor_ppm: DEFAULT_LHI_FEE_FLOOR_PPM,
            lhi_upper_threshold_ppm: DEFAULT_LHI_UPPER_THRESHOLD_PPM,
            lhi_emergency_threshold_ppm: DEFAULT_LHI_EMERGENCY_THRESHOLD_PPM,
            lhi_halt_threshold_ppm: DEFAULT_LHI_HALT_THRESHOLD_PPM,
            lhi_recovery_hysteresis_ppm: DEFAULT_LHI_RECOVERY_HYSTERESIS_PPM,
            fee_split_host_bps: DEFAULT_FEE_SPLIT_HOST_BPS,
            fee_split_pool_bps: DEFAULT_FEE_SPLIT_POOL_BPS,
            fee_split_reserve_bps: DEFAULT_FEE_SPLIT_RESERVE_BPS,
            cross_chain_bonus_bps: DEFAULT_CROSS_CHAIN_BONUS_BPS,
        }
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidConfiguration(reason.into())
}

impl EngineConfig {
    pub fn grace_period_secs(&self) -> u64 {
        self.grace_period_hours.saturating_mul(SECS_PER_HOUR)
    }

    /// Check every cross-field invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_decay_cap_ppb >= PPB {
            return Err(invalid(format!(
                "maxDecayCap {} ppb must be below 100%",
                self.max_decay_cap_ppb
            )));
        }
        if self.hourly_decay_rate_low_ppb > PPB || self.hourly_decay_rate_high_ppb > PPB {
            return Err(invalid("hourly decay rates must not exceed 100%"));
        }
        if self.epoch_duration_secs == 0 {
            return Err(invalid("epochDurationSecs must be positive"));
        }

        if self.history_capacity == 0 || self.history_window_secs == 0 {
            return Err(invalid("history capacity and window must be positive"));
        }
        if self.risk_window_secs == 0 || self.reciprocity_window_secs == 0 {
            return Err(invalid("riskWindowSeconds and reciprocity window must be positive"));
        }
        if self.velocity_saturation_count == 0 {
            return Err(invalid("velocity saturation count must be positive"));
        }
        let t = self.risk_tier_thresholds;
        if t[0] == 0 || t.windows(2).any(|w| w[0] >= w[1]) || t[RISK_TIER_COUNT - 1] > MAX_RISK_SCORE {
            return Err(invalid(format!(
                "riskTierThresholds {t:?} must be strictly ascending within 1..={MAX_RISK_SCORE}"
            )));
        }
        let weights = self
            .velocity_weight_bps
            .saturating_add(self.concentration_weight_bps)
            .saturating_add(self.reciprocity_weight_bps);
        if weights != BPS {
            return Err(invalid(format!("risk weights sum to {weights} bps, expected {BPS}")));
        }
        if self.fiat_backing_discount_bps > BPS {
            return Err(invalid("fiat backing discount must not exceed 100%"));
        }

        if self.penalty_window_secs == 0 {
            return Err(invalid("penaltyWindowSeconds must be positive"));
        }
        if self.penalty_escalation_bps <= BPS {
            return Err(invalid("penalty escalation must exceed 1.0x"));
        }
        if self.penalty_multiplier_cap_bps == 0 {
            return Err(invalid("penaltyMultiplierCap must be positive"));
        }
        if self.tier_surcharge_bps.windows(2).any(|w| w[0] > w[1]) {
            return Err(invalid("tier surcharges must be non-decreasing"));
        }
        if self.large_transfer_threshold == 0 {
            return Err(invalid("large transfer threshold must be positive"));
        }

        if self.min_fee > self.max_fee || self.base_fee > self.max_fee {
            return Err(invalid(format!(
                "fees out of order: min {} base {} max {}",
                self.min_fee, self.base_fee, self.max_fee
            )));
        }
        if self.lhi_fee_floor_ppm == 0 || self.lhi_fee_floor_ppm > PPM {
            return Err(invalid("LHI fee floor must be within (0, 1]"));
        }
        let (halt, emergency, upper) = (
            self.lhi_halt_threshold_ppm,
            self.lhi_emergency_threshold_ppm,
            self.lhi_upper_threshold_ppm,
        );
        if !(0 < halt && halt < emergency && emergency < upper) {
            return Err(invalid(format!(
                "LHI thresholds out of order: halt {halt} emergency {emergency} upper {upper}"
            )));
        }
        if self.lhi_recovery_hysteresis_ppm == 0
            || upper.saturating_add(self.lhi_recovery_hysteresis_ppm) > PPM
        {
            return Err(invalid("lhiRecoveryHysteresis must be positive with upper + hysteresis <= 1"));
        }

        let split = self
            .fee_split_host_bps
            .saturating_add(self.fee_split_pool_bps)
            .saturating_add(self.fee_split_reserve_bps);
        if split != BPS {
            return Err(invalid(format!("fee split sums to {split} bps, expected {BPS}")));
        }
        Ok(())
    }

    /// Apply `options` to a copy and validate the result. `self` is untouched.
    pub fn with_options(&self, options: &[ConfigOption]) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        for option in options {
            option.apply(&mut next);
        }
        next.validate()?;
        Ok(next)
    }
}

/// A single named configuration update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "option", content = "value", rename_all = "camelCase")]
pub enum ConfigOption {
    GracePeriodHours(u64),
    HourlyDecayRateLow(u64),
    HourlyDecayRateHigh(u64),
    MaxDecayCap(u64),
    FiatRatioThreshold(u64),
    EpochDurationSecs(u64),
    RiskWindowSeconds(u64),
    RiskTierThresholds([u16; RISK_TIER_COUNT]),
    RiskDecayPerHour(u64),
    PenaltyWindowSeconds(u64),
    PenaltyEscalationBps(u64),
    PenaltyMultiplierCap(u64),
    LargeTransferThreshold(u64),
    BaseFee(u64),
    MinFee(u64),
    MaxFee(u64),
    LhiFeeFloor(u64),
    LhiUpperThreshold(u64),
    LhiEmergencyThreshold(u64),
    LhiHaltThreshold(u64),
    LhiRecoveryHysteresis(u64),
    FeeSplitHostPct(u64),
    FeeSplitPoolPct(u64),
    FeeSplitReservePct(u64),
}

impl ConfigOption {
    fn apply(&self, c: &mut EngineConfig) {
        match *self {
            Self::GracePeriodHours(v) => c.grace_period_hours = v,
            Self::HourlyDecayRateLow(v) => c.hourly_decay_rate_low_ppb = v,
            Self::HourlyDecayRateHigh(v) => c.hourly_decay_rate_high_ppb = v,
            Self::MaxDecayCap(v) => c.max_decay_cap_ppb = v,
            Self::FiatRatioThreshold(v) => c.fiat_ratio_threshold_ppm = v,
            Self::EpochDurationSecs(v) => c.epoch_duration_secs = v,
            Self::RiskWindowSeconds(v) => c.risk_window_secs = v,
            Self::RiskTierThresholds(v) => c.risk_tier_thresholds = v,
            Self::RiskDecayPerHour(v) => c.risk_decay_per_hour = v,
            Self::PenaltyWindowSeconds(v) => c.penalty_window_secs = v,
            Self::PenaltyEscalationBps(v) => c.penalty_escalation_bps = v,
            Self::PenaltyMultiplierCap(v) => c.penalty_multiplier_cap_bps = v,
            Self::LargeTransferThreshold(v) => c.large_transfer_threshold = v,
            Self::BaseFee(v) => c.base_fee = v,
            Self::MinFee(v) => c.min_fee = v,
            Self::MaxFee(v) => c.max_fee = v,
            Self::LhiFeeFloor(v) => c.lhi_fee_floor_ppm = v,
            Self::LhiUpperThreshold(v) => c.lhi_upper_threshold_ppm = v,
            Self::LhiEmergencyThreshold(v) => c.lhi_emergency_threshold_ppm = v,
            Self::LhiHaltThreshold(v) => c.lhi_halt_threshold_ppm = v,
            Self::LhiRecoveryHysteresis(v) => c.lhi_recovery_hysteresis_ppm = v,
            Self::FeeSplitHostPct(v) => c.fee_split_host_bps = v,
            Self::FeeSplitPoolPct(v) => c.fee_split_pool_bps = v,
            Self::FeeSplitReservePct(v) => c.fee_split_reserve_bps = v,
        }
    }

    /// Parse a `name=value` pair using the external option names.
    ///
    /// `riskTierThresholds` takes a comma-separated triple.
    ///
    /// # Examples
    ///
    /// ```
    /// use stab_core::config::ConfigOption;
    ///
    /// assert_eq!(
    ///     ConfigOption::parse("maxDecayCap", "400000000").unwrap(),
    ///     ConfigOption::MaxDecayCap(400_000_000),
    /// );
    /// assert!(ConfigOption::parse("noSuchOption", "1").is_err());
    /// ```
    pub fn parse(name: &str, value: &str) -> Result<Self, ConfigError> {
        let num = || {
            value
                .trim()
                .parse::<u64>()
                .map_err(|e| invalid(format!("{name}: {e}")))
        };
        Ok(match name {
            "gracePeriodHours" => Self::GracePeriodHours(num()?),
            "hourlyDecayRateLow" => Self::HourlyDecayRateLow(num()?),
            "hourlyDecayRateHigh" => Self::HourlyDecayRateHigh(num()?),
            "maxDecayCap" => Self::MaxDecayCap(num()?),
            "fiatRatioThreshold" => Self::FiatRatioThreshold(num()?),
            "epochDurationSecs" => Self::EpochDurationSecs(num()?),
            "riskWindowSeconds" => Self::RiskWindowSeconds(num()?),
            "riskTierThresholds" => {
                let parts: Vec<u16> = value
                    .split(',')
                    .map(|p| p.trim().parse::<u16>())
                    .collect::<Result<_, _>>()
                    .map_err(|e| invalid(format!("{name}: {e}")))?;
                let tiers: [u16; RISK_TIER_COUNT] = parts.try_into().map_err(|_| {
                    invalid(format!("{name}: expected {RISK_TIER_COUNT} values"))
                })?;
                Self::RiskTierThresholds(tiers)
            }
            "riskDecayPerHour" => Self::RiskDecayPerHour(num()?),
            "penaltyWindowSeconds" => Self::PenaltyWindowSeconds(num()?),
            "penaltyEscalationBps" => Self::PenaltyEscalationBps(num()?),
            "penaltyMultiplierCap" => Self::PenaltyMultiplierCap(num()?),
            "largeTransferThreshold" => Self::LargeTransferThreshold(num()?),
            "baseFee" => Self::BaseFee(num()?),
            "minFee" => Self::MinFee(num()?),
            "maxFee" => Self::MaxFee(num()?),
            "lhiFeeFloor" => Self::LhiFeeFloor(num()?),
            "lhiUpperThreshold" => Self::LhiUpperThreshold(num()?),
            "lhiEmergencyThreshold" => Self::LhiEmergencyThreshold(num()?),
            "lhiHaltThreshold" => Self::LhiHaltThreshold(num()?),
            "lhiRecoveryHysteresis" => Self::LhiRecoveryHysteresis(num()?),
            "feeSplitHostPct" => Self::FeeSplitHostPct(num()?),
            "feeSplitPoolPct" => Self::FeeSplitPoolPct(num()?),
            "feeSplitReservePct" => Self::FeeSplitReservePct(num()?),
            other => return Err(invalid(format!("unknown option {other}"))),
        })
    }
}
