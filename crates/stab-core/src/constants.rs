//! Fixed-point precisions and engine defaults.
//!
//! Every fractional quantity in the engine is an integer scaled by one of
//! three precisions:
//!
//! | Precision | Used for                                        |
//! |-----------|-------------------------------------------------|
//! | [`PPB`]   | decay rates and decay fractions                 |
//! | [`PPM`]   | ratios, LHI, breaker thresholds, market pressure |
//! | [`BPS`]   | percentages, weights, multipliers               |
//!
//! All divisions floor.

/// Parts-per-billion: 1.0 == `1_000_000_000`.
pub const PPB: u64 = 1_000_000_000;

/// Parts-per-million: 1.0 == `1_000_000`.
pub const PPM: u64 = 1_000_000;

/// Basis points: 1.0 == `10_000`.
pub const BPS: u64 = 10_000;

pub const SECS_PER_HOUR: u64 = 3_600;
pub const SECS_PER_DAY: u64 = 86_400;

/// Upper bound of every risk score and risk signal.
pub const MAX_RISK_SCORE: u16 = 1000;

/// Number of risk bands above "none".
pub const RISK_TIER_COUNT: usize = 3;

// ---------------------------------------------------------------------------
// Demurrage defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_GRACE_PERIOD_HOURS: u64 = 24;
/// 0.10% per hour for accounts below the fiat activity threshold.
pub const DEFAULT_HOURLY_DECAY_RATE_LOW_PPB: u64 = 1_000_000;
/// 0.05% per hour for accounts at or above the fiat activity threshold.
pub const DEFAULT_HOURLY_DECAY_RATE_HIGH_PPB: u64 = 500_000;
/// Decay never removes more than half of a raw balance.
pub const DEFAULT_MAX_DECAY_CAP_PPB: u64 = PPB / 2;
/// Offramp / onramp ratio separating the two decay tiers.
pub const DEFAULT_FIAT_RATIO_THRESHOLD_PPM: u64 = PPM / 2;
pub const DEFAULT_EPOCH_DURATION_SECS: u64 = SECS_PER_DAY;

// ---------------------------------------------------------------------------
// Pattern analysis defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;
pub const DEFAULT_HISTORY_WINDOW_SECS: u64 = SECS_PER_DAY;
pub const DEFAULT_RISK_WINDOW_SECS: u64 = SECS_PER_HOUR;
pub const DEFAULT_VELOCITY_SATURATION_COUNT: u32 = 10;
pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_RECIPROCITY_WINDOW_SECS: u64 = 600;
pub const DEFAULT_RISK_TIER_THRESHOLDS: [u16; RISK_TIER_COUNT] = [300, 500, 800];
pub const DEFAULT_RISK_DECAY_PER_HOUR: u64 = 100;
pub const DEFAULT_VELOCITY_WEIGHT_BPS: u64 = 6_000;
pub const DEFAULT_CONCENTRATION_WEIGHT_BPS: u64 = 1_500;
pub const DEFAULT_RECIPROCITY_WEIGHT_BPS: u64 = 2_500;
pub const DEFAULT_FIAT_BACKING_DISCOUNT_BPS: u64 = 2_000;

// ---------------------------------------------------------------------------
// Penalty defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_PENALTY_WINDOW_SECS: u64 = SECS_PER_DAY;
/// Each prior violation in the window multiplies the surcharge by 1.25.
pub const DEFAULT_PENALTY_ESCALATION_BPS: u64 = 12_500;
/// Surcharges never exceed 10x the base fee.
pub const DEFAULT_PENALTY_MULTIPLIER_CAP_BPS: u64 = 100_000;
/// Surcharge as a share of the base fee, per band (None, Tier1, Tier2, Tier3).
pub const DEFAULT_TIER_SURCHARGE_BPS: [u64; RISK_TIER_COUNT + 1] = [0, 5_000, 10_000, 20_000];
pub const DEFAULT_LARGE_TRANSFER_THRESHOLD: u64 = 1_000_000;
/// Violation timestamps retained per account.
pub const MAX_VIOLATION_LOG: usize = 64;

// ---------------------------------------------------------------------------
// Health / oracle defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_FEE: u64 = 1_000;
pub const DEFAULT_MIN_FEE: u64 = 100;
pub const DEFAULT_MAX_FEE: u64 = 100_000;
/// LHI floor in the fee denominator: 0.05.
pub const DEFAULT_LHI_FEE_FLOOR_PPM: u64 = 50_000;
pub const DEFAULT_LHI_UPPER_THRESHOLD_PPM: u64 = 300_000;
pub const DEFAULT_LHI_EMERGENCY_THRESHOLD_PPM: u64 = 200_000;
pub const DEFAULT_LHI_HALT_THRESHOLD_PPM: u64 = 100_000;
pub const DEFAULT_LHI_RECOVERY_HYSTERESIS_PPM: u64 = 100_000;
pub const DEFAULT_FEE_SPLIT_HOST_BPS: u64 = 7_000;
pub const DEFAULT_FEE_SPLIT_POOL_BPS: u64 = 2_000;
pub const DEFAULT_FEE_SPLIT_RESERVE_BPS: u64 = 1_000;
pub const DEFAULT_CROSS_CHAIN_BONUS_BPS: u64 = 10;
