//! Economics oracle: dynamic fees, host rewards and fee splitting.

use std::sync::atomic::{AtomicU64, Ordering};

use stab_core::config::EngineConfig;
use stab_core::constants::{BPS, PPM};
use stab_core::fixed::{ratio_ppm, sqrt_ppm};
use stab_core::types::{FeeSplit, NetworkMetrics};

/// Per-transfer base fee for the given health.
///
/// `base * (1 + pressure) * sqrt(volume / target) / max(lhi, floor)`,
/// clamped to `[min_fee, max_fee]`. Pressure below -1.0 is treated as -1.0.
pub fn dynamic_fee(metrics: &NetworkMetrics, lhi_ppm: u64, config: &EngineConfig) -> u64 {
    let pressure = metrics.market_pressure_ppm.max(-(PPM as i64));
    let pressure_factor = (PPM as i128 + pressure as i128) as u128;
    let volume_sqrt = sqrt_ppm(ratio_ppm(metrics.volume_observed, metrics.volume_target)) as u128;
    let denom = PPM as u128 * lhi_ppm.max(config.lhi_fee_floor_ppm).max(1) as u128;

    let fee = (config.base_fee as u128)
        .saturating_mul(pressure_factor)
        .saturating_mul(volume_sqrt)
        / denom;
    fee.clamp(config.min_fee as u128, config.max_fee as u128) as u64
}

/// Host reward for one fee unit: `fee * host_pct * performance + bonus`.
///
/// `bonus = cross_chain_volume * cross_chain_bonus_bps / BPS`.
pub fn host_reward(fee: u64, metrics: &NetworkMetrics, config: &EngineConfig) -> u64 {
    let bps = BPS as u128;
    let base = fee as u128 * config.fee_split_host_bps as u128 / bps
        * metrics.performance_bps as u128
        / bps;
    let bonus = metrics.cross_chain_volume as u128 * config.cross_chain_bonus_bps as u128 / bps;
    base.saturating_add(bonus).min(u64::MAX as u128) as u64
}

/// Split `total` host / pool / reserve. The reserve takes the rounding
/// remainder, so the parts always sum to `total`.
///
/// # Examples
///
/// ```
/// use stab_core::config::EngineConfig;
/// use stab_health::oracle::split_fee;
///
/// let s = split_fee(1_001, &EngineConfig::default());
/// assert_eq!((s.host, s.pool, s.reserve), (700, 200, 101));
/// ```
pub fn split_fee(total: u64, config: &EngineConfig) -> FeeSplit {
    let bps = BPS as u128;
    let host = (total as u128 * config.fee_split_host_bps as u128 / bps) as u64;
    let pool = (total as u128 * config.fee_split_pool_bps as u128 / bps) as u64;
    FeeSplit {
        host,
        pool,
        reserve: total.saturating_sub(host).saturating_sub(pool),
    }
}

/// Oracle output for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleQuote {
    pub dynamic_fee: u64,
    pub host_reward: u64,
    pub fee_split: FeeSplit,
}

pub fn quote(metrics: &NetworkMetrics, lhi_ppm: u64, config: &EngineConfig) -> OracleQuote {
    let fee = dynamic_fee(metrics, lhi_ppm, config);
    OracleQuote {
        dynamic_fee: fee,
        host_reward: host_reward(fee, metrics, config),
        fee_split: split_fee(fee, config),
    }
}

fn saturating_add(cell: &AtomicU64, amount: u64) {
    // The closure always returns Some, so the update cannot fail.
    let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        Some(v.saturating_add(amount))
    });
}

/// Lock-free accumulator of collected fees.
#[derive(Debug, Default)]
pub struct FeePool {
    host: AtomicU64,
    pool: AtomicU64,
    reserve: AtomicU64,
}

impl FeePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `split` to the running totals, saturating at `u64::MAX`.
    pub fn deposit(&self, split: FeeSplit) {
        saturating_add(&self.host, split.host);
        saturating_add(&self.pool, split.pool);
        saturating_add(&self.reserve, split.reserve);
    }

    pub fn totals(&self) -> FeeSplit {
        FeeSplit {
            host: self.host.load(Ordering::Relaxed),
            pool: self.pool.load(Ordering::Relaxed),
            reserve: self.reserve.load(Ordering::Relaxed),
        }
    }
}
