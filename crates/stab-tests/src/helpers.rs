//! Shared test helpers for the integration suites.

use stab_core::config::EngineConfig;
use stab_core::constants::PPM;
use stab_core::types::{AccountId, NetworkMetrics, Timestamp};
use stab_engine::StabilityEngine;

/// Genesis timestamp used by every suite.
pub const T0: Timestamp = 1_700_000_000;

pub fn id(s: &str) -> AccountId {
    AccountId::from(s)
}

pub fn owner() -> AccountId {
    id("owner")
}

/// Engine with default configuration, genesis at [`T0`].
pub fn engine() -> StabilityEngine {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> StabilityEngine {
    StabilityEngine::new(owner(), config, T0).unwrap()
}

/// Owner-credit `amount` to `who` at [`T0`].
pub fn fund(engine: &StabilityEngine, who: &str, amount: u64) {
    engine.credit(&owner(), &id(who), amount, T0).unwrap();
}

/// Metrics whose LHI is exactly `lhi_ppm`, with neutral fee inputs.
pub fn metrics_with_lhi(lhi_ppm: u64) -> NetworkMetrics {
    NetworkMetrics {
        participants_observed: lhi_ppm,
        participants_target: PPM,
        volume_observed: 1,
        volume_target: 1,
        reserve_observed: 1,
        reserve_required: 1,
        performance_bps: 10_000,
        ..NetworkMetrics::default()
    }
}

/// Raw balances plus collected fees. Constant across transfers that stay
/// inside the grace period.
pub fn supply(engine: &StabilityEngine) -> u128 {
    engine.ledger().total_raw_balance() + engine.fee_pool().total() as u128
}
