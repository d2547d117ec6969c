//! Single-writer health monitor.
//!
//! Each tick computes the LHI, steps the circuit breaker, quotes fees and
//! publishes a new immutable [`NetworkHealthSnapshot`]. Readers clone the
//! current `Arc` and never observe a partially built snapshot.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use stab_core::config::EngineConfig;
use stab_core::types::{NetworkHealthSnapshot, NetworkMetrics, Timestamp};
use tracing::{debug, info};

use crate::breaker::CircuitBreaker;
use crate::{lhi, oracle};

pub struct HealthMonitor {
    published: RwLock<Arc<NetworkHealthSnapshot>>,
    /// Held for the whole tick; serializes writers.
    breaker: Mutex<CircuitBreaker>,
}

impl HealthMonitor {
    /// Start from the genesis snapshot: `Normal`, full health, base fee.
    pub fn new(config: &EngineConfig) -> Self {
        let genesis =
            NetworkHealthSnapshot::genesis(config.base_fee, oracle::split_fee(config.base_fee, config));
        Self {
            published: RwLock::new(Arc::new(genesis)),
            breaker: Mutex::new(CircuitBreaker::new()),
        }
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<NetworkHealthSnapshot> {
        Arc::clone(&self.published.read())
    }

    /// Run one health tick and publish the result.
    pub fn tick(
        &self,
        metrics: &NetworkMetrics,
        epoch: u64,
        now: Timestamp,
        config: &EngineConfig,
    ) -> Arc<NetworkHealthSnapshot> {
        let mut breaker = self.breaker.lock();
        let previous = self.snapshot();

        let ratios = lhi::compute(metrics);
        breaker.observe(ratios.lhi_ppm, config);
        let quote = oracle::quote(metrics, ratios.lhi_ppm, config);

        let snapshot = Arc::new(NetworkHealthSnapshot {
            version: previous.version + 1,
            epoch,
            computed_at: now,
            participant_ratio_ppm: ratios.participant_ratio_ppm,
            volume_ratio_ppm: ratios.volume_ratio_ppm,
            reserve_ratio_ppm: ratios.reserve_ratio_ppm,
            lhi_ppm: ratios.lhi_ppm,
            breaker: breaker.state(),
            dynamic_fee: quote.dynamic_fee,
            host_reward: quote.host_reward,
            fee_split: quote.fee_split,
        });

        if snapshot.dynamic_fee != previous.dynamic_fee {
            info!(
                version = snapshot.version,
                from = previous.dynamic_fee,
                to = snapshot.dynamic_fee,
                lhi_ppm = snapshot.lhi_ppm,
                "dynamic fee changed"
            );
        }
        debug!(
            version = snapshot.version,
            epoch,
            lhi_ppm = snapshot.lhi_ppm,
            breaker = ?snapshot.breaker,
            host_reward = snapshot.host_reward,
            "health snapshot published"
        );

        *self.published.write() = Arc::clone(&snapshot);
        snapshot
    }
}
