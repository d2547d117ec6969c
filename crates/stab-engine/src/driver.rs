//! Periodic health driver.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use stab_core::types::{NetworkMetrics, Timestamp};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::engine::StabilityEngine;

/// Supplies network observations for each health tick.
pub trait MetricsSource: Send {
    fn sample(&mut self, now: Timestamp) -> NetworkMetrics;
}

impl<F> MetricsSource for F
where
    F: FnMut(Timestamp) -> NetworkMetrics + Send,
{
    fn sample(&mut self, now: Timestamp) -> NetworkMetrics {
        self(now)
    }
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Tick `engine` every `period` until `shutdown` flips to `true` or its
/// sender is dropped. Returns the number of ticks run.
pub async fn run_health_loop<M, C>(
    engine: Arc<StabilityEngine>,
    mut source: M,
    period: Duration,
    clock: C,
    mut shutdown: watch::Receiver<bool>,
) -> u64
where
    M: MetricsSource,
    C: Fn() -> Timestamp + Send,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = 0u64;
    info!(period_ms = period.as_millis() as u64, "health loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = clock();
                let metrics = source.sample(now);
                let snapshot = engine.tick(&metrics, now);
                ticks += 1;
                debug!(
                    tick = ticks,
                    version = snapshot.version,
                    lhi_ppm = snapshot.lhi_ppm,
                    breaker = ?snapshot.breaker,
                    "health tick"
                );
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(ticks, "health loop stopped");
    ticks
}
