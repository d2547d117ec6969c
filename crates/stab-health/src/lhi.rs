//! Liquidity Health Index.
//!
//! The LHI is the weakest of three capped ratios: participation, volume and
//! reserve coverage. A zero target counts as fully satisfied, so the index
//! always lies in `0..=PPM`.

use stab_core::fixed::capped_ratio_ppm;
use stab_core::types::NetworkMetrics;

/// Per-component ratios and their minimum, all in ppm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthRatios {
    pub participant_ratio_ppm: u64,
    pub volume_ratio_ppm: u64,
    pub reserve_ratio_ppm: u64,
    pub lhi_ppm: u64,
}

/// Compute the three capped ratios and the LHI.
///
/// # Examples
///
/// ```
/// use stab_core::types::NetworkMetrics;
/// use stab_health::lhi::compute;
///
/// let m = NetworkMetrics {
///     participants_observed: 80,
///     participants_target: 100,
///     volume_observed: 3_000,
///     volume_target: 1_000,
///     reserve_observed: 25,
///     reserve_required: 100,
///     ..NetworkMetrics::default()
/// };
/// let r = compute(&m);
/// assert_eq!(r.volume_ratio_ppm, 1_000_000);
/// assert_eq!(r.lhi_ppm, 250_000);
/// ```
pub fn compute(metrics: &NetworkMetrics) -> HealthRatios {
    let participant_ratio_ppm =
        capped_ratio_ppm(metrics.participants_observed, metrics.participants_target);
    let volume_ratio_ppm = capped_ratio_ppm(metrics.volume_observed, metrics.volume_target);
    let reserve_ratio_ppm = capped_ratio_ppm(metrics.reserve_observed, metrics.reserve_required);
    HealthRatios {
        participant_ratio_ppm,
        volume_ratio_ppm,
        reserve_ratio_ppm,
        lhi_ppm: participant_ratio_ppm
            .min(volume_ratio_ppm)
            .min(reserve_ratio_ppm),
    }
}
