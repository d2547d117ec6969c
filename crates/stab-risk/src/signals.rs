//! Behavioral signals over a bounded transfer history.
//!
//! Each signal is scored on `0..=MAX_RISK_SCORE`. Callers pass the history
//! *with the candidate outbound transfer already appended*, so a burst of
//! attempts is visible to the velocity signal even before any of them
//! commits.

use stab_core::config::EngineConfig;
use stab_core::constants::MAX_RISK_SCORE;
use stab_core::types::{
    AccountId, Direction, RiskSignals, Timestamp, TransferEvent, TransferHistory,
};

const MAX: u64 = MAX_RISK_SCORE as u64;

/// Concentration score for amounts at least 2x / 5x / 10x the trailing average.
const CONCENTRATION_STEPS: [(u64, u16); 3] = [(10, 1000), (5, 600), (2, 300)];

/// Append `event` to a copy of `history`, honoring the configured bounds.
pub fn with_event(history: &TransferHistory, event: TransferEvent, config: &EngineConfig) -> TransferHistory {
    let mut next = history.clone();
    next.push(event, config.history_capacity, config.history_window_secs);
    next
}

/// Outbound frequency within `risk_window_secs`, saturating at
/// `velocity_saturation_count`. Two outbound events no more than
/// `min_interval_secs` apart score the maximum.
pub fn velocity(history: &TransferHistory, now: Timestamp, config: &EngineConfig) -> u16 {
    let mut recent = history.outbound().rev();
    if let (Some(latest), Some(previous)) = (recent.next(), recent.next()) {
        if latest.timestamp.saturating_sub(previous.timestamp) <= config.min_interval_secs {
            return MAX_RISK_SCORE;
        }
    }

    let cutoff = now.saturating_sub(config.risk_window_secs);
    let count = history
        .outbound()
        .filter(|e| e.timestamp > cutoff && e.timestamp <= now)
        .count() as u64;
    let saturation = u64::from(config.velocity_saturation_count.max(1));
    (count * MAX / saturation).min(MAX) as u16
}

/// Size of `amount` relative to the trailing average of *prior* outbound
/// amounts, in discrete steps. No prior outbound history scores 0.
///
/// `prior` must not contain the candidate.
pub fn concentration(prior: &TransferHistory, amount: u64) -> u16 {
    let (count, sum) = prior
        .outbound()
        .fold((0u128, 0u128), |(n, s), e| (n + 1, s + e.amount as u128));
    if count == 0 || sum == 0 {
        return 0;
    }
    // amount / (sum / count) >= k  <=>  amount * count >= k * sum
    let scaled = amount as u128 * count;
    CONCENTRATION_STEPS
        .iter()
        .find(|(k, _)| scaled >= *k as u128 * sum)
        .map_or(0, |&(_, score)| score)
}

/// Round-trip detection for an outbound transfer to `counterparty`.
///
/// Looks for inbound transfers *from* `counterparty` within
/// `reciprocity_window_secs` before `now`. Each match scores
/// `time_closeness * amount_closeness / 1000`; the maximum wins.
pub fn reciprocity(
    prior: &TransferHistory,
    counterparty: &AccountId,
    amount: u64,
    now: Timestamp,
    config: &EngineConfig,
) -> u16 {
    let window = config.reciprocity_window_secs;
    if window == 0 {
        return 0;
    }
    prior
        .iter()
        .filter(|e| e.direction == Direction::Inbound && &e.counterparty == counterparty)
        .filter_map(|e| {
            let dt = now.checked_sub(e.timestamp)?;
            if dt > window {
                return None;
            }
            let time_closeness = MAX * (window - dt) / window;
            let (lo, hi) = if e.amount <= amount {
                (e.amount, amount)
            } else {
                (amount, e.amount)
            };
            let amount_closeness = if hi == 0 {
                0
            } else {
                (MAX as u128 * lo as u128 / hi as u128) as u64
            };
            Some(time_closeness * amount_closeness / MAX)
        })
        .max()
        .unwrap_or(0) as u16
}

/// All three signals for a candidate outbound transfer.
///
/// `prior` is the committed history; `with_candidate` is the same history
/// with the candidate appended.
pub fn evaluate(
    prior: &TransferHistory,
    with_candidate: &TransferHistory,
    candidate: &TransferEvent,
    config: &EngineConfig,
) -> RiskSignals {
    RiskSignals {
        velocity: velocity(with_candidate, candidate.timestamp, config),
        concentration: concentration(prior, candidate.amount),
        reciprocity: reciprocity(
            prior,
            &candidate.counterparty,
            candidate.amount,
            candidate.timestamp,
            config,
        ),
    }
}
