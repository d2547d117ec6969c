//! LHI-driven circuit breaker.
//!
//! Transition rules, evaluated once per tick:
//!
//! 1. LHI below the halt threshold moves straight to `Halted`.
//! 2. Otherwise, if the LHI indicates a worse level than the current one,
//!    degrade by exactly one level.
//! 3. Otherwise, recover by one level once the LHI reaches the current
//!    level's entry threshold plus the recovery hysteresis.

use stab_core::config::EngineConfig;
use stab_core::error::TransferError;
use stab_core::types::{BreakerState, OperationKind};
use tracing::{info, warn};

/// Level the entry thresholds alone indicate, ignoring the halt rule.
fn indicated(lhi_ppm: u64, c: &EngineConfig) -> BreakerState {
    if lhi_ppm < c.lhi_emergency_threshold_ppm {
        BreakerState::Emergency
    } else if lhi_ppm < c.lhi_upper_threshold_ppm {
        BreakerState::Congested
    } else {
        BreakerState::Normal
    }
}

/// LHI at or above which `state` may recover one level.
pub fn recovery_threshold(state: BreakerState, c: &EngineConfig) -> Option<u64> {
    let entry = match state {
        BreakerState::Normal => return None,
        BreakerState::Congested => c.lhi_upper_threshold_ppm,
        BreakerState::Emergency => c.lhi_emergency_threshold_ppm,
        BreakerState::Halted => c.lhi_halt_threshold_ppm,
    };
    Some(entry.saturating_add(c.lhi_recovery_hysteresis_ppm))
}

/// Pure transition function.
///
/// # Examples
///
/// ```
/// use stab_core::config::EngineConfig;
/// use stab_core::types::BreakerState::*;
/// use stab_health::breaker::next_state;
///
/// let c = EngineConfig::default();
/// assert_eq!(next_state(Normal, 180_000, &c), Congested);
/// assert_eq!(next_state(Congested, 90_000, &c), Halted);
/// assert_eq!(next_state(Halted, 160_000, &c), Halted);
/// assert_eq!(next_state(Halted, 270_000, &c), Emergency);
/// ```
pub fn next_state(current: BreakerState, lhi_ppm: u64, c: &EngineConfig) -> BreakerState {
    if lhi_ppm < c.lhi_halt_threshold_ppm {
        return BreakerState::Halted;
    }
    if indicated(lhi_ppm, c) > current {
        return current.degraded();
    }
    match recovery_threshold(current, c) {
        Some(threshold) if lhi_ppm >= threshold => current.healthier(),
        _ => current,
    }
}

/// Classify a value transfer for gating.
pub fn classify_transfer(amount: u64, c: &EngineConfig) -> OperationKind {
    if amount >= c.large_transfer_threshold {
        OperationKind::LargeTransfer
    } else {
        OperationKind::Transfer
    }
}

/// Whether `state` permits `operation`.
pub fn permits(state: BreakerState, operation: OperationKind) -> bool {
    match state {
        BreakerState::Normal | BreakerState::Congested => true,
        BreakerState::Emergency => !matches!(
            operation,
            OperationKind::LargeTransfer | OperationKind::LiquidityWithdrawal
        ),
        BreakerState::Halted => operation == OperationKind::EmergencyControl,
    }
}

/// Reject `operation` if `state` does not permit it.
pub fn gate(state: BreakerState, lhi_ppm: u64, operation: OperationKind) -> Result<(), TransferError> {
    if permits(state, operation) {
        return Ok(());
    }
    warn!(?state, lhi_ppm, ?operation, "circuit breaker rejected operation");
    Err(TransferError::CircuitBreakerRejected {
        state,
        lhi_ppm,
        operation,
    })
}

/// Stateful breaker driven by the health monitor. Initial state `Normal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitBreaker {
    state: BreakerState,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Apply one tick. Returns the previous state when it changed.
    pub fn observe(&mut self, lhi_ppm: u64, c: &EngineConfig) -> Option<BreakerState> {
        let next = next_state(self.state, lhi_ppm, c);
        if next == self.state {
            return None;
        }
        let from = std::mem::replace(&mut self.state, next);
        if next > from {
            warn!(?from, to = ?next, lhi_ppm, "circuit breaker degraded");
        } else {
            info!(?from, to = ?next, lhi_ppm, "circuit breaker recovered");
        }
        Some(from)
    }
}
