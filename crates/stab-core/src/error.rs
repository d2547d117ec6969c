//! Error types for the stability engine.
use thiserror::Error;

use crate::types::{AccountId, BreakerState, OperationKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient effective balance: have {available}, need {required}")] InsufficientEffectiveBalance { available: u64, required: u64 },
    #[error("circuit breaker rejected {operation:?} in state {state:?} (lhi {lhi_ppm} ppm)")] CircuitBreakerRejected { state: BreakerState, lhi_ppm: u64, operation: OperationKind },
    #[error("unknown account: {0}")] UnknownAccount(AccountId),
    #[error("zero amount")] ZeroAmount,
    #[error("sender and recipient are the same account: {0}")] SelfTransfer(AccountId),
    #[error("account already exists: {0}")] AccountExists(AccountId),
    #[error("account id is reserved for bridge escrow: {0}")] ReservedAccount(AccountId),
    #[error("caller is not the engine owner: {0}")] Unauthorized(AccountId),
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")] InvalidConfiguration(String),
    #[error("caller is not the engine owner: {0}")] Unauthorized(AccountId),
    #[error("settings source: {0}")] Source(String),
}

/// Internal invariant violations. These indicate a caller bug, never a
/// user-facing condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("decay or penalty applied to exempt account {0}")] ExemptAccountMisuse(AccountId),
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StabilityError {
    #[error(transparent)] Transfer(#[from] TransferError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Invariant(#[from] InvariantError),
}
