//! # stab-health — Network health, economics oracle, and circuit breaker.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! - **LHI**: minimum of participation, volume and reserve coverage, each
//!   capped at 1.0.
//! - **Oracle**: dynamic fee scaled by market pressure, volume and inverse
//!   LHI; host rewards; exact host / pool / reserve split.
//! - **Circuit breaker**: Normal / Congested / Emergency / Halted with
//!   single-step degradation, immediate halt, and hysteresis on recovery.
//! - **Monitor**: single writer that publishes versioned snapshots.

pub mod breaker;
pub mod lhi;
pub mod monitor;
pub mod oracle;

pub use breaker::CircuitBreaker;
pub use monitor::HealthMonitor;
pub use oracle::FeePool;
