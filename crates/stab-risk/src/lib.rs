//! # stab-risk — Transaction pattern analysis and progressive penalties.
//!
//! - [`signals`]: velocity, concentration and reciprocity over a bounded
//!   per-account history.
//! - [`scorer`]: weighted composite with a fiat-backing discount and linear
//!   relaxation of the persisted score.
//! - [`penalty`]: tiered surcharges that scale with transfer size and
//!   compound with repeated violations.
//!
//! Nothing in this crate mutates an account. Assessments carry the updated
//! history and risk state for the caller to commit.

pub mod penalty;
pub mod scorer;
pub mod signals;

pub use penalty::{PenaltyAssessment, PenaltyEngine, ProgressivePenaltyCurve};
pub use scorer::{RiskAssessment, RiskScorer, WeightedRiskCombiner};
