//! # stab-core
//! Foundation types, configuration, and traits for the token stability engine.

pub mod config;
pub mod constants;
pub mod epoch;
pub mod error;
pub mod fixed;
pub mod traits;
pub mod types;
