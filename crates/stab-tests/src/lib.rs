//! Integration test suite for the stability engine.
//!
//! Scenario tests pin the documented behavior end to end, adversarial tests
//! attack invariants with randomized inputs, and concurrency tests hammer
//! the ledger from many threads.

pub mod helpers;
