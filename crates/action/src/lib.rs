//! Action Model, Security Validator, and the per-variant execution
//! strategies they gate (AM, SV, §4.8). The Action Executor itself (AE)
//! lives in `headlessd-core`, which owns the page lease and the audit
//! emission this crate's strategies don't have access to.

pub mod error;
pub mod security;
pub mod strategies;
pub mod validate;

pub use {
    error::{Error, Result, classify},
    strategies::{StrategyOutcome, run},
    validate::validate_action,
};
