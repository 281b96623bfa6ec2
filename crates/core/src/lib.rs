//! `headlessd-core`: the `CoreApi` facade (§6) that every frontend adapts
//! to, plus the Action Executor (AE, §4.9) and the error classification
//! (§7) that ties every other crate's error type into one shape at this
//! boundary.

pub mod api;
pub mod error;
mod executor;

pub use {
    api::{CoreApi, Ports},
    error::{Error, Result, classify},
};
