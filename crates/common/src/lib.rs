//! Shared types, error definitions, and event bus used across all headlessd crates.

pub mod error;
pub mod event;
pub mod ids;

pub use error::{Error, FromMessage, Result};
pub use event::{Event, EventBus, EventKind, Subscription};
