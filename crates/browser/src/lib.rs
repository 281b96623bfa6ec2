//! Managed Chrome/Chromium over CDP: a pool of long-lived browser
//! processes, leased to sessions, hosting one page per context.
//!
//! # Modules
//!
//! - [`config`] — pool-wide tuning (`BrowserConfig`).
//! - [`instance`] — a single pooled browser process and its state machine.
//! - [`lifecycle`] — launch / close / restart one browser process (BL).
//! - [`health`] — liveness/memory/responsiveness probes with auto-recovery (HC).
//! - [`queue`] — FIFO-within-priority waiters for a saturated pool (AQ).
//! - [`pool`] — owns every instance, arbitrates acquisition, runs maintenance (BP).
//! - [`page`] — resolves `(contextId, sessionId)` to a page, sharing one
//!   browser across a session's concurrent contexts (PM).
//! - [`detect`] — locates a Chromium-family executable on the host.
//! - [`container`] — sandboxed launch inside Docker or Apple's `container`.
//! - [`error`] — this crate's error type.
//!
//! # Example
//!
//! ```ignore
//! use headlessd_browser::{pool::BrowserPool, config::BrowserConfig, health::HealthCheckConfig};
//! use headlessd_common::event::EventBus;
//!
//! let pool = BrowserPool::new(BrowserConfig::default(), HealthCheckConfig::default(), EventBus::new());
//! pool.warm_up().await;
//! let browser_id = pool.acquire(session_id).await?;
//! ```

pub mod config;
pub mod detect;
pub mod error;
pub mod health;
pub mod instance;
pub mod lifecycle;
pub mod page;
pub mod pool;
pub mod queue;

pub use {config::BrowserConfig, error::Error, instance::BrowserInstance, pool::BrowserPool};
