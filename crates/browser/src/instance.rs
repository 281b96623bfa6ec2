//! `BrowserInstance` (§3 `B`): a single pooled browser process slot, its
//! state machine, and the pages it currently hosts.

use std::{collections::HashMap, time::Instant};

use chromiumoxide::{Browser, Page};
use headlessd_common::ids::Id;

/// `idle →(acquire)→ active →(release)→ idle`; from any state
/// `→(needsRestart | HC fail)→ restarting →(restart ok)→ idle`;
/// `restarting →(restart fail)→ dead`. `shutdown` drives every state to
/// `dead` (§4.6 State machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserState {
    Idle,
    Active,
    Restarting,
    Draining,
    Dead,
}

/// A live browser process slot owned exclusively by the pool (§3 `B`).
///
/// Invariant: `state == Active ⇒ session_id.is_some()`; `pages.len() <=
/// max_pages_per_browser`; only one `session_id` leased at a time.
pub struct BrowserInstance {
    pub id: Id,
    pub pid: Option<u32>,
    pub browser: Browser,
    pub handler: tokio::task::JoinHandle<()>,
    pub state: BrowserState,
    pub session_id: Option<Id>,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub use_count: u64,
    pub error_count: u64,
    /// Pages keyed by context id — `PageManager` resolves a context to its
    /// page through this map rather than holding its own handle, so a
    /// browser removal automatically invalidates every page it hosted.
    pub pages: HashMap<Id, Page>,
}

impl BrowserInstance {
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// `isIdleTooLong` (§4.3): liveness/eviction, driven only by the
    /// maintenance loop's wall clock. Independent of `needs_restart` —
    /// neither knob is derived from the other (redesigned per OQ-4).
    #[must_use]
    pub fn is_idle_too_long(&self, idle_timeout: std::time::Duration) -> bool {
        self.state == BrowserState::Idle && self.last_activity.elapsed() > idle_timeout
    }

    /// `needsRestart` (§4.3): age ≥ `max_lifetime` OR `use_count` ≥
    /// `max_uses` OR `error_count` ≥ `max_errors`.
    #[must_use]
    pub fn needs_restart(
        &self,
        max_lifetime: std::time::Duration,
        max_uses: u64,
        max_errors: u64,
    ) -> bool {
        self.created_at.elapsed() >= max_lifetime
            || self.use_count >= max_uses
            || self.error_count >= max_errors
    }
}
