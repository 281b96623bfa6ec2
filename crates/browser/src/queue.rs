//! Acquisition Queue (AQ, §4.5): a FIFO-within-priority waiter list for a
//! browser slot, with per-waiter deadlines and starvation-free draining.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use headlessd_common::ids::Id;
use tokio::sync::oneshot;

use crate::error::Error;

/// One waiter's outcome: either a leased browser id, or the reason the
/// wait ended without one.
pub type Waker = oneshot::Sender<Result<Id, Error>>;

struct Entry {
    session_id: Id,
    priority: u8,
    enqueued_at: Instant,
    deadline: Instant,
    waker: Waker,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub count: usize,
    pub oldest_wait: Duration,
}

/// FIFO within a priority tier; higher `priority` values are served first.
/// Ties broken by enqueue order, which is what makes the queue
/// starvation-free — every waiter eventually becomes the oldest in its
/// tier. Guarded entirely by `std::sync::Mutex` since every operation here
/// is synchronous bookkeeping; resolving a waker happens after the lock is
/// dropped (§5: "waking a waiter resolves its future/channel outside the
/// lock").
#[derive(Default)]
pub struct AcquisitionQueue {
    waiters: std::sync::Mutex<VecDeque<Entry>>,
}

impl AcquisitionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new waiter and returns the receiving half of its waker.
    pub fn enqueue(&self, session_id: Id, priority: u8, timeout: Duration) -> oneshot::Receiver<Result<Id, Error>> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        let entry = Entry {
            session_id,
            priority,
            enqueued_at: now,
            deadline: now + timeout,
            waker: tx,
        };
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        let pos = waiters
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(waiters.len());
        waiters.insert(pos, entry);
        rx
    }

    /// Reaps every waiter whose deadline has passed, resolving each with
    /// `Timeout`. Must be called before `process_next` sees a released
    /// browser so an expired waiter never gets handed one (§8 invariant 4).
    pub fn reap_expired(&self) {
        let now = Instant::now();
        let mut to_resolve = Vec::new();
        {
            let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
            let mut kept = VecDeque::with_capacity(waiters.len());
            while let Some(entry) = waiters.pop_front() {
                if entry.deadline <= now {
                    to_resolve.push(entry);
                } else {
                    kept.push_back(entry);
                }
            }
            *waiters = kept;
        }
        for entry in to_resolve {
            let _ = entry.waker.send(Err(Error::Timeout(format!(
                "acquisition timed out after {:?}",
                entry.enqueued_at.elapsed()
            ))));
        }
    }

    /// Activates the oldest eligible waiter with `browser_id`: the waiter
    /// is removed from the queue and its waker resolved outside the lock.
    /// Returns the session id the caller should lease the browser to, if
    /// there was a waiter.
    pub fn process_next(&self, browser_id: Id) -> Option<Id> {
        self.reap_expired();
        let entry = {
            let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
            waiters.pop_front()
        }?;
        let session_id = entry.session_id;
        let _ = entry.waker.send(Ok(browser_id));
        Some(session_id)
    }

    /// Pops the oldest eligible waiter without resolving it. Lets the
    /// caller re-lease the freed instance to that waiter's session under
    /// its own lock before waking them, so the hand-off from release to
    /// the next acquirer is atomic (§5, §8 invariant 1) instead of leaving
    /// a window where a concurrent `acquire` could lease the same instance.
    pub fn pop_waiter(&self) -> Option<(Id, Waker)> {
        self.reap_expired();
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        let entry = waiters.pop_front()?;
        Some((entry.session_id, entry.waker))
    }

    /// Rejects every outstanding waiter with `Unavailable` (pool shutdown).
    pub fn clear(&self) {
        let drained: Vec<Entry> = {
            let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
            waiters.drain(..).collect()
        };
        for entry in drained {
            let _ = entry.waker.send(Err(Error::Unavailable));
        }
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        let oldest_wait = waiters
            .iter()
            .map(|e| e.enqueued_at.elapsed())
            .max()
            .unwrap_or_default();
        QueueStats {
            count: waiters.len(),
            oldest_wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_within_priority() {
        let aq = AcquisitionQueue::new();
        let s1 = Id::new();
        let s2 = Id::new();
        let rx1 = aq.enqueue(s1, 0, Duration::from_secs(5));
        let rx2 = aq.enqueue(s2, 0, Duration::from_secs(5));
        let browser_id = Id::new();
        let activated = aq.process_next(browser_id);
        assert_eq!(activated, Some(s1));
        assert_eq!(rx1.await.unwrap().unwrap(), browser_id);
        assert_eq!(aq.stats().count, 1);
        drop(rx2);
    }

    #[tokio::test]
    async fn higher_priority_served_first() {
        let aq = AcquisitionQueue::new();
        let low = Id::new();
        let high = Id::new();
        let _rx_low = aq.enqueue(low, 0, Duration::from_secs(5));
        let rx_high = aq.enqueue(high, 10, Duration::from_secs(5));
        let browser_id = Id::new();
        let activated = aq.process_next(browser_id);
        assert_eq!(activated, Some(high));
        assert_eq!(rx_high.await.unwrap().unwrap(), browser_id);
    }

    #[tokio::test]
    async fn pop_waiter_does_not_resolve_the_oneshot() {
        let aq = AcquisitionQueue::new();
        let session_id = Id::new();
        let rx = aq.enqueue(session_id, 0, Duration::from_secs(5));
        let (popped_session, waker) = aq.pop_waiter().expect("one waiter enqueued");
        assert_eq!(popped_session, session_id);
        assert_eq!(aq.stats().count, 0);

        let browser_id = Id::new();
        let _ = waker.send(Ok(browser_id));
        assert_eq!(rx.await.unwrap().unwrap(), browser_id);
    }

    #[tokio::test]
    async fn expired_waiter_resolved_with_timeout_and_absent_afterwards() {
        let aq = AcquisitionQueue::new();
        let session_id = Id::new();
        let rx = aq.enqueue(session_id, 0, Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        aq.reap_expired();
        let result = rx.await.unwrap();
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(aq.stats().count, 0);
        assert_eq!(aq.process_next(Id::new()), None);
    }

    #[tokio::test]
    async fn clear_rejects_all_waiters() {
        let aq = AcquisitionQueue::new();
        let rx = aq.enqueue(Id::new(), 0, Duration::from_secs(5));
        aq.clear();
        assert!(matches!(rx.await.unwrap(), Err(Error::Unavailable)));
    }
}
