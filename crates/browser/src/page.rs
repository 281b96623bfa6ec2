//! Page Manager (PM, §4.7): resolves a `(contextId, sessionId)` pair to a
//! CDP page, sharing one `BrowserInstance` across a session's concurrent
//! contexts (OQ-1) rather than leasing a browser per context.

use headlessd_common::ids::Id;

use crate::{error::Error, pool::BrowserPool};

/// A page handle bound to the browser that hosts it, so callers can report
/// errors and release the lease without a second lookup.
pub struct AcquiredPage {
    pub browser_id: Id,
    pub page: chromiumoxide::Page,
}

/// `acquirePage` (§4.7): reuse the session's already-leased browser if one
/// exists, otherwise acquire a fresh lease from the pool. Either way, the
/// context's own page is returned — created on first use, reused after.
pub async fn acquire_page(
    pool: &BrowserPool,
    context_id: Id,
    session_id: Id,
) -> Result<AcquiredPage, Error> {
    let browser_id = match pool.find_active_for_session(session_id).await {
        Some(id) => id,
        None => pool.acquire(session_id).await?,
    };
    let page = pool.open_page(browser_id, context_id, session_id).await?;
    Ok(AcquiredPage { browser_id, page })
}

/// Closes `context_id`'s page on `browser_id`. Does not release the
/// browser lease — a session may still hold other open contexts on it.
pub async fn close_context_page(pool: &BrowserPool, browser_id: Id, context_id: Id) {
    pool.close_page(browser_id, context_id).await;
}

#[cfg(test)]
mod tests {
    // `acquire_page`'s same-session reuse path is exercised end to end in
    // the `headlessd-core` integration tests, where a real `BrowserPool`
    // and two contexts for one session are available together; a page
    // manager unit test would otherwise need to fake a live CDP browser.
}
