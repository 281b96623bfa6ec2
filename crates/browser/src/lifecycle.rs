//! Browser Lifecycle (BL, §4.3): launch / close / restart a single browser
//! process, with PID tracking and a bounded grace period on shutdown.

use std::time::{Duration, Instant};

use chromiumoxide::{Browser, BrowserConfig as CdpBrowserConfig};
use futures::StreamExt;
use headlessd_common::ids::Id;
use tracing::{debug, info, warn};

use crate::{error::Error, instance::BrowserInstance, config::BrowserConfig};

/// Launches a headless Chrome/Chromium process with `config`'s flags and
/// spawns the CDP event-handler task. The handler task is returned as part
/// of the instance so `close` can await its completion instead of leaking it.
pub async fn launch(id: Id, config: &BrowserConfig) -> Result<BrowserInstance, Error> {
    let detection = crate::detect::detect_browser(config.chrome_path.as_deref());
    if !detection.found {
        return Err(Error::BrowserNotAvailable);
    }

    let mut builder = CdpBrowserConfig::builder();
    if !config.headless {
        builder = builder.with_head();
    }
    builder = builder
        .viewport(chromiumoxide::handler::viewport::Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: Some(config.device_scale_factor),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .request_timeout(config.navigation_timeout);

    if let Some(ref ua) = config.user_agent {
        builder = builder.arg(format!("--user-agent={ua}"));
    }
    if let Some(ref path) = config.chrome_path {
        builder = builder.chrome_executable(path);
    }
    for arg in &config.chrome_args {
        builder = builder.arg(arg);
    }
    builder = builder
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-software-rasterizer")
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox");

    let cdp_config = builder
        .build()
        .map_err(|e| Error::LaunchFailed(format!("failed to build browser config: {e}")))?;

    let (browser, mut handler) = Browser::launch(cdp_config).await.map_err(|e| {
        Error::LaunchFailed(format!(
            "browser launch failed: {e}\n\n{}",
            crate::detect::install_instructions()
        ))
    })?;

    // chromiumoxide does not expose the spawned child's PID through its
    // public API; the health checker falls back to the CDP connection
    // itself (`is_connected`) as the liveness signal instead (§4.4 step 2).
    let pid = None;
    let id_for_task = id;
    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            debug!(browser_id = %id_for_task, ?event, "browser event");
        }
        debug!(browser_id = %id_for_task, "browser event handler exited");
    });

    info!(browser_id = %id, "launched new browser instance");

    Ok(BrowserInstance {
        id,
        pid,
        browser,
        handler: handler_task,
        state: crate::instance::BrowserState::Idle,
        session_id: None,
        created_at: Instant::now(),
        last_activity: Instant::now(),
        use_count: 0,
        error_count: 0,
        pages: std::collections::HashMap::new(),
    })
}

/// Terminates `instance` gracefully, escalating to a hard abort of the
/// handler task after `grace` elapses without the CDP `Browser.close`
/// completing.
pub async fn close(mut instance: BrowserInstance, grace: Duration) {
    let id = instance.id;
    let closed = tokio::time::timeout(grace, instance.browser.close()).await;
    match closed {
        Ok(Ok(_)) => debug!(browser_id = %id, "browser closed gracefully"),
        Ok(Err(err)) => warn!(browser_id = %id, error = %err, "graceful close failed"),
        Err(_) => warn!(browser_id = %id, "graceful close exceeded grace period, escalating"),
    }
    // `Browser::close` leaves the handler task to drain; if the CDP
    // connection didn't tear down cleanly the task would otherwise run
    // forever, so the handler is force-aborted regardless of the path above.
    instance.handler.abort();
    let _ = instance.browser.wait().await;
}

/// `restart` (§4.3): close the old process, launch a fresh one, preserving
/// the `id` slot so leases and AQ bookkeeping don't have to be rewired.
pub async fn restart(
    old: BrowserInstance,
    config: &BrowserConfig,
    grace: Duration,
) -> Result<BrowserInstance, Error> {
    let id = old.id;
    close(old, grace).await;
    launch(id, config).await
}
