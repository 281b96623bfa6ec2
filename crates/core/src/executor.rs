//! Action Executor (AE, §4.9): the 8-step pipeline that turns a validated
//! `ActionRequest` plus a leased page into an `ActionResult`. Owns the
//! pieces the `headlessd-action` strategies deliberately don't have access
//! to — the page lease, the per-action deadline, and audit emission.

use std::time::{Duration, Instant};

use headlessd_action::security;
use headlessd_browser::{page, pool::BrowserPool};
use headlessd_common::ids::Id;
use headlessd_config::DefaultTimeouts;
use headlessd_metrics::{action as action_metrics, counter, histogram, labels};
use headlessd_protocol::action::{ActionRequest, ActionResult};
use headlessd_service_traits::audit::{AuditEvent, AuditPort};

/// Results larger than this (serialized) are replaced with a truncation
/// marker rather than inlined, so a multi-megabyte screenshot or PDF never
/// ends up duplicated into an audit log or a metrics label (§4.9 step 8).
const MAX_RESULT_BYTES: usize = 100 * 1024;

/// Runs the full AE pipeline for one action against `context_id`/`session_id`,
/// acquiring its page from `pool` and recording the outcome through `audit`.
pub async fn execute(
    pool: &BrowserPool,
    audit: &dyn AuditPort,
    timeouts: &DefaultTimeouts,
    user_id: &str,
    session_id: Id,
    context_id: Id,
    action: ActionRequest,
    overall_deadline: Option<Duration>,
) -> ActionResult {
    let action_type = action.action_type().to_string();
    let start = Instant::now();

    // Step 1: structural validation, then (evaluate only) the Security
    // Validator pass `headlessd_action::validate_action` deliberately
    // leaves to its caller — the strategies crate has no page/context to
    // scope a rejection to, so AE is where `evaluate`'s function body
    // actually gets checked against the dangerous-pattern table.
    if let Err(err) = headlessd_action::validate_action(&action) {
        counter!(action_metrics::VALIDATION_REJECTIONS_TOTAL, labels::ACTION_TYPE => action_type.clone()).increment(1);
        return fail(&action_type, err, start, user_id, session_id, context_id, None, audit).await;
    }
    if let ActionRequest::Evaluate { function, .. } = &action {
        let report = security::validate_javascript(function);
        if !report.is_valid {
            let rule = report
                .issues
                .iter()
                .find_map(|i| i.rule.clone())
                .unwrap_or_else(|| "javascript_validation".to_string());
            let message = report
                .issues
                .first()
                .map(|i| i.message.clone())
                .unwrap_or_else(|| "evaluate function body failed security validation".to_string());
            let err = headlessd_action::Error::security(rule, message);
            return fail(&action_type, err, start, user_id, session_id, context_id, None, audit).await;
        }
    }

    // Step 2: page acquisition (PM, resolving OQ-1's session-scoped lease).
    let acquired = match page::acquire_page(pool, context_id, session_id).await {
        Ok(acquired) => acquired,
        Err(err) => {
            let err = headlessd_action::Error::from(err);
            return fail(&action_type, err, start, user_id, session_id, context_id, None, audit).await;
        },
    };
    let page_id = acquired.browser_id.to_string();

    // Step 3: per-action deadline. chromiumoxide exposes no settable
    // per-page default timeout, so the deadline is enforced by racing the
    // strategy call itself rather than mutating page-level state that
    // would need restoring on every exit path.
    let timeout = action
        .timeout()
        .map(Duration::from_millis)
        .unwrap_or_else(|| default_timeout_for(&action, timeouts));
    let timeout = match overall_deadline {
        Some(deadline) => timeout.min(deadline),
        None => timeout,
    };

    // Step 4: dispatch to the variant's strategy.
    let outcome = tokio::time::timeout(timeout, headlessd_action::run(&action, &acquired.page)).await;

    // `close` additionally tears down the context's page once the
    // strategy (a no-op for this variant) returns successfully; PM owns
    // the page map, so this happens here rather than inside the strategy.
    if matches!(action, ActionRequest::Close { .. }) {
        if let Ok(Ok(_)) = &outcome {
            page::close_context_page(pool, acquired.browser_id, context_id).await;
        }
    }

    match outcome {
        Err(_elapsed) => {
            pool.record_error(acquired.browser_id).await;
            let err = headlessd_action::Error::Timeout(timeout);
            fail(&action_type, err, start, user_id, session_id, context_id, Some(page_id), audit).await
        },
        Ok(Err(err)) => {
            pool.record_error(acquired.browser_id).await;
            fail(&action_type, err, start, user_id, session_id, context_id, Some(page_id), audit).await
        },
        Ok(Ok(strategy_outcome)) => {
            let duration_ms = elapsed_ms(start);
            let data = strategy_outcome.data.map(|d| truncate_if_oversized(d, &action_type));
            counter!(action_metrics::EXECUTIONS_TOTAL, labels::ACTION_TYPE => action_type.clone()).increment(1);
            histogram!(action_metrics::EXECUTION_DURATION_SECONDS, labels::ACTION_TYPE => action_type.clone())
                .record(start.elapsed().as_secs_f64());
            let result = ActionResult::ok(&action_type, data, duration_ms, strategy_outcome.metadata);
            audit
                .record(AuditEvent {
                    user_id: user_id.to_string(),
                    session_id: session_id.to_string(),
                    context_id: context_id.to_string(),
                    page_id: Some(page_id),
                    action_type,
                    success: true,
                    error_code: None,
                    duration_ms,
                })
                .await;
            result
        },
    }
}

#[allow(clippy::too_many_arguments)]
async fn fail(
    action_type: &str,
    err: headlessd_action::Error,
    start: Instant,
    user_id: &str,
    session_id: Id,
    context_id: Id,
    page_id: Option<String>,
    audit: &dyn AuditPort,
) -> ActionResult {
    let shape = headlessd_action::classify(&err);
    let duration_ms = elapsed_ms(start);
    counter!(
        action_metrics::EXECUTION_ERRORS_TOTAL,
        labels::ACTION_TYPE => action_type.to_string(),
        labels::ERROR_CODE => shape.code.clone(),
    )
    .increment(1);
    audit
        .record(AuditEvent {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            context_id: context_id.to_string(),
            page_id,
            action_type: action_type.to_string(),
            success: false,
            error_code: Some(shape.code.clone()),
            duration_ms,
        })
        .await;
    ActionResult::fail(action_type, shape, duration_ms)
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn default_timeout_for(action: &ActionRequest, timeouts: &DefaultTimeouts) -> Duration {
    let ms = match action {
        ActionRequest::Navigate { .. } => timeouts.navigate_ms,
        ActionRequest::Evaluate { .. } => timeouts.evaluate_ms,
        ActionRequest::Screenshot { .. } | ActionRequest::Pdf { .. } => timeouts.screenshot_ms,
        ActionRequest::Wait { .. } => timeouts.wait_ms,
        _ => timeouts.navigate_ms,
    };
    Duration::from_millis(ms)
}

/// §4.9 step 8: large results never travel past this boundary intact.
fn truncate_if_oversized(data: serde_json::Value, action_type: &str) -> serde_json::Value {
    let size = serde_json::to_vec(&data).map(|v| v.len()).unwrap_or(0);
    if size <= MAX_RESULT_BYTES {
        return data;
    }
    counter!(action_metrics::RESULTS_TRUNCATED_TOTAL, labels::ACTION_TYPE => action_type.to_string()).increment(1);
    serde_json::json!({
        "truncated": true,
        "type": action_type,
        "size": size,
    })
}
