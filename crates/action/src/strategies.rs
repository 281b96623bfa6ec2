//! Per-variant execution strategies (§4.8 variant list, §4.9 step 4): a
//! function of `(action, page)` that performs the engine calls and returns
//! the JSON `data`/`metadata` an `ActionResult` carries. Page leasing,
//! deadlines, and audit emission belong to the Action Executor in
//! `headlessd-core`; nothing here touches a pool or a store.
//!
//! Grounded on the donor `browser::manager::BrowserManager`'s action
//! handlers — same CDP dispatch idiom for mouse/keyboard, the same
//! `evaluate`/`screenshot`/cookie calls — retargeted from its ref-based
//! element lookup (`[data-moltis-ref]`) to the CSS selectors
//! `ActionRequest` carries, since this system's contexts don't maintain a
//! DOM snapshot to resolve refs against.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chromiumoxide::{
    Page,
    cdp::browser_protocol::{
        input::{
            DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
            DispatchMouseEventType, MouseButton as CdpMouseButton,
        },
        network::{CookieParam, DeleteCookiesParams},
        page::{CaptureScreenshotFormat, PrintToPdfParams},
    },
    page::ScreenshotParams,
};
use headlessd_browser::Error as BrowserError;
use headlessd_protocol::action::{
    ActionRequest, CookieOperation, CookieSpec, MouseButton, MouseOp, ResultMetadata,
    ScreenshotFormat, ScrollDirection, WaitSpec, WaitUntil,
};

use crate::{error::Result, security};

/// `data` plus `metadata` a successful strategy produced.
#[derive(Debug, Default)]
pub struct StrategyOutcome {
    pub data: Option<serde_json::Value>,
    pub metadata: ResultMetadata,
}

impl StrategyOutcome {
    fn value(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            metadata: ResultMetadata::new(),
        }
    }

    fn with_metadata(data: serde_json::Value, metadata: ResultMetadata) -> Self {
        Self {
            data: Some(data),
            metadata,
        }
    }

    fn empty() -> Self {
        Self::default()
    }
}

/// Runs `action` against `page`. The caller applies the per-variant
/// timeout around this call (§4.9 step 3); a strategy never imposes its
/// own deadline.
pub async fn run(action: &ActionRequest, page: &Page) -> Result<StrategyOutcome> {
    match action {
        ActionRequest::Navigate { url, wait_until, .. } => navigate(page, url, *wait_until).await,
        ActionRequest::Click {
            selector,
            button,
            click_count,
            delay,
            ..
        } => click(page, selector, *button, *click_count, *delay).await,
        ActionRequest::Type { selector, text, delay, .. } => type_text(page, selector, text, *delay).await,
        ActionRequest::Wait { spec, .. } => wait(page, spec).await,
        ActionRequest::Evaluate { function, args, .. } => evaluate(page, function, args).await,
        ActionRequest::Screenshot {
            full_page,
            format,
            quality,
            ..
        } => screenshot(page, *full_page, *format, *quality).await,
        ActionRequest::Scroll {
            direction,
            distance,
            smooth,
            ..
        } => scroll(page, *direction, *distance, *smooth).await,
        ActionRequest::Select { selector, values, .. } => select(page, selector, values).await,
        ActionRequest::Keyboard { key, modifiers, .. } => keyboard(page, key, modifiers).await,
        ActionRequest::Mouse { op, x, y, button, .. } => mouse(page, *op, *x, *y, *button).await,
        ActionRequest::Pdf {
            landscape,
            print_background,
            ..
        } => pdf(page, *landscape, *print_background).await,
        ActionRequest::Cookie {
            operation,
            cookies,
            names,
            ..
        } => cookie(page, *operation, cookies.as_deref(), names.as_deref()).await,
        ActionRequest::Content { selector, .. } => content(page, selector.as_deref()).await,
        // Closing the context's page is PM's job (it owns the pool's page
        // map); the executor calls that separately once this returns.
        ActionRequest::Close { .. } => Ok(StrategyOutcome::empty()),
    }
}

async fn navigate(page: &Page, url: &str, wait_until: WaitUntil) -> Result<StrategyOutcome> {
    page.goto(url)
        .await
        .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
    let _ = page.wait_for_navigation().await;
    if matches!(wait_until, WaitUntil::Networkidle0 | WaitUntil::Networkidle2) {
        // chromiumoxide has no native network-idle wait condition; settle
        // for a short quiet window, matching the donor's own reliance on
        // `wait_for_navigation` plus a fixed follow-up delay elsewhere.
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
    let final_url = page.url().await.ok().flatten().unwrap_or_default();
    let mut metadata = ResultMetadata::new();
    metadata.insert("url".into(), serde_json::Value::String(final_url.clone()));
    Ok(StrategyOutcome::with_metadata(serde_json::json!({"url": final_url}), metadata))
}

async fn click(page: &Page, selector: &str, button: MouseButton, click_count: u32, delay: u64) -> Result<StrategyOutcome> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
    for i in 0..click_count {
        element
            .click()
            .await
            .map_err(|e| BrowserError::Cdp(e.to_string()))?;
        if delay > 0 && i + 1 < click_count {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
    }
    let _ = button;
    Ok(StrategyOutcome::empty())
}

async fn type_text(page: &Page, selector: &str, text: &str, delay: u64) -> Result<StrategyOutcome> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
    if delay == 0 {
        element
            .type_str(text)
            .await
            .map_err(|e| BrowserError::Cdp(e.to_string()))?;
    } else {
        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(|e| BrowserError::Cdp(e.to_string()))?;
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
    }
    Ok(StrategyOutcome::empty())
}

async fn wait(page: &Page, spec: &WaitSpec) -> Result<StrategyOutcome> {
    match spec {
        WaitSpec::Timeout { duration } => {
            tokio::time::sleep(std::time::Duration::from_millis(*duration)).await;
            Ok(StrategyOutcome::empty())
        },
        WaitSpec::Selector { selector, timeout } => {
            let deadline = std::time::Duration::from_millis(timeout.unwrap_or(30_000));
            let check = format!("document.querySelector({}) !== null", json_string(selector));
            let poll = async {
                loop {
                    let found: bool = page
                        .evaluate(check.as_str())
                        .await
                        .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?
                        .into_value()
                        .unwrap_or(false);
                    if found {
                        return Ok::<(), crate::error::Error>(());
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            };
            tokio::time::timeout(deadline, poll)
                .await
                .map_err(|_| crate::error::Error::Timeout(deadline))??;
            Ok(StrategyOutcome::empty())
        },
    }
}

async fn evaluate(page: &Page, function: &str, args: &[serde_json::Value]) -> Result<StrategyOutcome> {
    let prepared = security::prepare_eval_args(args)?;
    let args_json = serde_json::to_string(&prepared).map_err(|e| crate::error::Error::invalid(e.to_string()))?;
    let wrapped = format!("({function}).apply(null, {args_json})");
    let value: serde_json::Value = page
        .evaluate(wrapped.as_str())
        .await
        .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?
        .into_value()
        .unwrap_or(serde_json::Value::Null);
    Ok(StrategyOutcome::value(value))
}

async fn screenshot(page: &Page, full_page: bool, format: ScreenshotFormat, quality: Option<u8>) -> Result<StrategyOutcome> {
    let cdp_format = match format {
        ScreenshotFormat::Png => CaptureScreenshotFormat::Png,
        ScreenshotFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        ScreenshotFormat::Webp => CaptureScreenshotFormat::Webp,
    };
    let mut builder = ScreenshotParams::builder().format(cdp_format).full_page(full_page);
    if let Some(q) = quality {
        builder = builder.quality(i64::from(q));
    }
    let bytes = page
        .screenshot(builder.build())
        .await
        .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))?;
    let mime = match format {
        ScreenshotFormat::Png => "image/png",
        ScreenshotFormat::Jpeg => "image/jpeg",
        ScreenshotFormat::Webp => "image/webp",
    };
    let data_uri = format!("data:{mime};base64,{}", BASE64.encode(&bytes));
    let mut metadata = ResultMetadata::new();
    metadata.insert("bytes".into(), serde_json::json!(bytes.len()));
    metadata.insert("format".into(), serde_json::json!(mime));
    Ok(StrategyOutcome::with_metadata(serde_json::json!({"image": data_uri}), metadata))
}

async fn scroll(page: &Page, direction: ScrollDirection, distance: u64, smooth: bool) -> Result<StrategyOutcome> {
    let (dx, dy) = match direction {
        ScrollDirection::Up => (0i64, -(distance as i64)),
        ScrollDirection::Down => (0, distance as i64),
        ScrollDirection::Left => (-(distance as i64), 0),
        ScrollDirection::Right => (distance as i64, 0),
    };
    let behavior = if smooth { "smooth" } else { "auto" };
    let js = format!("window.scrollBy({{left: {dx}, top: {dy}, behavior: '{behavior}'}})");
    page.evaluate(js.as_str())
        .await
        .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?;
    Ok(StrategyOutcome::empty())
}

async fn select(page: &Page, selector: &str, values: &[String]) -> Result<StrategyOutcome> {
    let values_json = serde_json::to_string(values).map_err(|e| crate::error::Error::invalid(e.to_string()))?;
    let js = format!(
        r"(() => {{
            const el = document.querySelector({selector});
            if (!el) return false;
            const wanted = new Set({values_json});
            for (const opt of el.options) {{ opt.selected = wanted.has(opt.value); }}
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()",
        selector = json_string(selector),
    );
    let found: bool = page
        .evaluate(js.as_str())
        .await
        .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?
        .into_value()
        .unwrap_or(false);
    if !found {
        return Err(BrowserError::ElementNotFound(selector.to_string()).into());
    }
    Ok(StrategyOutcome::empty())
}

async fn keyboard(page: &Page, key: &str, modifiers: &[String]) -> Result<StrategyOutcome> {
    let mask = modifier_mask(modifiers);
    let key_down = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyDown)
        .key(key.to_string())
        .modifiers(mask)
        .build()
        .map_err(|e| BrowserError::Cdp(e.to_string()))?;
    page.execute(key_down).await.map_err(|e| BrowserError::Cdp(e.to_string()))?;

    let key_up = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyUp)
        .key(key.to_string())
        .modifiers(mask)
        .build()
        .map_err(|e| BrowserError::Cdp(e.to_string()))?;
    page.execute(key_up).await.map_err(|e| BrowserError::Cdp(e.to_string()))?;
    Ok(StrategyOutcome::empty())
}

/// CDP `Input.dispatchKeyEvent.modifiers` bitmask: Alt=1, Ctrl=2, Meta=4, Shift=8.
fn modifier_mask(modifiers: &[String]) -> i64 {
    modifiers.iter().fold(0i64, |mask, m| {
        mask | match m.to_lowercase().as_str() {
            "alt" => 1,
            "ctrl" | "control" => 2,
            "meta" | "cmd" | "command" => 4,
            "shift" => 8,
            _ => 0,
        }
    })
}

async fn mouse(page: &Page, op: MouseOp, x: f64, y: f64, button: MouseButton) -> Result<StrategyOutcome> {
    let cdp_button = match button {
        MouseButton::Left => CdpMouseButton::Left,
        MouseButton::Right => CdpMouseButton::Right,
        MouseButton::Middle => CdpMouseButton::Middle,
    };
    let event_type = match op {
        MouseOp::Move => DispatchMouseEventType::MouseMoved,
        MouseOp::Down => DispatchMouseEventType::MousePressed,
        MouseOp::Up => DispatchMouseEventType::MouseReleased,
    };
    let cmd = DispatchMouseEventParams::builder()
        .r#type(event_type)
        .x(x)
        .y(y)
        .button(cdp_button)
        .click_count(1)
        .build()
        .map_err(|e| BrowserError::Cdp(e.to_string()))?;
    page.execute(cmd).await.map_err(|e| BrowserError::Cdp(e.to_string()))?;
    Ok(StrategyOutcome::empty())
}

async fn pdf(page: &Page, landscape: bool, print_background: bool) -> Result<StrategyOutcome> {
    let params = PrintToPdfParams::builder()
        .landscape(landscape)
        .print_background(print_background)
        .build();
    let bytes = page
        .pdf(params)
        .await
        .map_err(|e| BrowserError::Cdp(e.to_string()))?;
    let data_uri = format!("data:application/pdf;base64,{}", BASE64.encode(&bytes));
    let mut metadata = ResultMetadata::new();
    metadata.insert("bytes".into(), serde_json::json!(bytes.len()));
    Ok(StrategyOutcome::with_metadata(serde_json::json!({"pdf": data_uri}), metadata))
}

async fn cookie(
    page: &Page,
    operation: CookieOperation,
    cookies: Option<&[CookieSpec]>,
    names: Option<&[String]>,
) -> Result<StrategyOutcome> {
    match operation {
        CookieOperation::Set => {
            let specs = cookies.unwrap_or_default();
            let mut params = Vec::with_capacity(specs.len());
            for spec in specs {
                let mut builder = CookieParam::builder().name(spec.name.clone()).value(spec.value.clone());
                if let Some(ref domain) = spec.domain {
                    builder = builder.domain(domain.clone());
                }
                if let Some(ref path) = spec.path {
                    builder = builder.path(path.clone());
                }
                if let Some(http_only) = spec.http_only {
                    builder = builder.http_only(http_only);
                }
                if let Some(secure) = spec.secure {
                    builder = builder.secure(secure);
                }
                let param = builder.build().map_err(|e| crate::error::Error::invalid(e.to_string()))?;
                params.push(param);
            }
            page.set_cookies(params).await.map_err(|e| BrowserError::Cdp(e.to_string()))?;
            Ok(StrategyOutcome::empty())
        },
        CookieOperation::Get => {
            let cookies = page.get_cookies().await.map_err(|e| BrowserError::Cdp(e.to_string()))?;
            let value = serde_json::to_value(&cookies).map_err(|e| crate::error::Error::invalid(e.to_string()))?;
            Ok(StrategyOutcome::value(value))
        },
        CookieOperation::Delete => {
            for name in names.unwrap_or_default() {
                let cmd = DeleteCookiesParams::builder()
                    .name(name.clone())
                    .build()
                    .map_err(|e| crate::error::Error::invalid(e.to_string()))?;
                page.execute(cmd).await.map_err(|e| BrowserError::Cdp(e.to_string()))?;
            }
            Ok(StrategyOutcome::empty())
        },
        CookieOperation::Clear => {
            let existing = page.get_cookies().await.map_err(|e| BrowserError::Cdp(e.to_string()))?;
            for c in existing {
                let cmd = DeleteCookiesParams::builder()
                    .name(c.name)
                    .build()
                    .map_err(|e| crate::error::Error::invalid(e.to_string()))?;
                page.execute(cmd).await.map_err(|e| BrowserError::Cdp(e.to_string()))?;
            }
            Ok(StrategyOutcome::empty())
        },
    }
}

async fn content(page: &Page, selector: Option<&str>) -> Result<StrategyOutcome> {
    let html = match selector {
        None => page.content().await.map_err(|e| BrowserError::Cdp(e.to_string()))?,
        Some(selector) => {
            let js = format!("document.querySelector({})?.outerHTML ?? null", json_string(selector));
            let value: Option<String> = page
                .evaluate(js.as_str())
                .await
                .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?
                .into_value()
                .unwrap_or(None);
            value.ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))?
        },
    };
    let mut metadata = ResultMetadata::new();
    metadata.insert("bytes".into(), serde_json::json!(html.len()));
    Ok(StrategyOutcome::with_metadata(serde_json::json!({"html": html}), metadata))
}

fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_mask_combines_bits() {
        let mask = modifier_mask(&["shift".to_string(), "ctrl".to_string()]);
        assert_eq!(mask, 8 | 2);
    }

    #[test]
    fn modifier_mask_ignores_unknown() {
        assert_eq!(modifier_mask(&["nonsense".to_string()]), 0);
    }

    #[test]
    fn json_string_escapes_quotes() {
        assert_eq!(json_string("a\"b"), "\"a\\\"b\"");
    }
}
