//! Action Model validation (AM, §4.8): the structural rules checked before
//! an action ever reaches a page. Distinct from the Security Validator
//! (`security.rs`), which only inspects `evaluate`/CSS payloads.

use headlessd_protocol::action::{ActionRequest, CookieOperation, ScreenshotFormat};
use url::Url;

use crate::error::{Error, Result};

const ALLOWED_NAVIGATE_SCHEMES: &[&str] = &["http", "https", "about"];

/// `validateAction` (§4.8 step 1 of AE, rules list). Returns the first
/// violated rule as an `Error::Invalid`; callers that need every issue at
/// once should extend this to collect rather than short-circuit, but AE
/// only needs the first failure to stop the pipeline.
pub fn validate_action(action: &ActionRequest) -> Result<()> {
    match action {
        ActionRequest::Navigate { url, .. } => validate_navigate(url),
        ActionRequest::Click {
            selector,
            click_count,
            ..
        } => {
            validate_selector(selector)?;
            if *click_count < 1 {
                return Err(Error::invalid("click_count must be >= 1"));
            }
            Ok(())
        },
        ActionRequest::Type { selector, .. } => validate_selector(selector),
        ActionRequest::Wait { .. } => Ok(()),
        ActionRequest::Evaluate { function, .. } => {
            if function.trim().is_empty() {
                return Err(Error::invalid("evaluate requires a non-empty function body"));
            }
            Ok(())
        },
        ActionRequest::Screenshot { format, quality, .. } => {
            if let Some(q) = quality {
                if !matches!(format, ScreenshotFormat::Jpeg | ScreenshotFormat::Webp) {
                    return Err(Error::invalid("quality is only valid for jpeg/webp screenshots"));
                }
                if *q > 100 {
                    return Err(Error::invalid("quality must be between 0 and 100"));
                }
            }
            Ok(())
        },
        ActionRequest::Scroll { .. } => Ok(()),
        ActionRequest::Select { selector, values, .. } => {
            validate_selector(selector)?;
            if values.is_empty() {
                return Err(Error::invalid("select requires at least one value"));
            }
            Ok(())
        },
        ActionRequest::Keyboard { key, .. } => {
            if key.trim().is_empty() {
                return Err(Error::invalid("keyboard action requires a non-empty key"));
            }
            Ok(())
        },
        ActionRequest::Mouse { .. } => Ok(()),
        ActionRequest::Pdf { .. } => Ok(()),
        ActionRequest::Cookie {
            operation,
            cookies,
            names,
            ..
        } => validate_cookie(*operation, cookies.as_deref(), names.as_deref()),
        ActionRequest::Content { selector, .. } => match selector {
            Some(s) => validate_selector(s),
            None => Ok(()),
        },
        ActionRequest::Close { .. } => Ok(()),
    }
}

fn validate_navigate(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|e| Error::invalid(format!("invalid url: {e}")))?;
    if !ALLOWED_NAVIGATE_SCHEMES.contains(&parsed.scheme()) {
        return Err(Error::invalid(format!(
            "navigate scheme `{}` is not allowed (expected one of {ALLOWED_NAVIGATE_SCHEMES:?})",
            parsed.scheme()
        )));
    }
    Ok(())
}

fn validate_selector(selector: &str) -> Result<()> {
    if selector.trim().is_empty() {
        return Err(Error::invalid("selector must not be empty"));
    }
    Ok(())
}

fn validate_cookie(
    operation: CookieOperation,
    cookies: Option<&[headlessd_protocol::action::CookieSpec]>,
    names: Option<&[String]>,
) -> Result<()> {
    match operation {
        CookieOperation::Set => {
            if cookies.map(<[_]>::is_empty).unwrap_or(true) {
                return Err(Error::invalid("cookie set requires at least one cookie"));
            }
            Ok(())
        },
        CookieOperation::Delete => {
            if names.map(<[_]>::is_empty).unwrap_or(true) {
                return Err(Error::invalid("cookie delete requires at least one name"));
            }
            Ok(())
        },
        CookieOperation::Get | CookieOperation::Clear => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use headlessd_protocol::action::{MouseButton, WaitSpec, WaitUntil};

    use super::*;

    #[test]
    fn navigate_rejects_disallowed_scheme() {
        let action = ActionRequest::Navigate {
            url: "javascript:alert(1)".into(),
            wait_until: WaitUntil::Load,
            timeout: None,
        };
        assert!(validate_action(&action).is_err());
    }

    #[test]
    fn navigate_accepts_https() {
        let action = ActionRequest::Navigate {
            url: "https://example.invalid/page".into(),
            wait_until: WaitUntil::Load,
            timeout: None,
        };
        assert!(validate_action(&action).is_ok());
    }

    #[test]
    fn click_rejects_zero_click_count() {
        let action = ActionRequest::Click {
            selector: "#ok".into(),
            button: MouseButton::Left,
            click_count: 0,
            delay: 0,
            timeout: None,
        };
        assert!(validate_action(&action).is_err());
    }

    #[test]
    fn screenshot_rejects_quality_on_png() {
        let action = ActionRequest::Screenshot {
            full_page: false,
            format: ScreenshotFormat::Png,
            quality: Some(80),
            timeout: None,
        };
        assert!(validate_action(&action).is_err());
    }

    #[test]
    fn wait_selector_variant_is_valid() {
        let action = ActionRequest::Wait {
            spec: WaitSpec::Selector {
                selector: "#ready".into(),
                timeout: Some(1000),
            },
            timeout: None,
        };
        assert!(validate_action(&action).is_ok());
    }

    #[test]
    fn cookie_set_requires_cookies() {
        let action = ActionRequest::Cookie {
            operation: CookieOperation::Set,
            cookies: None,
            names: None,
            timeout: None,
        };
        assert!(validate_action(&action).is_err());
    }
}
