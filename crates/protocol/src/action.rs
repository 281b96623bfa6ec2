//! Action wire shapes (§3 Action/ActionResult, §4.8 variant fields).
//!
//! `ActionRequest` is the JSON a frontend hands the core: a tagged union
//! discriminated by `type`, one variant per strategy. An unknown `type` is
//! a parse failure, which `headlessd-action` turns into `Invalid` — there
//! is no silent fallthrough variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    Load,
    Domcontentloaded,
    Networkidle0,
    Networkidle2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotFormat {
    Png,
    Jpeg,
    Webp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseOp {
    Move,
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieOperation {
    Set,
    Get,
    Delete,
    Clear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub secure: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "waitType", rename_all = "snake_case")]
pub enum WaitSpec {
    Selector {
        selector: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Timeout {
        duration: u64,
    },
}

/// Tagged union discriminated by `type`; each variant carries only the
/// fields its strategy needs, plus the optional per-action `timeout`
/// shared by all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionRequest {
    Navigate {
        url: String,
        #[serde(default = "default_wait_until")]
        wait_until: WaitUntil,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Click {
        selector: String,
        #[serde(default = "default_mouse_button")]
        button: MouseButton,
        #[serde(default = "default_click_count")]
        click_count: u32,
        #[serde(default)]
        delay: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Type {
        selector: String,
        text: String,
        #[serde(default)]
        delay: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Wait {
        #[serde(flatten)]
        spec: WaitSpec,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Evaluate {
        function: String,
        #[serde(default)]
        args: Vec<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Screenshot {
        #[serde(default)]
        full_page: bool,
        #[serde(default = "default_screenshot_format")]
        format: ScreenshotFormat,
        #[serde(skip_serializing_if = "Option::is_none")]
        quality: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Scroll {
        direction: ScrollDirection,
        #[serde(default)]
        distance: u64,
        #[serde(default)]
        smooth: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Select {
        selector: String,
        values: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Keyboard {
        key: String,
        #[serde(default)]
        modifiers: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Mouse {
        op: MouseOp,
        x: f64,
        y: f64,
        #[serde(default = "default_mouse_button")]
        button: MouseButton,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Pdf {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(default)]
        landscape: bool,
        #[serde(default)]
        print_background: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Cookie {
        operation: CookieOperation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cookies: Option<Vec<CookieSpec>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        names: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Content {
        #[serde(skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Close {
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
}

fn default_wait_until() -> WaitUntil {
    WaitUntil::Load
}

fn default_mouse_button() -> MouseButton {
    MouseButton::Left
}

fn default_click_count() -> u32 {
    1
}

fn default_screenshot_format() -> ScreenshotFormat {
    ScreenshotFormat::Png
}

impl ActionRequest {
    /// The `type` discriminant, for audit/metrics labelling without
    /// re-matching the whole variant.
    #[must_use]
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Click { .. } => "click",
            Self::Type { .. } => "type",
            Self::Wait { .. } => "wait",
            Self::Evaluate { .. } => "evaluate",
            Self::Screenshot { .. } => "screenshot",
            Self::Scroll { .. } => "scroll",
            Self::Select { .. } => "select",
            Self::Keyboard { .. } => "keyboard",
            Self::Mouse { .. } => "mouse",
            Self::Pdf { .. } => "pdf",
            Self::Cookie { .. } => "cookie",
            Self::Content { .. } => "content",
            Self::Close { .. } => "close",
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Option<u64> {
        match self {
            Self::Navigate { timeout, .. }
            | Self::Click { timeout, .. }
            | Self::Type { timeout, .. }
            | Self::Wait { timeout, .. }
            | Self::Evaluate { timeout, .. }
            | Self::Screenshot { timeout, .. }
            | Self::Scroll { timeout, .. }
            | Self::Select { timeout, .. }
            | Self::Keyboard { timeout, .. }
            | Self::Mouse { timeout, .. }
            | Self::Pdf { timeout, .. }
            | Self::Cookie { timeout, .. }
            | Self::Content { timeout, .. }
            | Self::Close { timeout, .. } => *timeout,
        }
    }
}

/// Metadata attached to a result: sizes, truncation, the selector touched,
/// etc. Kept as a loose JSON object since shape varies per variant.
pub type ResultMetadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<crate::ErrorShape>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: ResultMetadata,
}

impl ActionResult {
    #[must_use]
    pub fn ok(
        action_type: &str,
        data: Option<serde_json::Value>,
        duration_ms: u64,
        metadata: ResultMetadata,
    ) -> Self {
        Self {
            success: true,
            action_type: action_type.to_string(),
            data,
            error: None,
            duration_ms,
            timestamp: Utc::now(),
            metadata,
        }
    }

    #[must_use]
    pub fn fail(action_type: &str, error: crate::ErrorShape, duration_ms: u64) -> Self {
        Self {
            success: false,
            action_type: action_type.to_string(),
            data: None,
            error: Some(error),
            duration_ms,
            timestamp: Utc::now(),
            metadata: ResultMetadata::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_round_trips_through_json() {
        let action = ActionRequest::Navigate {
            url: "https://example.invalid/ok".into(),
            wait_until: WaitUntil::Load,
            timeout: None,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "navigate");
        let back: ActionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.action_type(), "navigate");
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let json = serde_json::json!({"type": "teleport"});
        let parsed: Result<ActionRequest, _> = serde_json::from_value(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn failure_result_never_carries_data() {
        let result = ActionResult::fail(
            "evaluate",
            crate::ErrorShape::security("eval", "eval() is disallowed"),
            2,
        );
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.is_some());
    }
}
