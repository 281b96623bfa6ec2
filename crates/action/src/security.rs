//! Security Validator (SV, §4.8): inspects `evaluate` JavaScript and any
//! CSS payload a strategy hands it before the engine ever sees the string.
//! Grounded on the dangerous-pattern/`RegexSet` idiom used for shell-command
//! approval elsewhere in this codebase, retargeted at script payloads.

use headlessd_metrics::{counter, labels, security as security_metrics};
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};

const MAX_JS_BYTES: usize = 64 * 1024;
const MAX_CSS_BYTES: usize = 256 * 1024;
const MAX_NESTING_DEPTH: usize = 20;
const MAX_EVAL_ARGS: usize = 10;
const MAX_ARG_BYTES: usize = 10_000;
const MAX_CSS_SELECTORS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: String,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl Issue {
    fn new(issue_type: &str, message: impl Into<String>, severity: Severity, rule: Option<&str>) -> Self {
        Self {
            issue_type: issue_type.to_string(),
            message: message.into(),
            severity,
            rule: rule.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// (regex, rule name, severity, message). `RegexSet` below is built from
/// the same list so pattern index and metadata stay in lockstep.
static JS_PATTERN_DEFS: &[(&str, &str, Severity, &str)] = &[
    (r"\beval\s*\(", "eval_call", Severity::Critical, "eval() is disallowed"),
    (
        r"new\s+Function\s*\(",
        "function_constructor",
        Severity::Critical,
        "the Function constructor is disallowed",
    ),
    (
        r"\bXMLHttpRequest\b",
        "xhr",
        Severity::High,
        "XMLHttpRequest is disallowed inside page scripts",
    ),
    (
        r"\bfetch\s*\(",
        "fetch_call",
        Severity::High,
        "fetch() is disallowed inside page scripts",
    ),
    (
        r"(window|top|self)\.location\s*=",
        "self_navigation",
        Severity::High,
        "navigating the page from script is disallowed",
    ),
    (
        r"\bsetTimeout\s*\(\s*['\"`]",
        "string_timer",
        Severity::Medium,
        "setTimeout with a string body is disallowed (string-to-code execution)",
    ),
    (
        r"\bsetInterval\s*\(\s*['\"`]",
        "string_timer",
        Severity::Medium,
        "setInterval with a string body is disallowed (string-to-code execution)",
    ),
];

static JS_SET: std::sync::LazyLock<RegexSet> = std::sync::LazyLock::new(|| {
    RegexSet::new(JS_PATTERN_DEFS.iter().map(|(p, ..)| *p))
        .unwrap_or_else(|e| panic!("built-in JS dangerous patterns must be valid regex: {e}"))
});

static JS_PATTERNS: std::sync::LazyLock<Vec<Regex>> = std::sync::LazyLock::new(|| {
    JS_PATTERN_DEFS
        .iter()
        .map(|(p, ..)| Regex::new(p).expect("validated by JS_SET"))
        .collect()
});

/// `validateJavaScript` (§4.8): size, dangerous patterns, bracket balance,
/// unterminated quotes, nesting depth.
#[must_use]
pub fn validate_javascript(code: &str) -> ValidationReport {
    counter!(security_metrics::VALIDATIONS_TOTAL).increment(1);
    let mut issues = Vec::new();

    if code.len() > MAX_JS_BYTES {
        issues.push(Issue::new(
            "size_limit",
            format!("script is {} bytes, limit is {MAX_JS_BYTES}", code.len()),
            Severity::High,
            None,
        ));
    }

    for idx in JS_SET.matches(code).iter() {
        let (_, rule, severity, message) = JS_PATTERN_DEFS[idx];
        issues.push(Issue::new("dangerous_pattern", message, severity, Some(rule)));
    }

    if let Some(reason) = unbalanced_reason(code) {
        issues.push(Issue::new("syntax", reason, Severity::High, None));
    }

    let depth = max_nesting_depth(code);
    if depth > MAX_NESTING_DEPTH {
        issues.push(Issue::new(
            "nesting_depth",
            format!("nesting depth {depth} exceeds limit {MAX_NESTING_DEPTH}"),
            Severity::High,
            None,
        ));
    }

    for issue in &issues {
        counter!(
            security_metrics::REJECTIONS_TOTAL,
            labels::RULE => issue.rule.clone().unwrap_or_else(|| issue.issue_type.clone()),
            labels::SEVERITY => severity_label(issue.severity),
        )
        .increment(1);
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
        error: None,
    }
}

/// `validateCss` (§4.8): size, dangerous `@import` URLs, selector explosion.
#[must_use]
pub fn validate_css(css: &str) -> ValidationReport {
    counter!(security_metrics::VALIDATIONS_TOTAL).increment(1);
    let mut issues = Vec::new();

    if css.len() > MAX_CSS_BYTES {
        issues.push(Issue::new(
            "size_limit",
            format!("stylesheet is {} bytes, limit is {MAX_CSS_BYTES}", css.len()),
            Severity::High,
            None,
        ));
    }

    for dangerous in ["javascript:", "vbscript:", "file:", "ftp:"] {
        if css.contains(dangerous) {
            issues.push(Issue::new(
                "dangerous_import",
                format!("`@import` with a `{dangerous}` URL is disallowed"),
                Severity::Critical,
                Some("dangerous_import"),
            ));
        }
    }
    if css.contains("data:") && css.to_lowercase().contains("script") {
        issues.push(Issue::new(
            "dangerous_import",
            "`@import` with a script-bearing data: URL is disallowed",
            Severity::Critical,
            Some("dangerous_import"),
        ));
    }

    let selector_count = css.matches('{').count();
    if selector_count > MAX_CSS_SELECTORS {
        issues.push(Issue::new(
            "selector_explosion",
            format!("stylesheet declares {selector_count} rules, limit is {MAX_CSS_SELECTORS}"),
            Severity::High,
            None,
        ));
    }

    for issue in &issues {
        counter!(
            security_metrics::REJECTIONS_TOTAL,
            labels::RULE => issue.rule.clone().unwrap_or_else(|| issue.issue_type.clone()),
            labels::SEVERITY => severity_label(issue.severity),
        )
        .increment(1);
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
        error: None,
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::High => "high",
        Severity::Medium => "medium",
        Severity::Low => "low",
    }
}

fn unbalanced_reason(code: &str) -> Option<String> {
    let mut stack = Vec::new();
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for ch in code.chars() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => in_string = Some(ch),
            '(' | '[' | '{' => stack.push(ch),
            ')' | ']' | '}' => {
                let expected = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some(open) if open == expected => {},
                    _ => return Some(format!("unbalanced `{ch}`")),
                }
            },
            _ => {},
        }
    }
    if in_string.is_some() {
        return Some("unterminated string literal".to_string());
    }
    if let Some(open) = stack.last() {
        return Some(format!("unbalanced `{open}`"));
    }
    None
}

fn max_nesting_depth(code: &str) -> usize {
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for ch in code.chars() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => in_string = Some(ch),
            '(' | '[' | '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            },
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {},
        }
    }
    max_depth
}

/// Prepares `evaluate` arguments for the page (§4.8): caps count and
/// per-argument size, rejects callables, and deep-clones every value by
/// round-tripping it through JSON so no reference into caller memory can
/// leak into the page.
pub fn prepare_eval_args(args: &[serde_json::Value]) -> crate::error::Result<Vec<serde_json::Value>> {
    if args.len() > MAX_EVAL_ARGS {
        return Err(crate::error::Error::security(
            "arg_count",
            format!("evaluate accepts at most {MAX_EVAL_ARGS} arguments, got {}", args.len()),
        ));
    }
    let mut cloned = Vec::with_capacity(args.len());
    for arg in args {
        let serialized = serde_json::to_vec(arg)
            .map_err(|e| crate::error::Error::invalid(format!("argument is not serializable: {e}")))?;
        if serialized.len() > MAX_ARG_BYTES {
            return Err(crate::error::Error::security(
                "arg_size",
                format!("argument serializes to {} bytes, limit is {MAX_ARG_BYTES}", serialized.len()),
            ));
        }
        let round_tripped: serde_json::Value = serde_json::from_slice(&serialized)
            .map_err(|e| crate::error::Error::invalid(format!("argument failed to round-trip: {e}")))?;
        cloned.push(round_tripped);
    }
    Ok(cloned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_call_is_critical() {
        let report = validate_javascript("eval('2+2')");
        assert!(!report.is_valid);
        assert!(report.issues.iter().any(|i| i.severity == Severity::Critical));
    }

    #[test]
    fn benign_script_is_valid() {
        let report = validate_javascript("document.querySelector('#a').textContent");
        assert!(report.is_valid);
    }

    #[test]
    fn unbalanced_brackets_detected() {
        let report = validate_javascript("function f() { return (1 + 2; }");
        assert!(!report.is_valid);
    }

    #[test]
    fn excessive_nesting_detected() {
        let mut code = String::new();
        for _ in 0..25 {
            code.push('(');
        }
        code.push('1');
        for _ in 0..25 {
            code.push(')');
        }
        let report = validate_javascript(&code);
        assert!(!report.is_valid);
        assert!(report.issues.iter().any(|i| i.issue_type == "nesting_depth"));
    }

    #[test]
    fn xhr_flagged_high() {
        let report = validate_javascript("new XMLHttpRequest()");
        assert!(report.issues.iter().any(|i| i.severity == Severity::High));
    }

    #[test]
    fn css_javascript_import_rejected() {
        let report = validate_css("@import url('javascript:alert(1)');");
        assert!(!report.is_valid);
    }

    #[test]
    fn css_selector_explosion_rejected() {
        let mut css = String::new();
        for i in 0..1200 {
            css.push_str(&format!(".c{i} {{ color: red; }}"));
        }
        let report = validate_css(&css);
        assert!(!report.is_valid);
    }

    #[test]
    fn eval_args_cap_enforced() {
        let args = vec![serde_json::json!(1); 11];
        assert!(prepare_eval_args(&args).is_err());
    }

    #[test]
    fn eval_args_round_trip() {
        let args = vec![serde_json::json!({"a": 1})];
        let cloned = prepare_eval_args(&args).unwrap();
        assert_eq!(cloned, args);
    }
}
