//! Pool-wide browser configuration (§6 Configuration: Pool).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the browser pool, lifecycle, and health checker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Whether browser support is enabled.
    pub enabled: bool,
    /// Path to Chrome/Chromium binary (auto-detected if not set).
    pub chrome_path: Option<String>,
    /// Whether to run in headless mode.
    pub headless: bool,
    /// Default viewport width.
    pub viewport_width: u32,
    /// Default viewport height.
    pub viewport_height: u32,
    /// Device scale factor for HiDPI/Retina displays.
    pub device_scale_factor: f64,
    /// Minimum browsers kept warm at all times.
    pub min_browsers: usize,
    /// Maximum concurrent browser instances.
    pub max_browsers: usize,
    /// Maximum pages open per browser instance.
    pub max_pages_per_browser: usize,
    /// Instance idle timeout before it's a removal candidate.
    pub idle_timeout: Duration,
    /// How long an `acquireBrowser` caller waits in the acquisition queue.
    pub acquisition_timeout: Duration,
    /// Interval between health-checker sweeps.
    pub health_check_interval: Duration,
    /// `needsRestart` age threshold.
    pub max_lifetime: Duration,
    /// `needsRestart` use-count threshold.
    pub max_uses: u64,
    /// `needsRestart` error-count threshold.
    pub max_errors: u64,
    /// Default navigation timeout.
    pub navigation_timeout: Duration,
    /// User agent string (uses engine default if not set).
    pub user_agent: Option<String>,
    /// Additional Chrome launch arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
    /// Docker/Apple-container image for sandboxed browsers.
    #[serde(default = "default_sandbox_image")]
    pub sandbox_image: String,
    /// Container name prefix for sandboxed instances.
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,
    /// Allowed navigation domains (empty = all allowed).
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// System memory threshold (0-100) above which new instances are blocked.
    pub memory_limit_percent: u8,
}

fn default_sandbox_image() -> String {
    "browserless/chrome".to_string()
}

fn default_container_prefix() -> String {
    "headlessd-browser".to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chrome_path: None,
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            device_scale_factor: 1.0,
            min_browsers: 1,
            max_browsers: 5,
            max_pages_per_browser: 10,
            idle_timeout: Duration::from_secs(300),
            acquisition_timeout: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(3600),
            max_uses: 1000,
            max_errors: 10,
            navigation_timeout: Duration::from_secs(30),
            user_agent: None,
            chrome_args: Vec::new(),
            sandbox_image: default_sandbox_image(),
            container_prefix: default_container_prefix(),
            allowed_domains: Vec::new(),
            memory_limit_percent: 90,
        }
    }
}

/// Check if a URL is allowed based on the allowed domains list.
/// Returns true if allowed, false if blocked.
#[must_use]
pub fn is_domain_allowed(url: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true; // No restrictions
    }

    let Ok(parsed) = url::Url::parse(url) else {
        return false; // Invalid URL, block it
    };

    let Some(host) = parsed.host_str() else {
        return false; // No host, block it
    };

    for pattern in allowed_domains {
        if let Some(suffix) = pattern.strip_prefix("*.") {
            let dotted_suffix = &pattern[1..]; // .example.com
            if host.ends_with(dotted_suffix) || host == suffix {
                return true;
            }
        } else if host == pattern {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_allowed_empty_list() {
        assert!(is_domain_allowed("https://example.com", &[]));
        assert!(is_domain_allowed("https://evil.com", &[]));
    }

    #[test]
    fn domain_allowed_exact_match() {
        let allowed = vec!["example.com".to_string()];
        assert!(is_domain_allowed("https://example.com/path", &allowed));
        assert!(!is_domain_allowed("https://other.com", &allowed));
        assert!(!is_domain_allowed("https://sub.example.com", &allowed));
    }

    #[test]
    fn domain_allowed_wildcard() {
        let allowed = vec!["*.example.com".to_string()];
        assert!(is_domain_allowed("https://sub.example.com", &allowed));
        assert!(is_domain_allowed("https://foo.bar.example.com", &allowed));
        assert!(is_domain_allowed("https://example.com", &allowed));
        assert!(!is_domain_allowed("https://notexample.com", &allowed));
    }

    #[test]
    fn domain_allowed_multiple() {
        let allowed = vec!["example.com".to_string(), "*.trusted.org".to_string()];
        assert!(is_domain_allowed("https://example.com", &allowed));
        assert!(is_domain_allowed("https://sub.trusted.org", &allowed));
        assert!(!is_domain_allowed("https://evil.com", &allowed));
    }

    #[test]
    fn domain_allowed_invalid_url() {
        let allowed = vec!["example.com".to_string()];
        assert!(!is_domain_allowed("not-a-url", &allowed));
        assert!(!is_domain_allowed("", &allowed));
    }
}
