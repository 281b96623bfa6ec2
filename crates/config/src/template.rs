//! Default configuration template with all options documented.
//!
//! Used when creating a new config file via `headlessd config init`. Every
//! recognized option appears commented-out with its default value, so a
//! user can see what exists without having to change anything.

/// Generate the default config template.
#[must_use]
pub fn default_config_template() -> String {
    r##"# headlessd Configuration
# =======================
# This file contains all recognized configuration options.
# Uncomment and modify settings as needed.
# Changes require a restart to take effect.
#
# Environment variable substitution is supported: ${ENV_VAR} and ${ENV_VAR:-default}

# ══════════════════════════════════════════════════════════════════════════════
# BROWSER POOL
# ══════════════════════════════════════════════════════════════════════════════

[pool]
min_browsers = 1                       # Browsers kept warm at all times
max_browsers = 5                       # Hard ceiling on concurrent browser instances
max_pages_per_browser = 10             # Contexts/pages a single browser may host
idle_timeout_secs = 300                # Idle browser reaped after this long
acquisition_timeout_secs = 30          # Caller gives up waiting for a free browser after this
health_check_interval_secs = 30        # Liveness probe cadence
max_lifetime_secs = 3600               # Forced recycle regardless of health
max_uses = 1000                        # Forced recycle after this many leases
max_errors = 10                        # Forced recycle after this many consecutive failures
navigation_timeout_secs = 30           # Default per-navigation timeout
headless = true                        # Run Chrome headless (false only for local debugging)
launch_args = []                       # Extra Chrome command-line flags
# chrome_path = "/usr/bin/chromium"    # Override auto-detection
# user_agent = "headlessd/1.0"         # Override the default user agent string
allowed_domains = []                   # Empty = no domain allowlist enforced

# ══════════════════════════════════════════════════════════════════════════════
# SESSION STORE
# ══════════════════════════════════════════════════════════════════════════════

[store]
type = "memory"                        # "memory" | "redis" | "auto"
# url = "redis://127.0.0.1:6379"       # Required when type = "redis"
prefix = "headlessd:"                  # Key prefix for all stored records
max_retries = 3                        # Backend operation retries before surfacing an error
retry_delay_ms = 100                   # Delay between retries
startup_probe_timeout_ms = 2000        # Time allotted to the startup connectivity probe

[store.monitoring]
interval_secs = 30                     # Synthetic create/get/delete probe cadence
max_latency_ms = 250                   # Probe latency budget before degraded
max_error_rate = 0.1                   # Fraction of failed probes before degraded
max_fallback_time_ms = 5000            # Time spent on a fallback backend before unhealthy
min_availability = 0.95                # Rolling availability floor before unhealthy

[store.replication]
enabled = false                        # Fan writes out to replica_urls
replica_urls = []                      # e.g. ["redis://replica-a:6379"]
sync_interval_secs = 60                # Background reconciliation cadence
batch_size = 100                       # Ops per reconciliation batch
conflict_resolution = "last_write_wins"  # "last_write_wins" | "oldest_wins" | "manual"
sync_deletions = true                  # Propagate deletes to replicas
sync_expired = false                   # Propagate expiry sweeps to replicas
slo_p95_budget_ms = 500.0              # p95 replication lag budget; 3 consecutive breaches degrade
max_retries = 5                        # Per-op replication retry budget

[store.migration]
enabled = false                        # Run a one-time migration from a prior backend on startup
batch_size = 100                       # Records migrated per batch

# ══════════════════════════════════════════════════════════════════════════════
# ACTION EXECUTOR
# ══════════════════════════════════════════════════════════════════════════════

[executor.default_timeouts]
navigate_ms = 30000
evaluate_ms = 10000
screenshot_ms = 30000
wait_ms = 30000

[executor]
max_result_bytes = 102400              # Action result payload cap (bytes)
max_arg_count = 10                     # Max arguments to an evaluate() call
max_arg_bytes = 10000                  # Max serialized size of a single argument
max_nesting_depth = 20                 # Max JSON nesting depth for arguments/results
deny_patterns_js = []                  # Additional regexes rejected in evaluate() bodies
deny_patterns_css = []                 # Additional regexes rejected in selector strings

# ══════════════════════════════════════════════════════════════════════════════
# AMBIENT: LOGGING, METRICS, RATE LIMITING
# ══════════════════════════════════════════════════════════════════════════════

[ambient.logging]
level = "info"                         # "trace" | "debug" | "info" | "warn" | "error"
json = false                           # Structured JSON logs instead of human-readable

[ambient.metrics]
enabled = false                        # Expose a Prometheus scrape endpoint
# prometheus_addr = "127.0.0.1:9090"   # Required when enabled = true

[ambient.rate_limit]
per_session_per_minute = 600           # Actions a single session may submit per minute
per_addr_per_minute = 1200             # Actions a single remote address may submit per minute
"##
    .to_string()
}
