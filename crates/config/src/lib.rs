//! Configuration loading, validation, and env substitution.
//!
//! Config files: `headlessd.toml`, `headlessd.yaml`, or `headlessd.json`.
//! Searched in `./` then `~/.config/headlessd/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all
//! string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_or_default_config_path, load_config, save_config},
    schema::{
        AmbientConfig, ConflictResolutionMode, DefaultTimeouts, ExecutorConfig, HeadlessdConfig,
        LoggingConfig, MetricsConfig, MigrationSettings, MonitoringConfig, PoolConfig,
        RateLimitConfig, ReplicationSettings, StoreBackendType, StoreConfig,
    },
    template::default_config_template,
    validate::{validate, Diagnostic, Severity, ValidationResult},
};
