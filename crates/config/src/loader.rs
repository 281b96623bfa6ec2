use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use headlessd_metrics::{config as config_metrics, counter, histogram, labels};
use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::HeadlessdConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "headlessd.toml",
    "headlessd.yaml",
    "headlessd.yml",
    "headlessd.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<HeadlessdConfig> {
    let start = Instant::now();
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    let result = parse_config(&raw, path);
    histogram!(config_metrics::LOAD_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
    result
}

/// Load and parse the config file with env substitution, returned as a
/// generic JSON value (used by `headlessd config show`/diagnostics).
pub fn load_config_value(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config_value(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./headlessd.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/headlessd/headlessd.{toml,yaml,yml,json}` (user-global)
///
/// Returns `HeadlessdConfig::default()` if no config file is found or the
/// found file fails to load; the caller is expected to run [`crate::validate`]
/// afterward regardless of which path was taken.
#[must_use]
pub fn discover_and_load() -> HeadlessdConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    HeadlessdConfig::default()
}

/// Find the first config file in standard locations.
#[must_use]
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "headlessd") {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/headlessd/`).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "headlessd").map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default TOML path.
#[must_use]
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("headlessd.toml")
}

/// Serialize `config` to TOML and write it to the user-global config path.
///
/// Creates parent directories if needed. Returns the path written to.
pub fn save_config(config: &HeadlessdConfig) -> Result<PathBuf> {
    let path = find_or_default_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| Error::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let toml_str = toml::to_string_pretty(config).map_err(|e| Error::Serialize(Box::new(e)))?;
    std::fs::write(&path, toml_str).map_err(|source| Error::Write {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), "saved config");
    Ok(path)
}

fn parse_config(raw: &str, path: &Path) -> Result<HeadlessdConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    let result = match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            format: "toml",
            source: Box::new(e),
        }),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            format: "yaml",
            source: Box::new(e),
        }),
        "json" => serde_json::from_str(raw).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            format: "json",
            source: Box::new(e),
        }),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    };
    if result.is_err() {
        counter!(config_metrics::PARSE_ERRORS_TOTAL, labels::FORMAT => ext.to_string()).increment(1);
    }
    result
}

fn parse_config_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw).map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                format: "toml",
                source: Box::new(e),
            })?;
            serde_json::to_value(v).map_err(|e| Error::Serialize(Box::new(e)))
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(raw).map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                format: "yaml",
                source: Box::new(e),
            })?;
            serde_json::to_value(v).map_err(|e| Error::Serialize(Box::new(e)))
        },
        "json" => serde_json::from_str(raw).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            format: "json",
            source: Box::new(e),
        }),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_toml_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headlessd.toml");
        let mut config = HeadlessdConfig::default();
        config.pool.max_browsers = 9;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        std::fs::write(&path, toml_str).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.pool.max_browsers, 9);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headlessd.ini");
        std::fs::write(&path, "pool.min_browsers = 1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
