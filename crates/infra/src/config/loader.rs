//! Configuration loader
//!
//! Loads [`TetherSettings`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If `TETHER_CONFIG` is set, that file is loaded
//! 2. Otherwise the standard locations are probed for a config file
//! 3. Environment overrides are applied on top of the file (or defaults)
//! 4. The result is validated
//!
//! ## Environment Variables
//! - `TETHER_CONFIG`: Explicit config file path
//! - `TETHER_MAX_RETRIES`: Retries after the initial attempt
//! - `TETHER_RETRY_DELAY_MS`: Base retry delay
//! - `TETHER_EXPONENTIAL_BACKOFF`: Double the delay per retry (true/false)
//! - `TETHER_MAX_RETRY_DELAY_MS`: Retry delay ceiling
//! - `TETHER_ENABLE_OFFLINE_MODE`: Queue requests while offline (true/false)
//! - `TETHER_ENABLE_CACHING`: Cache successful GETs (true/false)
//! - `TETHER_CACHE_TTL_MS`: Cache entry lifetime
//! - `TETHER_CACHE_SWEEP_INTERVAL_MS`: Expired-entry sweep period
//! - `TETHER_ENABLE_FALLBACK_DATA`: Serve fallback payloads (true/false)
//! - `TETHER_OFFLINE_QUEUE_CAPACITY`: Maximum queued requests
//! - `TETHER_STORAGE_KEY`: Durable-storage key of the cache blob
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./tether.{toml,json}` then `./config.{toml,json}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tether_core::FallbackTable;
use tether_domain::{ResilienceConfig, Result, TetherError};

/// Variable naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "TETHER_CONFIG";

const FILE_NAMES: [&str; 4] = ["tether.toml", "tether.json", "config.toml", "config.json"];

/// Everything an application needs to assemble a resilient client.
///
/// ```toml
/// [resilience]
/// max_retries = 5
///
/// [[fallback]]
/// pattern = "/api/articles"
/// payload = { articles = [], total = 0 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherSettings {
    pub resilience: ResilienceConfig,
    /// Ordered fallback rules; the first match wins
    pub fallback: FallbackTable,
}

impl TetherSettings {
    /// # Errors
    /// Returns `TetherError::Config` when the resilience options are invalid.
    pub fn validate(&self) -> Result<()> {
        self.resilience.validate()
    }
}

/// Load settings with the strategy described in the module docs.
///
/// # Errors
/// Returns `TetherError::Config` if:
/// - `TETHER_CONFIG` names a missing or unparsable file
/// - A probed file is unparsable
/// - An environment override has an invalid value
/// - The merged settings fail validation
pub fn load() -> Result<TetherSettings> {
    let explicit = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
    let mut settings = match explicit {
        Some(path) => read_file(&path)?,
        None => match probe_config_paths() {
            Some(path) => read_file(&path)?,
            None => {
                tracing::debug!("no config file found, using defaults");
                TetherSettings::default()
            }
        },
    };

    apply_overrides(&mut settings.resilience, |key| std::env::var(key).ok())?;
    settings.validate()?;
    Ok(settings)
}

/// Defaults overlaid with the `TETHER_*` environment variables.
///
/// # Errors
/// Returns `TetherError::Config` for unparsable values or invalid settings.
pub fn load_from_env() -> Result<TetherSettings> {
    let mut settings = TetherSettings::default();
    apply_overrides(&mut settings.resilience, |key| std::env::var(key).ok())?;
    settings.validate()?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(settings)
}

/// Load settings from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected by
/// file extension (`.toml` or `.json`).
///
/// # Errors
/// Returns `TetherError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or unsupported
/// - The settings fail validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<TetherSettings> {
    let config_path = match path {
        Some(p) => p,
        None => probe_config_paths().ok_or_else(|| {
            TetherError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    let settings = read_file(&config_path)?;
    settings.validate()?;
    Ok(settings)
}

fn read_file(path: &Path) -> Result<TetherSettings> {
    if !path.exists() {
        return Err(TetherError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| TetherError::Config(format!("Failed to read config file: {}", e)))?;

    parse_settings(&contents, path)
}

/// Parse settings from string content, format chosen by `path`'s extension.
fn parse_settings(contents: &str, path: &Path) -> Result<TetherSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TetherError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TetherError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(TetherError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.is_file())
}

/// Apply `TETHER_*` overrides resolved through `lookup`.
fn apply_overrides(
    config: &mut ResilienceConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = parse_var(&lookup, "TETHER_MAX_RETRIES")? {
        config.max_retries = v;
    }
    if let Some(v) = parse_var(&lookup, "TETHER_RETRY_DELAY_MS")? {
        config.retry_delay_ms = v;
    }
    if let Some(v) = bool_var(&lookup, "TETHER_EXPONENTIAL_BACKOFF")? {
        config.exponential_backoff = v;
    }
    if let Some(v) = parse_var(&lookup, "TETHER_MAX_RETRY_DELAY_MS")? {
        config.max_retry_delay_ms = v;
    }
    if let Some(v) = bool_var(&lookup, "TETHER_ENABLE_OFFLINE_MODE")? {
        config.enable_offline_mode = v;
    }
    if let Some(v) = bool_var(&lookup, "TETHER_ENABLE_CACHING")? {
        config.enable_caching = v;
    }
    if let Some(v) = parse_var(&lookup, "TETHER_CACHE_TTL_MS")? {
        config.cache_ttl_ms = v;
    }
    if let Some(v) = parse_var(&lookup, "TETHER_CACHE_SWEEP_INTERVAL_MS")? {
        config.cache_sweep_interval_ms = v;
    }
    if let Some(v) = bool_var(&lookup, "TETHER_ENABLE_FALLBACK_DATA")? {
        config.enable_fallback_data = v;
    }
    if let Some(v) = parse_var(&lookup, "TETHER_OFFLINE_QUEUE_CAPACITY")? {
        config.offline_queue_capacity = v;
    }
    if let Some(v) = lookup("TETHER_STORAGE_KEY") {
        config.storage_key = v;
    }
    Ok(())
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| TetherError::Config(format!("Invalid value for {}: {}", key, e)))
        })
        .transpose()
}

/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn bool_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    lookup(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(TetherError::Config(format!("Invalid boolean for {}: {}", key, other))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::Builder;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_bool_parsing() {
        let lookup = lookup_from(&[("A", "YES"), ("B", "off"), ("C", "maybe")]);
        assert_eq!(bool_var(&lookup, "A").unwrap(), Some(true));
        assert_eq!(bool_var(&lookup, "B").unwrap(), Some(false));
        assert!(bool_var(&lookup, "C").is_err());
        assert_eq!(bool_var(&lookup, "MISSING").unwrap(), None);
    }

    #[test]
    fn test_overrides_apply_on_top_of_defaults() {
        let mut config = ResilienceConfig::default();
        let lookup = lookup_from(&[
            ("TETHER_MAX_RETRIES", "5"),
            ("TETHER_RETRY_DELAY_MS", " 250 "),
            ("TETHER_EXPONENTIAL_BACKOFF", "false"),
            ("TETHER_STORAGE_KEY", "app.cache"),
        ]);
        apply_overrides(&mut config, lookup).unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_ms, 250);
        assert!(!config.exponential_backoff);
        assert_eq!(config.storage_key, "app.cache");
        assert_eq!(config.cache_ttl_ms, ResilienceConfig::default().cache_ttl_ms);
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let mut config = ResilienceConfig::default();
        let err = apply_overrides(&mut config, lookup_from(&[("TETHER_CACHE_TTL_MS", "soon")]))
            .unwrap_err();
        match err {
            TetherError::Config(msg) => assert!(msg.contains("TETHER_CACHE_TTL_MS")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_toml_with_fallback_rules() {
        let contents = r#"
            [resilience]
            max_retries = 2
            cache_ttl_ms = 1000

            [[fallback]]
            pattern = "/api/articles"
            payload = { articles = [], total = 0 }

            [[fallback]]
            pattern = "profile"
            match = "substring"
            payload = { name = "guest" }
        "#;
        let settings = parse_settings(contents, Path::new("tether.toml")).unwrap();

        assert_eq!(settings.resilience.max_retries, 2);
        assert_eq!(settings.resilience.cache_ttl_ms, 1000);
        assert_eq!(settings.resilience.retry_delay_ms, 1000);
        assert_eq!(settings.fallback.len(), 2);
        assert!(settings.fallback.lookup("/api/articles?page=2").is_some());
        assert!(settings.fallback.lookup("/api/user/profile").is_some());
    }

    #[test]
    fn test_parse_json() {
        let contents = r#"{"resilience": {"enable_caching": false}}"#;
        let settings = parse_settings(contents, Path::new("tether.json")).unwrap();
        assert!(!settings.resilience.enable_caching);
        assert!(settings.fallback.is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_settings("", Path::new("tether.yaml")).unwrap_err();
        assert!(matches!(err, TetherError::Config(_)));
    }

    #[test]
    fn test_load_from_file_validates() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[resilience]\nretry_delay_ms = 0").unwrap();

        let err = load_from_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, TetherError::Config(_)));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/tether.toml"))).unwrap_err();
        match err {
            TetherError::Config(msg) => assert!(msg.contains("not found")),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
