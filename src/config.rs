/*
 * This file is part of dasharo-sensors.
 *
 * Copyright (C) 2025 dasharo-sensors contributors
 *
 * dasharo-sensors is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * dasharo-sensors is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with dasharo-sensors. If not, see <https://www.gnu.org/licenses/>.
 */

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::paths::{ACPI_CALL, CONFIG_DIR, CONFIG_FILE, SYSFS_ACPI_DEVICES};
use crate::constants::polling::{DEFAULT_INTERVAL_MS, MAX_INTERVAL_MS, MAX_QUERY_TIMEOUT_MS, MIN_INTERVAL_MS};
use crate::error::{DasharoError, Result};

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Where firmware answers come from
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Live firmware through the acpi_call kernel module
    #[default]
    AcpiCall,
    /// Recorded JSON profile
    Profile,
}

fn default_acpi_call_path() -> PathBuf { PathBuf::from(ACPI_CALL) }
fn default_sysfs_acpi_root() -> PathBuf { PathBuf::from(SYSFS_ACPI_DEVICES) }
fn default_poll_interval_ms() -> u64 { DEFAULT_INTERVAL_MS }
fn default_log_level() -> String { "info".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_acpi_call_path")]
    pub acpi_call_path: PathBuf,
    #[serde(default = "default_sysfs_acpi_root")]
    pub sysfs_acpi_root: PathBuf,
    /// Required with the profile backend
    #[serde(default)]
    pub profile_path: Option<PathBuf>,
    /// Per-query deadline; unset means a query may block indefinitely
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            acpi_call_path: default_acpi_call_path(),
            sysfs_acpi_root: default_sysfs_acpi_root(),
            profile_path: None,
            query_timeout_ms: None,
            poll_interval_ms: default_poll_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("dasharo-sensors").join(CONFIG_FILE);
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home)
            .join(".config")
            .join("dasharo-sensors")
            .join(CONFIG_FILE);
    }
    system_config_path()
}

pub fn system_config_path() -> PathBuf { Path::new(CONFIG_DIR).join(CONFIG_FILE) }

/// Load from `explicit`, else the first existing of the user and system
/// paths. With no explicit path and no file, defaults are used.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match [config_path(), system_config_path()].into_iter().find(|p| p.exists()) {
            Some(p) => p,
            None => {
                debug!("No configuration file found, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let data = fs::read_to_string(&path).map_err(|source| DasharoError::FileRead {
        path: path.clone(),
        source,
    })?;
    let cfg: Config = serde_json::from_str(&data)
        .map_err(|e| DasharoError::Config(format!("{}: {}", path.display(), e)))?;
    validate_config(&cfg)?;
    debug!(path = %path.display(), backend = ?cfg.backend, "Loaded configuration");
    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.acpi_call_path.as_os_str().is_empty() {
        return Err(DasharoError::invalid_config("acpi_call_path", "must not be empty"));
    }
    if cfg.sysfs_acpi_root.as_os_str().is_empty() {
        return Err(DasharoError::invalid_config("sysfs_acpi_root", "must not be empty"));
    }
    match (&cfg.backend, &cfg.profile_path) {
        (Backend::Profile, None) => {
            return Err(DasharoError::invalid_config("profile_path", "required with the profile backend"));
        }
        (_, Some(p)) if p.as_os_str().is_empty() => {
            return Err(DasharoError::invalid_config("profile_path", "must not be empty"));
        }
        _ => {}
    }
    if let Some(ms) = cfg.query_timeout_ms {
        if ms == 0 || ms > MAX_QUERY_TIMEOUT_MS {
            return Err(DasharoError::invalid_config(
                "query_timeout_ms",
                format!("out of range (1..{})", MAX_QUERY_TIMEOUT_MS),
            ));
        }
    }
    if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&cfg.poll_interval_ms) {
        return Err(DasharoError::invalid_config(
            "poll_interval_ms",
            format!("out of range ({}..{})", MIN_INTERVAL_MS, MAX_INTERVAL_MS),
        ));
    }
    validate_log_level(&cfg.log_level)
}

pub fn validate_log_level(level: &str) -> Result<()> {
    if !LOG_LEVELS.contains(&level) {
        return Err(DasharoError::invalid_config(
            "log_level",
            format!("expected one of {}", LOG_LEVELS.join(", ")),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(json: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_backend_serialization() {
        assert_eq!(serde_json::to_string(&Backend::AcpiCall).unwrap(), "\"acpi_call\"");
        assert_eq!(serde_json::from_str::<Backend>("\"profile\"").unwrap(), Backend::Profile);
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.backend, Backend::AcpiCall);
        assert_eq!(cfg.acpi_call_path, PathBuf::from("/proc/acpi/call"));
        assert_eq!(cfg.query_timeout(), None);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(2));
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn test_empty_object_is_default() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let f = write_config(r#"{ "backend": "acpi_call", "fan_curve": [] }"#);
        assert!(matches!(load_config(Some(f.path())), Err(DasharoError::Config(_))));
    }

    #[test]
    fn test_load_explicit_path() {
        let f = write_config(r#"{ "backend": "profile", "profile_path": "/tmp/board.json", "query_timeout_ms": 500 }"#);
        let cfg = load_config(Some(f.path())).unwrap();
        assert_eq!(cfg.backend, Backend::Profile);
        assert_eq!(cfg.profile_path, Some(PathBuf::from("/tmp/board.json")));
        assert_eq!(cfg.query_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_load_explicit_missing_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("config.json"))).unwrap_err();
        assert!(matches!(err, DasharoError::FileRead { .. }));
    }

    #[test]
    fn test_validate_profile_backend_requires_path() {
        let cfg = Config { backend: Backend::Profile, ..Default::default() };
        assert!(matches!(
            validate_config(&cfg),
            Err(DasharoError::InvalidConfig { ref field, .. }) if field == "profile_path"
        ));
    }

    #[test]
    fn test_validate_ranges() {
        let cfg = Config { query_timeout_ms: Some(0), ..Default::default() };
        assert!(validate_config(&cfg).is_err());
        let cfg = Config { query_timeout_ms: Some(MAX_QUERY_TIMEOUT_MS + 1), ..Default::default() };
        assert!(validate_config(&cfg).is_err());
        let cfg = Config { poll_interval_ms: 10, ..Default::default() };
        assert!(validate_config(&cfg).is_err());
        let cfg = Config { log_level: "verbose".to_string(), ..Default::default() };
        assert!(validate_config(&cfg).is_err());
        let cfg = Config { acpi_call_path: PathBuf::new(), ..Default::default() };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    #[serial]
    fn test_config_path_with_xdg() {
        let saved = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", "/custom/config");
        assert_eq!(config_path(), PathBuf::from("/custom/config/dasharo-sensors/config.json"));
        match saved {
            Some(v) => env::set_var("XDG_CONFIG_HOME", v),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    #[test]
    #[serial]
    fn test_config_path_with_home() {
        let saved_xdg = env::var("XDG_CONFIG_HOME").ok();
        let saved_home = env::var("HOME").ok();
        env::remove_var("XDG_CONFIG_HOME");
        env::set_var("HOME", "/home/testuser");
        assert_eq!(config_path(), PathBuf::from("/home/testuser/.config/dasharo-sensors/config.json"));
        if let Some(v) = saved_xdg {
            env::set_var("XDG_CONFIG_HOME", v);
        }
        match saved_home {
            Some(v) => env::set_var("HOME", v),
            None => env::remove_var("HOME"),
        }
    }

    #[test]
    fn test_system_config_path() {
        assert_eq!(system_config_path(), PathBuf::from("/etc/dasharo-sensors/config.json"));
    }
}
