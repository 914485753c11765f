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

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::constants::paths::{EVENT_LOG, EVENT_LOG_FALLBACK};

lazy_static! {
    static ref LOG_FILE: Mutex<Option<(PathBuf, File)>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Filter directive to use: an explicit level, else `RUST_LOG`, else the
/// configured level
pub fn filter_directive(explicit: Option<&str>, env: Option<&str>, configured: &str) -> String {
    explicit
        .or(env.filter(|e| !e.trim().is_empty()))
        .unwrap_or(configured)
        .to_string()
}

/// Console diagnostics through `tracing`
pub fn init_tracing(explicit: Option<&str>, configured: &str) {
    let env = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(explicit, env.as_deref(), configured);
    let filter = tracing_subscriber::EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(configured));
    // A subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// Open the event log at `path` for appending
pub fn init_logging_at(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let f = OpenOptions::new().create(true).append(true).open(path)?;
    *LOG_FILE.lock() = Some((path.to_path_buf(), f));
    Ok(())
}

/// Open the default event log, falling back to /tmp. Returns the path in use.
pub fn init_logging() -> Option<PathBuf> {
    for candidate in [EVENT_LOG, EVENT_LOG_FALLBACK] {
        let path = Path::new(candidate);
        if init_logging_at(path).is_ok() {
            return Some(path.to_path_buf());
        }
    }
    None
}

/// Close the event log; later events are dropped
pub fn shutdown_logging() {
    *LOG_FILE.lock() = None;
}

pub fn log_path() -> Option<PathBuf> {
    LOG_FILE.lock().as_ref().map(|(path, _)| path.clone())
}

/// Append one JSON line if the event log is open
pub fn log_event(event: &str, data: Value) {
    let line = json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    })
    .to_string();

    if let Some((_, f)) = LOG_FILE.lock().as_mut() {
        let _ = writeln!(f, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_log_event_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("events.json");
        init_logging_at(&path).unwrap();
        assert_eq!(log_path().as_deref(), Some(path.as_path()));

        log_event("attach", json!({ "device": "logger-test" }));
        log_event("detach", json!({ "device": "logger-test" }));
        shutdown_logging();

        // Other tests in this process may log concurrently
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap())
            .filter(|v| v["data"]["device"] == "logger-test")
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "attach");
        assert_eq!(lines[1]["event"], "detach");
        assert!(lines[1]["ts_ms"].as_u64().is_some());
    }

    #[test]
    fn test_filter_directive_order() {
        assert_eq!(filter_directive(Some("debug"), Some("trace"), "warn"), "debug");
        assert_eq!(filter_directive(None, Some("dasharo_sensors=trace"), "warn"), "dasharo_sensors=trace");
        assert_eq!(filter_directive(None, None, "warn"), "warn");
        assert_eq!(filter_directive(None, Some("  "), "error"), "error");
    }

    #[test]
    #[serial]
    fn test_log_event_without_init_is_dropped() {
        shutdown_logging();
        log_event("read_error", json!({}));
        assert!(log_path().is_none());
    }
}
