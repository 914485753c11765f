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

//! ACPI device discovery and method evaluation through the `acpi_call`
//! kernel module.
//!
//! A call is a write of `"<path>.<METHOD> 0x<a> 0x<b>"` to the control file
//! followed by a read of the reply from the same file.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::constants::acpi::DEVICE_IDS;
use crate::error::{DasharoError, Result};
use crate::firmware::MethodEvaluator;

/// Device present bit of `_STA`
const STA_PRESENT: u64 = 0x1;

/// An ACPI device as enumerated under `/sys/bus/acpi/devices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcpiDevice {
    /// Kernel device name, e.g. `DSHR0001:00`
    pub name: String,
    pub hid: String,
    /// ACPI namespace path, e.g. `\_SB_.DSHR`
    pub path: String,
    /// `_STA` value when the kernel exposes one
    pub status: Option<u64>,
}

impl AcpiDevice {
    pub fn is_present(&self) -> bool {
        self.status.map_or(true, |sta| sta & STA_PRESENT != 0)
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim_matches(|c: char| c.is_whitespace() || c == '\0').to_string())
        .filter(|s| !s.is_empty())
}

fn parse_status(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Present devices whose hardware id is one the driver binds to, sorted by name
pub fn discover_devices(root: &Path) -> Result<Vec<AcpiDevice>> {
    let entries = fs::read_dir(root).map_err(|source| DasharoError::FileRead {
        path: root.to_path_buf(),
        source,
    })?;

    let mut devices = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some((hid, _instance)) = name.split_once(':') else {
            continue;
        };
        if !DEVICE_IDS.contains(&hid) {
            continue;
        }

        let dir = entry.path();
        let Some(path) = read_trimmed(&dir.join("path")) else {
            debug!(device = %name, "ACPI device has no namespace path, skipping");
            continue;
        };
        let status = read_trimmed(&dir.join("status")).and_then(|s| parse_status(&s));

        let device = AcpiDevice {
            hid: hid.to_string(),
            name,
            path,
            status,
        };
        if !device.is_present() {
            debug!(device = %device.name, status = ?device.status, "ACPI device not present, skipping");
            continue;
        }
        devices.push(device);
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}

/// Parse an `acpi_call` reply into an integer
pub fn parse_response(method: &str, reply: &str) -> Result<u64> {
    let reply = reply.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    if let Some(hex) = reply.strip_prefix("0x").or_else(|| reply.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map_err(|_| DasharoError::firmware(method, format!("unparsable reply '{}'", reply)));
    }
    if let Some(err) = reply.strip_prefix("Error:") {
        let err = err.trim();
        if err.contains("AE_NOT_FOUND") {
            return Err(DasharoError::MethodNotSupported(method.to_string()));
        }
        return Err(DasharoError::firmware(method, err));
    }
    if reply == "not called" {
        return Err(DasharoError::firmware(method, "call was not executed"));
    }
    Err(DasharoError::firmware(method, format!("unexpected reply '{}'", reply)))
}

/// [`MethodEvaluator`] backed by the `acpi_call` control file
pub struct AcpiCallEvaluator {
    call_path: PathBuf,
    device_path: String,
    // The reply belongs to whoever wrote last
    lock: Mutex<()>,
}

impl AcpiCallEvaluator {
    pub fn new(call_path: impl Into<PathBuf>, device_path: impl Into<String>) -> Result<Self> {
        let call_path = call_path.into();
        if !call_path.exists() {
            return Err(DasharoError::TransportUnavailable(format!(
                "{} does not exist (is the acpi_call module loaded?)",
                call_path.display()
            )));
        }
        Ok(Self {
            call_path,
            device_path: device_path.into(),
            lock: Mutex::new(()),
        })
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Command line written to the control file
    pub fn command(&self, method: &str, args: &[u64]) -> String {
        let mut cmd = format!("{}.{}", self.device_path, method);
        for arg in args {
            cmd.push_str(&format!(" {:#x}", arg));
        }
        cmd
    }
}

impl MethodEvaluator for AcpiCallEvaluator {
    fn evaluate_integer(&self, method: &str, args: &[u64]) -> Result<u64> {
        let cmd = self.command(method, args);
        let _guard = self.lock.lock();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.call_path)
            .map_err(|source| DasharoError::FileWrite {
                path: self.call_path.clone(),
                source,
            })?;
        file.write_all(cmd.as_bytes())?;

        // The module hands the reply to the next read of the file
        let mut reply = String::new();
        OpenOptions::new()
            .read(true)
            .open(&self.call_path)
            .and_then(|mut f| f.read_to_string(&mut reply))
            .map_err(|source| DasharoError::FileRead {
                path: self.call_path.clone(),
                source,
            })?;

        trace!(command = %cmd, reply = %reply.trim_end_matches('\0').trim(), "acpi_call");
        parse_response(method, &reply)
    }
}
