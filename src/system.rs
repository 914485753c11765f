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

use std::fs;
use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

const DMI_ROOT: &str = "/sys/devices/virtual/dmi/id";

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

fn read_dmi(root: &Path, field: &str) -> Option<String> {
    fs::read_to_string(root.join(field))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Board vendor and name from DMI, e.g. "Notebook NV4xPZ"
pub fn read_mb_name() -> String {
    read_mb_name_from(Path::new(DMI_ROOT))
}

pub fn read_mb_name_from(root: &Path) -> String {
    let vendor = read_dmi(root, "board_vendor");
    let name = read_dmi(root, "board_name");
    match (vendor, name) {
        (Some(v), Some(n)) => format!("{} {}", v, n),
        (Some(v), None) => v,
        (None, Some(n)) => n,
        (None, None) => read_dmi(root, "product_name").unwrap_or_default(),
    }
}

/// Whether the BIOS vendor string says Dasharo
pub fn is_dasharo_firmware() -> bool {
    read_dmi(Path::new(DMI_ROOT), "bios_version")
        .into_iter()
        .chain(read_dmi(Path::new(DMI_ROOT), "bios_vendor"))
        .any(|s| s.to_ascii_lowercase().contains("dasharo"))
}

/// Load acpi_call if its control file is missing. Returns whether it is
/// available afterwards.
pub fn ensure_acpi_call_module(call_path: &Path) -> bool {
    if call_path.exists() {
        return true;
    }
    match Command::new("modprobe").args(["-q", "acpi_call"]).output() {
        Ok(out) if out.status.success() => debug!("Loaded acpi_call module"),
        Ok(out) => warn!(status = ?out.status.code(), "modprobe acpi_call failed"),
        Err(e) => warn!(error = %e, "Could not run modprobe"),
    }
    call_path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_mb_name_vendor_and_board() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("board_vendor"), "Notebook\n").unwrap();
        fs::write(dir.path().join("board_name"), "NV4xPZ\n").unwrap();
        assert_eq!(read_mb_name_from(dir.path()), "Notebook NV4xPZ");
    }

    #[test]
    fn test_read_mb_name_falls_back_to_product() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("product_name"), "MS-7D25\n").unwrap();
        assert_eq!(read_mb_name_from(dir.path()), "MS-7D25");
    }

    #[test]
    fn test_read_mb_name_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("board_vendor"), "  \n").unwrap();
        assert_eq!(read_mb_name_from(dir.path()), "");
    }

    #[test]
    fn test_ensure_acpi_call_existing_file() {
        let dir = TempDir::new().unwrap();
        let call = dir.path().join("call");
        fs::write(&call, "").unwrap();
        assert!(ensure_acpi_call_module(&call));
    }
}
