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

//! Constants and configuration defaults
//!
//! Table capacities, firmware method names and system paths live here.

/// Capability table limits
pub mod capacity {
    /// Width of each feature's category name table
    pub const MAX_GROUPS_PER_FEATURE: usize = 8;

    /// Hard per-feature capacity of the capability table
    pub const MAX_CAPS_PER_FEATURE: usize = 24;

    /// Label storage including the terminator slot, so labels hold 15 bytes
    pub const MAX_CAP_NAME_LEN: usize = 16;
}

/// ACPI method names evaluated on the Dasharo device
pub mod methods {
    /// Capability count for (feature, group)
    pub const GET_FEATURE_CAP_COUNT: &str = "GFCP";

    /// Temperature in whole degrees Celsius for (group, index)
    pub const GET_TEMPERATURE: &str = "GTMP";

    /// Fan tachometer in RPM for (group, index)
    pub const GET_FAN_TACH: &str = "GFTH";

    /// Fan duty cycle for (group, index)
    pub const GET_FAN_DUTY: &str = "GFDC";
}

/// hwmon surface constants
pub mod hwmon {
    /// Name the sensor surface registers under
    pub const DRIVER_NAME: &str = "dasharo_acpi";

    /// Access mode of a populated channel (read-only)
    pub const MODE_READ_ONLY: u16 = 0o444;

    /// Access mode of a hidden channel
    pub const MODE_HIDDEN: u16 = 0;

    /// Whole degrees to millidegrees
    pub const MILLIDEGREES_PER_DEGREE: i64 = 1000;
}

/// ACPI identification
pub mod acpi {
    /// Hardware id matched by the driver
    pub const DEVICE_HID: &str = "DSHR0001";

    /// All ids the driver binds to
    pub const DEVICE_IDS: &[&str] = &[DEVICE_HID];
}

/// System paths
pub mod paths {
    /// ACPI devices as enumerated by the kernel
    pub const SYSFS_ACPI_DEVICES: &str = "/sys/bus/acpi/devices";

    /// acpi_call kernel module control file
    pub const ACPI_CALL: &str = "/proc/acpi/call";

    /// System-wide configuration directory
    pub const CONFIG_DIR: &str = "/etc/dasharo-sensors";

    /// Configuration file name
    pub const CONFIG_FILE: &str = "config.json";

    /// Directory profile dumps are written to
    pub const PROFILES_DIR: &str = "/etc/dasharo-sensors/profiles";

    /// JSON event log
    pub const EVENT_LOG: &str = "/var/log/dasharo-sensors/events.json";

    /// JSON event log fallback when the primary location is not writable
    pub const EVENT_LOG_FALLBACK: &str = "/tmp/dasharo-sensors-events.json";
}

/// Polling defaults
pub mod polling {
    /// Default front-end poll interval
    pub const DEFAULT_INTERVAL_MS: u64 = 2000;

    /// Lower bound accepted from configuration
    pub const MIN_INTERVAL_MS: u64 = 100;

    /// Upper bound accepted from configuration
    pub const MAX_INTERVAL_MS: u64 = 60_000;

    /// Upper bound for the optional firmware query timeout
    pub const MAX_QUERY_TIMEOUT_MS: u64 = 30_000;
}
