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

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

use dasharo_sensors::acpi_call::discover_devices;
use dasharo_sensors::config::{load_config, validate_config, validate_log_level, Backend, Config};
use dasharo_sensors::constants::paths::PROFILES_DIR;
use dasharo_sensors::driver::{open_firmware, Binding, DasharoDriver};
use dasharo_sensors::hwmon::{attribute_name, HwmonDevice, CHANNEL_INFO};
use dasharo_sensors::{logger, profile, system, Attribute, DasharoError, SensorType};

use cli::{Cli, Commands};

/// Device name used when answering from a profile
const PROFILE_DEVICE: &str = "profile";

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(path) = &cli.profile {
        config.backend = Backend::Profile;
        config.profile_path = Some(path.clone());
    }
    validate_config(&config).context("invalid configuration")?;
    if let Some(level) = &cli.log_level {
        validate_log_level(level).context("invalid --log-level")?;
    }

    logger::init_tracing(cli.log_level.as_deref(), &config.log_level);
    if cli.logging {
        match logger::init_logging() {
            Some(path) => info!(path = %path.display(), "Event log enabled"),
            None => warn!("Event log could not be opened"),
        }
        logger::log_event(
            "startup",
            json!({ "args": std::env::args().collect::<Vec<_>>(), "backend": config.backend }),
        );
    }

    if let Commands::Devices = cli.command {
        return list_devices(&config);
    }

    let driver = DasharoDriver::new();
    attach_all(&config, &driver)?;

    let result = match cli.command {
        Commands::Devices => Ok(()),
        Commands::List => list_channels(&driver),
        Commands::Read { attribute, device } => read_one(&driver, &attribute, device.as_deref()),
        Commands::Watch { interval, count } => {
            let interval = interval.map(Duration::from_millis).unwrap_or_else(|| config.poll_interval());
            watch(&driver, interval, count)
        }
        Commands::DumpProfile { output } => dump(&driver, output),
    };

    for name in driver.bound() {
        driver.remove(&name);
    }
    result
}

fn require_root() -> anyhow::Result<()> {
    if !system::is_root() {
        bail!(
            "acpi_call requires root privileges.\nPlease run with: sudo {}",
            std::env::args().next().unwrap_or_else(|| "dasharo-sensors".to_string())
        );
    }
    Ok(())
}

fn list_devices(config: &Config) -> anyhow::Result<()> {
    let devices = discover_devices(&config.sysfs_acpi_root)
        .with_context(|| format!("failed to scan {}", config.sysfs_acpi_root.display()))?;

    let board = system::read_mb_name();
    if !board.is_empty() {
        println!("Board: {}", board);
    }
    if !system::is_dasharo_firmware() {
        println!("Note: firmware does not identify as Dasharo");
    }
    if devices.is_empty() {
        println!("No Dasharo ACPI devices found");
        return Ok(());
    }
    for d in devices {
        let status = d.status.map(|s| format!("{:#x}", s)).unwrap_or_else(|| "-".to_string());
        println!("{:<14} {:<10} {:<28} status {}", d.name, d.hid, d.path, status);
    }
    Ok(())
}

fn attach_all(config: &Config, driver: &DasharoDriver) -> anyhow::Result<()> {
    match config.backend {
        Backend::Profile => {
            let firmware = open_firmware(config, None).context("failed to open firmware profile")?;
            driver.add(PROFILE_DEVICE, firmware);
        }
        Backend::AcpiCall => {
            require_root()?;
            if !system::ensure_acpi_call_module(&config.acpi_call_path) {
                return Err(DasharoError::TransportUnavailable(config.acpi_call_path.display().to_string()))
                    .context("acpi_call module is not available");
            }
            let devices = discover_devices(&config.sysfs_acpi_root)?;
            if devices.is_empty() {
                bail!(DasharoError::DeviceNotFound(config.sysfs_acpi_root.display().to_string()));
            }
            for acpi in &devices {
                driver
                    .add_acpi_device(config, acpi)
                    .with_context(|| format!("failed to attach {}", acpi.name))?;
            }
        }
    }
    Ok(())
}

fn select(driver: &DasharoDriver, name: Option<&str>) -> anyhow::Result<Binding> {
    let name = match name {
        Some(n) => n.to_string(),
        None => driver
            .bound()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no device attached"))?,
    };
    driver.binding(&name).ok_or_else(|| anyhow!("device {} is not attached", name))
}

/// Human form of an input reading
fn format_reading(sensor_type: SensorType, value: i64) -> String {
    match sensor_type {
        SensorType::Temp => format!("{:.1} °C", value as f64 / 1000.0),
        SensorType::Fan => format!("{} RPM", value),
        SensorType::Pwm => format!("{}", value),
    }
}

fn channel_lines(hwmon: &HwmonDevice) -> Vec<String> {
    let ops = hwmon.ops();
    let mut lines = Vec::new();
    for info in CHANNEL_INFO.iter() {
        for channel in 0..info.channels {
            let ch = channel as i64;
            if ops.is_visible(info.sensor_type, Attribute::Input, ch) == 0 {
                continue;
            }
            let name = attribute_name(info.sensor_type, Attribute::Input, channel);
            let label = ops
                .read_string(info.sensor_type, Attribute::Label, ch)
                .map(str::to_string)
                .unwrap_or_default();
            let value = match ops.read(info.sensor_type, Attribute::Input, ch) {
                Ok(v) => format_reading(info.sensor_type, v),
                Err(e) => {
                    logger::log_event(
                        "read_error",
                        json!({ "hwmon": hwmon.class_name(), "attribute": name, "error": e.to_string() }),
                    );
                    "unavailable".to_string()
                }
            };
            lines.push(format!("  {:<14} {:<16} {}", name, label, value));
        }
    }
    lines
}

fn list_channels(driver: &DasharoDriver) -> anyhow::Result<()> {
    for name in driver.bound() {
        let Some(binding) = driver.binding(&name) else { continue };
        println!("{} ({}, {})", binding.hwmon.class_name(), binding.hwmon.name(), name);
        let lines = channel_lines(&binding.hwmon);
        if lines.is_empty() {
            println!("  no sensors reported by firmware");
        }
        for line in lines {
            println!("{}", line);
        }
    }
    Ok(())
}

fn read_one(driver: &DasharoDriver, attribute: &str, device: Option<&str>) -> anyhow::Result<()> {
    let binding = select(driver, device)?;
    let value = binding
        .hwmon
        .read_attribute(attribute)
        .with_context(|| format!("failed to read {}", attribute))?;
    println!("{}", value);
    Ok(())
}

fn watch(driver: &DasharoDriver, interval: Duration, count: Option<u64>) -> anyhow::Result<()> {
    let bindings: Vec<Arc<HwmonDevice>> = driver.registry().list();
    let mut round = 0u64;
    loop {
        for hwmon in &bindings {
            println!("{}", hwmon.class_name());
            for line in channel_lines(hwmon) {
                println!("{}", line);
            }
        }
        round += 1;
        if count.is_some_and(|c| round >= c) {
            return Ok(());
        }
        println!();
        thread::sleep(interval);
    }
}

fn dump(driver: &DasharoDriver, output: Option<PathBuf>) -> anyhow::Result<()> {
    let binding = select(driver, None)?;
    let dir = output.unwrap_or_else(|| Path::new(PROFILES_DIR).to_path_buf());
    let board = system::read_mb_name();
    let path = profile::dump_profile(&binding.device, &board, &dir)
        .with_context(|| format!("failed to write profile to {}", dir.display()))?;
    println!("Firmware profile written to {}", path.display());
    Ok(())
}
