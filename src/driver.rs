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

//! Device lifecycle
//!
//! [`DasharoDriver::add`] discovers the capabilities of a device and
//! registers its sensor surface; [`DasharoDriver::remove`] tears both down.
//! Adding a device that is already bound replaces the old binding and starts
//! a new generation, so channel numbers from before are meaningless.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tracing::{info, warn};

use crate::acpi_call::{AcpiCallEvaluator, AcpiDevice};
use crate::config::{Backend, Config};
use crate::constants::acpi::DEVICE_IDS;
use crate::constants::hwmon::DRIVER_NAME;
use crate::device::DasharoDevice;
use crate::error::{DasharoError, Result};
use crate::feature::Feature;
use crate::firmware::{FirmwareQuery, MethodEvaluator, MethodFirmware, TimedEvaluator};
use crate::hwmon::{HwmonDevice, HwmonRegistry};
use crate::logger::log_event;
use crate::profile::ProfileEvaluator;

/// Build the firmware handle the config asks for.
///
/// The acpi_call backend needs the ACPI device whose methods are evaluated;
/// the profile backend ignores it.
pub fn open_firmware(config: &Config, device: Option<&AcpiDevice>) -> Result<Arc<dyn FirmwareQuery>> {
    let evaluator: Box<dyn MethodEvaluator> = match config.backend {
        Backend::AcpiCall => {
            let device = device.ok_or_else(|| DasharoError::DeviceNotFound(DEVICE_IDS.join(", ")))?;
            Box::new(AcpiCallEvaluator::new(&config.acpi_call_path, device.path.as_str())?)
        }
        Backend::Profile => {
            let path = config
                .profile_path
                .as_deref()
                .ok_or_else(|| DasharoError::invalid_config("profile_path", "required with the profile backend"))?;
            Box::new(ProfileEvaluator::from_file(path)?)
        }
    };

    let evaluator: Box<dyn MethodEvaluator> = match config.query_timeout() {
        Some(timeout) => Box::new(TimedEvaluator::new(evaluator, timeout)),
        None => evaluator,
    };
    Ok(Arc::new(MethodFirmware::new(evaluator)))
}

/// A bound device and the surface registered for it
#[derive(Clone)]
pub struct Binding {
    pub generation: u64,
    pub device: Arc<DasharoDevice>,
    pub hwmon: Arc<HwmonDevice>,
}

#[derive(Default)]
pub struct DasharoDriver {
    registry: HwmonRegistry,
    bindings: Mutex<BTreeMap<String, Binding>>,
    generation: AtomicU64,
}

impl DasharoDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the driver binds to this hardware id
    pub fn matches(hid: &str) -> bool {
        DEVICE_IDS.contains(&hid)
    }

    pub fn registry(&self) -> &HwmonRegistry {
        &self.registry
    }

    /// Discover capabilities and register the surface under `name`
    pub fn add(&self, name: &str, firmware: Arc<dyn FirmwareQuery>) -> Arc<HwmonDevice> {
        // Build before registering so no reader ever sees a partial table
        let device = Arc::new(DasharoDevice::attach(firmware));
        let hwmon = self.registry.register(DRIVER_NAME, device.clone());
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let previous = self.bindings.lock().insert(
            name.to_string(),
            Binding {
                generation,
                device: Arc::clone(&device),
                hwmon: Arc::clone(&hwmon),
            },
        );
        if let Some(old) = previous {
            warn!(device = name, old_generation = old.generation, "Device re-attached, replacing binding");
            self.registry.unregister(old.hwmon.id());
        }

        info!(device = name, generation, hwmon = %hwmon.class_name(), "Device attached");
        log_event(
            "attach",
            json!({
                "device": name,
                "generation": generation,
                "hwmon": hwmon.class_name(),
                "temperature": device.count(Feature::Temperature),
                "fan_pwm": device.count(Feature::FanPwm),
                "fan_tach": device.count(Feature::FanTach),
            }),
        );
        hwmon
    }

    /// Open the configured transport for `acpi` and add it
    pub fn add_acpi_device(&self, config: &Config, acpi: &AcpiDevice) -> Result<Arc<HwmonDevice>> {
        if !Self::matches(&acpi.hid) {
            return Err(DasharoError::DeviceNotFound(acpi.name.clone()));
        }
        let firmware = open_firmware(config, Some(acpi))?;
        Ok(self.add(&acpi.name, firmware))
    }

    /// Unregister the surface and drop the device. Returns false if nothing
    /// was bound under `name`.
    pub fn remove(&self, name: &str) -> bool {
        let Some(binding) = self.bindings.lock().remove(name) else {
            return false;
        };
        self.registry.unregister(binding.hwmon.id());

        info!(device = name, generation = binding.generation, "Device detached");
        log_event(
            "detach",
            json!({ "device": name, "generation": binding.generation }),
        );
        true
    }

    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.bindings.lock().get(name).cloned()
    }

    pub fn device(&self, name: &str) -> Option<Arc<DasharoDevice>> {
        self.binding(name).map(|b| b.device)
    }

    pub fn generation(&self, name: &str) -> Option<u64> {
        self.binding(name).map(|b| b.generation)
    }

    /// Bound device names in order
    pub fn bound(&self) -> Vec<String> {
        self.bindings.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::MockFirmwareQuery;
    use std::path::PathBuf;

    fn firmware(temps: i64) -> Arc<dyn FirmwareQuery> {
        let mut fw = MockFirmwareQuery::new();
        fw.expect_capability_count()
            .returning(move |feature, group| Ok(if feature == Feature::Temperature && group == 0 { temps } else { 0 }));
        fw.expect_temperature().returning(|_, _| Ok(50));
        Arc::new(fw)
    }

    #[test]
    fn test_matches() {
        assert!(DasharoDriver::matches("DSHR0001"));
        assert!(!DasharoDriver::matches("PNP0C09"));
    }

    #[test]
    fn test_add_registers_surface() {
        let driver = DasharoDriver::new();
        let hwmon = driver.add("DSHR0001:00", firmware(2));

        assert_eq!(hwmon.name(), "dasharo_acpi");
        assert_eq!(driver.registry().len(), 1);
        assert_eq!(driver.device("DSHR0001:00").unwrap().count(Feature::Temperature), 2);
        assert_eq!(hwmon.read_attribute("temp2_input").unwrap(), "50000");
        assert_eq!(driver.bound(), vec!["DSHR0001:00".to_string()]);
    }

    #[test]
    fn test_readd_replaces_binding_with_new_generation() {
        let driver = DasharoDriver::new();
        let first = driver.add("DSHR0001:00", firmware(3));
        let first_gen = driver.generation("DSHR0001:00").unwrap();

        let second = driver.add("DSHR0001:00", firmware(1));
        let second_gen = driver.generation("DSHR0001:00").unwrap();

        assert!(second_gen > first_gen);
        assert_eq!(driver.registry().len(), 1);
        assert!(driver.registry().get(first.id()).is_none());
        assert!(driver.registry().get(second.id()).is_some());
        assert_eq!(driver.device("DSHR0001:00").unwrap().count(Feature::Temperature), 1);
    }

    #[test]
    fn test_remove() {
        let driver = DasharoDriver::new();
        driver.add("DSHR0001:00", firmware(1));

        assert!(driver.remove("DSHR0001:00"));
        assert!(driver.registry().is_empty());
        assert!(driver.device("DSHR0001:00").is_none());
        assert!(!driver.remove("DSHR0001:00"));
    }

    #[test]
    fn test_open_firmware_acpi_call_requires_device() {
        let cfg = Config::default();
        assert!(matches!(open_firmware(&cfg, None), Err(DasharoError::DeviceNotFound(_))));
    }

    #[test]
    fn test_open_firmware_acpi_call_missing_module() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = Config {
            acpi_call_path: dir.path().join("call"),
            ..Default::default()
        };
        let acpi = AcpiDevice {
            name: "DSHR0001:00".to_string(),
            hid: "DSHR0001".to_string(),
            path: "\\_SB_.DSHR".to_string(),
            status: None,
        };
        let driver = DasharoDriver::new();
        assert!(matches!(
            driver.add_acpi_device(&cfg, &acpi),
            Err(DasharoError::TransportUnavailable(_))
        ));
        assert!(driver.registry().is_empty());
    }

    #[test]
    fn test_open_firmware_profile_with_timeout() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("board.json");
        std::fs::write(&path, r#"{ "fan_tach": [ { "group": 2, "values": [900] } ] }"#).unwrap();

        let cfg = Config {
            backend: Backend::Profile,
            profile_path: Some(path),
            query_timeout_ms: Some(1000),
            ..Default::default()
        };
        let fw = open_firmware(&cfg, None).unwrap();
        assert_eq!(fw.capability_count(Feature::FanTach, 2).unwrap(), 1);
        assert_eq!(fw.fan_tachometer(2, 0).unwrap(), 900);
    }

    #[test]
    fn test_open_firmware_profile_missing_file() {
        let cfg = Config {
            backend: Backend::Profile,
            profile_path: Some(PathBuf::from("/nonexistent/board.json")),
            ..Default::default()
        };
        assert!(matches!(open_firmware(&cfg, None), Err(DasharoError::FileRead { .. })));
    }
}
