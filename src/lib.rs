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

//! dasharo-sensors - Dasharo firmware sensors for Linux
//!
//! This library discovers the temperature, fan speed and fan duty cycle
//! sensors a Dasharo firmware describes through ACPI, and exposes them
//! through an hwmon-style read-only surface.

pub mod acpi_call;
pub mod capability;
pub mod config;
pub mod constants;
pub mod device;
pub mod driver;
pub mod error;
pub mod feature;
pub mod firmware;
pub mod hwmon;
pub mod logger;
pub mod profile;
pub mod system;

pub use capability::{Capability, CapabilityName, CapabilityTable};
pub use device::DasharoDevice;
pub use driver::DasharoDriver;
pub use error::{DasharoError, Result};
pub use feature::Feature;
pub use firmware::{FirmwareQuery, MethodEvaluator, MethodFirmware};
pub use hwmon::{Attribute, HwmonOps, SensorType};
