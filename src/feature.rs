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

//! Firmware features and their category name tables
//!
//! The firmware groups sensors by feature (temperature, fan duty cycle, fan
//! tachometer) and, inside a feature, by category. A category's position in
//! its table is the `group` argument passed to the firmware.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{capacity::MAX_GROUPS_PER_FEATURE, hwmon::MILLIDEGREES_PER_DEGREE, methods};

/// Sensor kind as numbered by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Temperature = 0,
    FanPwm = 1,
    FanTach = 2,
}

/// Number of features, sizes the per-feature arrays
pub const FEATURE_COUNT: usize = 3;

/// Temperature categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureCategory {
    CpuPackage = 0,
    CpuCore,
    Gpu,
    Board,
    Chassis,
}

/// Fan categories, shared by the duty cycle and tachometer features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanCategory {
    Cpu = 0,
    Gpu,
    Chassis,
}

const TEMPERATURE_GROUPS: [&str; 5] = ["CPU Package", "CPU Core", "GPU", "Board", "Chassis"];
const FAN_GROUPS: [&str; 3] = ["CPU", "GPU", "Chassis"];

// Every table must fit the fixed group width
const _: () = assert!(TEMPERATURE_GROUPS.len() <= MAX_GROUPS_PER_FEATURE);
const _: () = assert!(FAN_GROUPS.len() <= MAX_GROUPS_PER_FEATURE);

impl Feature {
    /// All features in firmware order
    pub const ALL: [Feature; FEATURE_COUNT] = [Feature::Temperature, Feature::FanPwm, Feature::FanTach];

    /// Firmware feature number, also the slot in per-feature arrays
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Ordered category names; the position is the firmware group number
    pub fn categories(self) -> &'static [&'static str] {
        match self {
            Feature::Temperature => &TEMPERATURE_GROUPS,
            Feature::FanPwm | Feature::FanTach => &FAN_GROUPS,
        }
    }

    /// Display name of one category, `None` past the end of the table
    pub fn category_name(self, group: usize) -> Option<&'static str> {
        self.categories().get(group).copied()
    }

    /// ACPI method returning one reading of this feature
    pub fn retrieval_method(self) -> &'static str {
        match self {
            Feature::Temperature => methods::GET_TEMPERATURE,
            Feature::FanPwm => methods::GET_FAN_DUTY,
            Feature::FanTach => methods::GET_FAN_TACH,
        }
    }

    /// Convert a raw firmware reading into surface units.
    ///
    /// Temperatures come in whole degrees and are published in millidegrees;
    /// fan readings pass through.
    pub fn transform(self, raw: i64) -> i64 {
        match self {
            Feature::Temperature => raw.saturating_mul(MILLIDEGREES_PER_DEGREE),
            Feature::FanPwm | Feature::FanTach => raw,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::Temperature => "temperature",
            Feature::FanPwm => "fan_pwm",
            Feature::FanTach => "fan_tach",
        };
        f.write_str(name)
    }
}

impl TemperatureCategory {
    pub fn name(self) -> &'static str {
        TEMPERATURE_GROUPS[self as usize]
    }
}

impl FanCategory {
    pub fn name(self) -> &'static str {
        FAN_GROUPS[self as usize]
    }
}
