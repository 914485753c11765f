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

//! hwmon-style sensor surface
//!
//! Exposes a device as `tempN_input`, `tempN_label`, `fanN_input`,
//! `fanN_label` and `pwmN` attributes (N is the 1-based channel), the same
//! layout `/sys/class/hwmon` uses.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::constants::capacity::MAX_CAPS_PER_FEATURE;
use crate::constants::hwmon::{MODE_HIDDEN, MODE_READ_ONLY};
use crate::device::DasharoDevice;
use crate::error::{DasharoError, Result};
use crate::feature::Feature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Temp,
    Fan,
    Pwm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Input,
    Label,
}

impl SensorType {
    /// Firmware feature backing this sensor type
    pub fn feature(self) -> Feature {
        match self {
            SensorType::Temp => Feature::Temperature,
            SensorType::Fan => Feature::FanTach,
            SensorType::Pwm => Feature::FanPwm,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            SensorType::Temp => "temp",
            SensorType::Fan => "fan",
            SensorType::Pwm => "pwm",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Input => f.write_str("input"),
            Attribute::Label => f.write_str("label"),
        }
    }
}

/// Channels and attributes declared for one sensor type
#[derive(Debug, Clone, Copy)]
pub struct ChannelInfo {
    pub sensor_type: SensorType,
    pub channels: usize,
    pub attributes: &'static [Attribute],
}

/// Declared channel layout: every type gets one channel per table slot
pub const CHANNEL_INFO: [ChannelInfo; 3] = [
    ChannelInfo {
        sensor_type: SensorType::Fan,
        channels: MAX_CAPS_PER_FEATURE,
        attributes: &[Attribute::Input, Attribute::Label],
    },
    ChannelInfo {
        sensor_type: SensorType::Temp,
        channels: MAX_CAPS_PER_FEATURE,
        attributes: &[Attribute::Input, Attribute::Label],
    },
    ChannelInfo {
        sensor_type: SensorType::Pwm,
        channels: MAX_CAPS_PER_FEATURE,
        attributes: &[Attribute::Input],
    },
];

/// Whether an attribute is declared for a sensor type
pub fn supports(sensor_type: SensorType, attribute: Attribute) -> bool {
    CHANNEL_INFO
        .iter()
        .any(|info| info.sensor_type == sensor_type && info.attributes.contains(&attribute))
}

/// Operations a monitoring front-end polls
pub trait HwmonOps: Send + Sync {
    /// Access mode of an attribute, 0 when hidden
    fn is_visible(&self, sensor_type: SensorType, attribute: Attribute, channel: i64) -> u16;

    fn read(&self, sensor_type: SensorType, attribute: Attribute, channel: i64) -> Result<i64>;

    fn read_string(&self, sensor_type: SensorType, attribute: Attribute, channel: i64) -> Result<&str>;
}

impl HwmonOps for DasharoDevice {
    fn is_visible(&self, sensor_type: SensorType, attribute: Attribute, channel: i64) -> u16 {
        if supports(sensor_type, attribute) && self.is_populated(sensor_type.feature(), channel) {
            MODE_READ_ONLY
        } else {
            MODE_HIDDEN
        }
    }

    fn read(&self, sensor_type: SensorType, attribute: Attribute, channel: i64) -> Result<i64> {
        match attribute {
            Attribute::Input => DasharoDevice::read(self, sensor_type.feature(), channel),
            Attribute::Label => Err(DasharoError::AttributeNotSupported { sensor_type, attribute }),
        }
    }

    fn read_string(&self, sensor_type: SensorType, attribute: Attribute, channel: i64) -> Result<&str> {
        match (sensor_type, attribute) {
            (SensorType::Temp | SensorType::Fan, Attribute::Label) => self.label(sensor_type.feature(), channel),
            _ => Err(DasharoError::AttributeNotSupported { sensor_type, attribute }),
        }
    }
}

/// Extract the number between a prefix and a suffix, e.g. `fan12_input`
pub fn extract_index(fname: &str, prefix: &str, suffix: &str) -> Option<usize> {
    if fname.len() >= prefix.len() + suffix.len() && fname.starts_with(prefix) && fname.ends_with(suffix) {
        let mid = &fname[prefix.len()..fname.len() - suffix.len()];
        mid.parse().ok()
    } else {
        None
    }
}

/// sysfs-style name of an attribute for a 0-based channel
pub fn attribute_name(sensor_type: SensorType, attribute: Attribute, channel: usize) -> String {
    match (sensor_type, attribute) {
        // PWM duty cycle has no suffix
        (SensorType::Pwm, Attribute::Input) => format!("pwm{}", channel + 1),
        _ => format!("{}{}_{}", sensor_type.prefix(), channel + 1, attribute),
    }
}

/// Parse an attribute name back to (type, attribute, 0-based channel)
pub fn parse_attribute_name(name: &str) -> Option<(SensorType, Attribute, usize)> {
    const FORMS: [(SensorType, Attribute, &str, &str); 5] = [
        (SensorType::Temp, Attribute::Input, "temp", "_input"),
        (SensorType::Temp, Attribute::Label, "temp", "_label"),
        (SensorType::Fan, Attribute::Input, "fan", "_input"),
        (SensorType::Fan, Attribute::Label, "fan", "_label"),
        (SensorType::Pwm, Attribute::Input, "pwm", ""),
    ];

    FORMS.iter().find_map(|&(sensor_type, attribute, prefix, suffix)| {
        extract_index(name, prefix, suffix)
            .filter(|&n| n >= 1)
            .map(|n| (sensor_type, attribute, n - 1))
    })
}

/// A registered sensor surface
pub struct HwmonDevice {
    id: u64,
    name: String,
    ops: Arc<dyn HwmonOps>,
}

impl HwmonDevice {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Driver name the surface was registered with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class device name, e.g. `hwmon3`
    pub fn class_name(&self) -> String {
        format!("hwmon{}", self.id)
    }

    pub fn ops(&self) -> &dyn HwmonOps {
        self.ops.as_ref()
    }

    /// Visible attribute names in declared channel order
    pub fn attributes(&self) -> Vec<String> {
        let mut names = Vec::new();
        for info in CHANNEL_INFO.iter() {
            for channel in 0..info.channels {
                for &attribute in info.attributes {
                    if self.ops.is_visible(info.sensor_type, attribute, channel as i64) != MODE_HIDDEN {
                        names.push(attribute_name(info.sensor_type, attribute, channel));
                    }
                }
            }
        }
        names
    }

    /// Read an attribute by name and render it the way sysfs would
    pub fn read_attribute(&self, name: &str) -> Result<String> {
        let (sensor_type, attribute, channel) =
            parse_attribute_name(name).ok_or_else(|| DasharoError::UnknownAttribute(name.to_string()))?;
        let channel = i64::try_from(channel).map_err(|_| DasharoError::UnknownAttribute(name.to_string()))?;

        if self.ops.is_visible(sensor_type, attribute, channel) == MODE_HIDDEN {
            return Err(DasharoError::ChannelOutOfRange {
                feature: sensor_type.feature(),
                channel,
            });
        }

        match attribute {
            Attribute::Input => self.ops.read(sensor_type, attribute, channel).map(|v| v.to_string()),
            Attribute::Label => self
                .ops
                .read_string(sensor_type, attribute, channel)
                .map(str::to_string),
        }
    }
}

/// Registered sensor surfaces, keyed by id
#[derive(Default)]
pub struct HwmonRegistry {
    devices: RwLock<BTreeMap<u64, Arc<HwmonDevice>>>,
    next_id: AtomicU64,
}

impl HwmonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, ops: Arc<dyn HwmonOps>) -> Arc<HwmonDevice> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let device = Arc::new(HwmonDevice {
            id,
            name: name.to_string(),
            ops,
        });
        self.devices.write().insert(id, Arc::clone(&device));
        info!(name, class = %device.class_name(), "Registered hwmon device");
        device
    }

    /// Returns false if nothing was registered under `id`
    pub fn unregister(&self, id: u64) -> bool {
        let removed = self.devices.write().remove(&id).is_some();
        debug!(id, removed, "Unregistered hwmon device");
        removed
    }

    pub fn get(&self, id: u64) -> Option<Arc<HwmonDevice>> {
        self.devices.read().get(&id).cloned()
    }

    pub fn list(&self) -> Vec<Arc<HwmonDevice>> {
        self.devices.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}
