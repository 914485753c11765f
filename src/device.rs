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

//! Device context: the capability tables of one attached device plus the
//! firmware handle used to read them.
//!
//! The tables are built in [`DasharoDevice::attach`] and never change after
//! that, so a device can be shared behind an `Arc` and read from several
//! threads without locking. Every read is a fresh firmware round trip.

use std::sync::Arc;

use tracing::{debug, info};

use crate::capability::{Capability, CapabilityTable};
use crate::error::{DasharoError, Result};
use crate::feature::{Feature, FEATURE_COUNT};
use crate::firmware::FirmwareQuery;

pub struct DasharoDevice {
    firmware: Arc<dyn FirmwareQuery>,
    tables: [CapabilityTable; FEATURE_COUNT],
}

impl DasharoDevice {
    /// Discover the capabilities of every feature.
    ///
    /// Discovery failures only shrink the tables; attaching itself cannot fail.
    pub fn attach(firmware: Arc<dyn FirmwareQuery>) -> Self {
        let tables = Feature::ALL.map(|feature| CapabilityTable::build(firmware.as_ref(), feature));

        info!(
            temps = tables[Feature::Temperature.index()].count(),
            pwms = tables[Feature::FanPwm.index()].count(),
            fans = tables[Feature::FanTach.index()].count(),
            "Dasharo capabilities discovered"
        );

        Self { firmware, tables }
    }

    pub fn table(&self, feature: Feature) -> &CapabilityTable {
        &self.tables[feature.index()]
    }

    pub fn count(&self, feature: Feature) -> usize {
        self.table(feature).count()
    }

    /// Whether `channel` is a populated channel of `feature`
    pub fn is_populated(&self, feature: Feature, channel: i64) -> bool {
        self.table(feature).is_populated(channel)
    }

    /// Capability behind a channel, or `ChannelOutOfRange`
    pub fn capability(&self, feature: Feature, channel: i64) -> Result<&Capability> {
        usize::try_from(channel)
            .ok()
            .and_then(|i| self.table(feature).get(i))
            .ok_or(DasharoError::ChannelOutOfRange { feature, channel })
    }

    /// Label of a populated channel
    pub fn label(&self, feature: Feature, channel: i64) -> Result<&str> {
        self.capability(feature, channel).map(|cap| cap.name.as_str())
    }

    /// Untransformed firmware reading for a channel
    pub fn read_raw(&self, feature: Feature, channel: i64) -> Result<i64> {
        let cap = self.capability(feature, channel)?;
        let (group, index) = (cap.group, cap.index);

        let result = match feature {
            Feature::Temperature => self.firmware.temperature(group, index),
            Feature::FanPwm => self.firmware.fan_duty_cycle(group, index),
            Feature::FanTach => self.firmware.fan_tachometer(group, index),
        };

        result.map_err(|e| {
            debug!(%feature, channel, group, index, error = %e, "Sensor read failed");
            e
        })
    }

    /// Reading in surface units: millidegrees for temperature, raw for fans
    pub fn read(&self, feature: Feature, channel: i64) -> Result<i64> {
        self.read_raw(feature, channel).map(|raw| feature.transform(raw))
    }
}
