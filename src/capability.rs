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

//! Capability tables
//!
//! One table per feature, filled once from the firmware's discovery method.
//! Instances are flattened in discovery order (all of group 0, then group 1,
//! ...) so the position in the table is the channel the hwmon surface uses.
//!
//! # Limits
//!
//! - At most [`MAX_CAPS_PER_FEATURE`] entries; anything the firmware reports
//!   past that is dropped without an error.
//! - Labels live in [`MAX_CAP_NAME_LEN`] bytes including a terminator slot
//!   and are truncated to fit.

use std::fmt::{self, Write};

use tracing::{debug, trace};

use crate::constants::capacity::{MAX_CAPS_PER_FEATURE, MAX_CAP_NAME_LEN};
use crate::feature::Feature;
use crate::firmware::FirmwareQuery;

const NAME_CAPACITY: usize = MAX_CAP_NAME_LEN - 1;

/// Fixed-size label, never longer than `MAX_CAP_NAME_LEN - 1` bytes
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CapabilityName {
    buf: [u8; NAME_CAPACITY],
    len: usize,
    truncated: bool,
}

impl CapabilityName {
    pub const fn empty() -> Self {
        Self {
            buf: [0; NAME_CAPACITY],
            len: 0,
            truncated: false,
        }
    }

    /// Label for instance `index` of a category, e.g. "CPU Core 1"
    pub fn for_instance(category: &str, index: u32) -> Self {
        let mut name = Self::empty();
        write!(name, "{} {}", category, index).ok();
        name
    }

    pub fn as_str(&self) -> &str {
        // Only whole chars are ever copied in
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether part of the formatted label did not fit
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Write for CapabilityName {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.truncated {
                break;
            }
            let width = c.len_utf8();
            if self.len + width > NAME_CAPACITY {
                self.truncated = true;
                break;
            }
            c.encode_utf8(&mut self.buf[self.len..self.len + width]);
            self.len += width;
        }
        Ok(())
    }
}

impl Default for CapabilityName {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered sensor and the address the firmware knows it by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capability {
    /// Category number, the firmware's group argument
    pub group: u8,
    /// Instance number inside the group
    pub index: u32,
    pub name: CapabilityName,
}

/// Discovered capabilities of one feature
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    feature: Feature,
    caps: [Capability; MAX_CAPS_PER_FEATURE],
    count: usize,
}

impl CapabilityTable {
    pub fn empty(feature: Feature) -> Self {
        Self {
            feature,
            caps: [Capability::default(); MAX_CAPS_PER_FEATURE],
            count: 0,
        }
    }

    /// Walk every category of `feature` and flatten the reported instances.
    ///
    /// A failed or negative count skips that category. Filling stops as soon
    /// as the table is full.
    pub fn build<F: FirmwareQuery + ?Sized>(firmware: &F, feature: Feature) -> Self {
        let mut table = Self::empty(feature);

        'groups: for (group, category) in feature.categories().iter().enumerate() {
            if table.is_full() {
                break;
            }
            // Category tables are at most MAX_GROUPS_PER_FEATURE wide
            let group = group as u8;

            let reported = match firmware.capability_count(feature, group) {
                Ok(n) => n,
                Err(e) => {
                    debug!(%feature, group, error = %e, "Capability count unavailable, skipping category");
                    0
                }
            };
            if reported < 0 {
                debug!(%feature, group, reported, "Negative capability count, skipping category");
                continue;
            }
            trace!(%feature, group, category = *category, reported, "Discovered category");

            for index in 0..reported {
                if table.is_full() {
                    debug!(
                        %feature,
                        group,
                        dropped = reported - index,
                        capacity = MAX_CAPS_PER_FEATURE,
                        "Capability table full, dropping remaining instances"
                    );
                    break 'groups;
                }
                // Bounded by the capacity check above
                let index = index as u32;
                table.caps[table.count] = Capability {
                    group,
                    index,
                    name: CapabilityName::for_instance(category, index),
                };
                table.count += 1;
            }
        }

        debug!(%feature, count = table.count, "Capability table built");
        table
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    /// Number of populated entries
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count >= MAX_CAPS_PER_FEATURE
    }

    /// True iff `channel` addresses a populated entry. Negative channels are
    /// never populated.
    pub fn is_populated(&self, channel: i64) -> bool {
        usize::try_from(channel).map_or(false, |i| i < self.count)
    }

    /// Entry at a dense index, `None` past the populated range
    pub fn get(&self, channel: usize) -> Option<&Capability> {
        self.populated().get(channel)
    }

    /// Populated entries in channel order
    pub fn populated(&self) -> &[Capability] {
        &self.caps[..self.count]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.populated().iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DasharoError;
    use crate::firmware::MockFirmwareQuery;

    fn firmware_with_counts(counts: &'static [i64]) -> MockFirmwareQuery {
        let mut fw = MockFirmwareQuery::new();
        fw.expect_capability_count()
            .returning(move |_, group| Ok(counts.get(group as usize).copied().unwrap_or(0)));
        fw
    }

    #[test]
    fn test_name_formatting() {
        let name = CapabilityName::for_instance("CPU Core", 1);
        assert_eq!(name.as_str(), "CPU Core 1");
        assert_eq!(name.len(), 10);
        assert!(!name.is_truncated());
        assert_eq!(format!("{}", name), "CPU Core 1");
    }

    #[test]
    fn test_name_truncated_to_capacity() {
        let name = CapabilityName::for_instance("CPU Package", 12345);
        // "CPU Package 12345" is 17 bytes
        assert_eq!(name.as_str(), "CPU Package 123");
        assert_eq!(name.len(), MAX_CAP_NAME_LEN - 1);
    }

    #[test]
    fn test_name_truncation_keeps_utf8_whole() {
        // 14 ASCII bytes, then a two-byte char that would end at byte 16
        let name = CapabilityName::for_instance("ABCDEFGHIJKLMNé", 0);
        assert_eq!(name.as_str(), "ABCDEFGHIJKLMN");
        assert!(name.is_truncated());
    }

    #[test]
    fn test_cpu_core_scenario() {
        let fw = firmware_with_counts(&[0, 2, 0, 0, 0]);
        let table = CapabilityTable::build(&fw, Feature::Temperature);

        assert_eq!(table.count(), 2);
        let first = table.get(0).unwrap();
        let second = table.get(1).unwrap();
        assert_eq!((first.group, first.index), (1, 0));
        assert_eq!((second.group, second.index), (1, 1));
        assert_eq!(first.name.as_str(), "CPU Core 0");
        assert_eq!(second.name.as_str(), "CPU Core 1");
        assert!(table.get(2).is_none());
    }

    #[test]
    fn test_discovery_order_is_group_major() {
        let fw = firmware_with_counts(&[1, 2, 1]);
        let table = CapabilityTable::build(&fw, Feature::FanTach);

        let pairs: Vec<(u8, u32)> = table.iter().map(|c| (c.group, c.index)).collect();
        assert_eq!(pairs, vec![(0, 0), (1, 0), (1, 1), (2, 0)]);
        let labels: Vec<&str> = table.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(labels, vec!["CPU 0", "GPU 0", "GPU 1", "Chassis 0"]);
    }

    #[test]
    fn test_capacity_truncation_drops_excess_silently() {
        let fw = firmware_with_counts(&[30]);
        let table = CapabilityTable::build(&fw, Feature::FanPwm);

        assert_eq!(table.count(), MAX_CAPS_PER_FEATURE);
        assert!(table.is_full());
        assert_eq!(table.get(23).unwrap().index, 23);
    }

    #[test]
    fn test_full_table_stops_querying_later_groups() {
        let mut fw = MockFirmwareQuery::new();
        fw.expect_capability_count()
            .withf(|_, group| *group == 0)
            .times(1)
            .returning(|_, _| Ok(40));
        // Groups after the one that filled the table are never asked
        fw.expect_capability_count()
            .withf(|_, group| *group > 0)
            .times(0)
            .returning(|_, _| Ok(1));

        let table = CapabilityTable::build(&fw, Feature::Temperature);
        assert_eq!(table.count(), MAX_CAPS_PER_FEATURE);
    }

    #[test]
    fn test_failed_and_negative_counts_skip_category() {
        let mut fw = MockFirmwareQuery::new();
        fw.expect_capability_count().returning(|_, group| match group {
            0 => Err(DasharoError::firmware("GFCP", "AE_NOT_FOUND")),
            1 => Ok(-19),
            2 => Ok(2),
            _ => Ok(0),
        });

        let table = CapabilityTable::build(&fw, Feature::Temperature);
        assert_eq!(table.count(), 2);
        assert!(table.iter().all(|c| c.group == 2));
        assert_eq!(table.get(0).unwrap().name.as_str(), "GPU 0");
    }

    #[test]
    fn test_is_populated_bounds() {
        let fw = firmware_with_counts(&[3]);
        let table = CapabilityTable::build(&fw, Feature::FanTach);

        assert!(table.is_populated(0));
        assert!(table.is_populated(2));
        assert!(!table.is_populated(3));
        assert!(!table.is_populated(24));
        assert!(!table.is_populated(-1));
        assert!(!table.is_populated(i64::MIN));
        assert!(!table.is_populated(i64::MAX));
    }

    #[test]
    fn test_build_is_deterministic() {
        let fw = firmware_with_counts(&[2, 0, 5, 1, 3]);
        let a = CapabilityTable::build(&fw, Feature::Temperature);
        let b = CapabilityTable::build(&fw, Feature::Temperature);
        assert_eq!(a.populated(), b.populated());
    }

    #[test]
    fn test_empty_firmware() {
        let fw = firmware_with_counts(&[]);
        let table = CapabilityTable::build(&fw, Feature::FanPwm);
        assert!(table.is_empty());
        assert!(!table.is_populated(0));
    }
}
