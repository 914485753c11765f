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

//! Scripted firmware profiles
//!
//! A profile is a JSON description of what a board's firmware answers:
//! per feature, the instance count and readings of each category. The
//! [`ProfileEvaluator`] replays it as a [`MethodEvaluator`], and
//! [`dump_profile`] records one from a live device.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::constants::methods;
use crate::device::DasharoDevice;
use crate::error::{DasharoError, Result};
use crate::feature::Feature;
use crate::firmware::MethodEvaluator;
use crate::logger::log_event;

/// Counts and readings of one category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupReadings {
    pub group: u8,
    /// Reported instance count, defaults to the number of values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    /// Raw reading per instance; `null` makes that read fail
    #[serde(default)]
    pub values: Vec<Option<i64>>,
}

impl GroupReadings {
    pub fn reported_count(&self) -> i64 {
        self.count.unwrap_or(self.values.len() as i64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirmwareProfile {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub board: String,
    #[serde(default)]
    pub temperature: Vec<GroupReadings>,
    #[serde(default)]
    pub fan_pwm: Vec<GroupReadings>,
    #[serde(default)]
    pub fan_tach: Vec<GroupReadings>,
    /// Methods that fail on every call
    #[serde(default)]
    pub failing_methods: Vec<String>,
}

impl FirmwareProfile {
    pub fn groups(&self, feature: Feature) -> &[GroupReadings] {
        match feature {
            Feature::Temperature => &self.temperature,
            Feature::FanPwm => &self.fan_pwm,
            Feature::FanTach => &self.fan_tach,
        }
    }

    fn groups_mut(&mut self, feature: Feature) -> &mut Vec<GroupReadings> {
        match feature {
            Feature::Temperature => &mut self.temperature,
            Feature::FanPwm => &mut self.fan_pwm,
            Feature::FanTach => &mut self.fan_tach,
        }
    }

    pub fn group(&self, feature: Feature, group: u8) -> Option<&GroupReadings> {
        self.groups(feature).iter().find(|g| g.group == group)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|source| DasharoError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| DasharoError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o644));
        Ok(())
    }

    /// Snapshot the discovered tables of a device and one raw reading per
    /// channel. Failed reads are recorded as `null`.
    pub fn from_device(device: &DasharoDevice, board: &str) -> Self {
        let mut profile = FirmwareProfile {
            description: "Recorded from a live device".to_string(),
            board: board.to_string(),
            ..Default::default()
        };

        for feature in Feature::ALL {
            let mut by_group: BTreeMap<u8, Vec<Option<i64>>> = BTreeMap::new();
            for (channel, cap) in device.table(feature).iter().enumerate() {
                let value = device.read_raw(feature, channel as i64).ok();
                let values = by_group.entry(cap.group).or_default();
                // Instances of a group are discovered densely from 0
                let slot = cap.index as usize;
                if values.len() <= slot {
                    values.resize(slot + 1, None);
                }
                values[slot] = value;
            }
            *profile.groups_mut(feature) = by_group
                .into_iter()
                .map(|(group, values)| GroupReadings {
                    group,
                    count: None,
                    values,
                })
                .collect();
        }
        profile
    }
}

/// Feature answered by a retrieval method
fn retrieval_feature(method: &str) -> Option<Feature> {
    Feature::ALL.into_iter().find(|f| f.retrieval_method() == method)
}

/// [`MethodEvaluator`] answering from a [`FirmwareProfile`]
pub struct ProfileEvaluator {
    profile: FirmwareProfile,
}

impl ProfileEvaluator {
    pub fn new(profile: FirmwareProfile) -> Self {
        Self { profile }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let profile = FirmwareProfile::load(path)?;
        debug!(path = %path.display(), board = %profile.board, "Loaded firmware profile");
        Ok(Self::new(profile))
    }

    pub fn profile(&self) -> &FirmwareProfile {
        &self.profile
    }
}

impl MethodEvaluator for ProfileEvaluator {
    fn evaluate_integer(&self, method: &str, args: &[u64]) -> Result<u64> {
        if self.profile.failing_methods.iter().any(|m| m == method) {
            return Err(DasharoError::firmware(method, "AE_ERROR"));
        }
        let &[a, b] = args else {
            return Err(DasharoError::firmware(method, "AE_AML_UNINITIALIZED_ARG"));
        };

        if method == methods::GET_FEATURE_CAP_COUNT {
            let feature = usize::try_from(a)
                .ok()
                .and_then(Feature::from_index)
                .ok_or_else(|| DasharoError::firmware(method, "AE_BAD_PARAMETER"))?;
            let count = u8::try_from(b)
                .ok()
                .and_then(|group| self.profile.group(feature, group))
                .map_or(0, GroupReadings::reported_count);
            return Ok(count as u64);
        }

        let feature = retrieval_feature(method).ok_or_else(|| DasharoError::MethodNotSupported(method.to_string()))?;
        let reading = u8::try_from(a)
            .ok()
            .and_then(|group| self.profile.group(feature, group))
            .and_then(|g| usize::try_from(b).ok().and_then(|i| g.values.get(i)));

        match reading {
            Some(Some(value)) => Ok(*value as u64),
            Some(None) => Err(DasharoError::firmware(method, "AE_ERROR")),
            None => Err(DasharoError::firmware(method, "AE_AML_PACKAGE_LIMIT")),
        }
    }
}

fn ensure_dir(path: &Path) -> io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        let perms = fs::Permissions::from_mode(0o755);
        let _ = fs::set_permissions(path, perms);
    }
    Ok(())
}

/// File-name-safe version of a board name
pub fn sanitize_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
            out.push(c);
        } else if c.is_whitespace() {
            out.push('_');
        }
    }
    if out.is_empty() { "dasharo".into() } else { out }
}

/// Record a profile from `device` into `dir/<board>.json`
pub fn dump_profile(device: &DasharoDevice, board: &str, dir: &Path) -> Result<PathBuf> {
    let profile = FirmwareProfile::from_device(device, board);

    ensure_dir(dir).map_err(|source| DasharoError::FileWrite {
        path: dir.to_path_buf(),
        source,
    })?;
    let out_path = dir.join(format!("{}.json", sanitize_name(board)));
    profile.save(&out_path)?;

    info!(path = %out_path.display(), "Firmware profile written");
    log_event(
        "profile_dump",
        json!({
            "path": out_path.display().to_string(),
            "board": board,
            "temperature": device.count(Feature::Temperature),
            "fan_pwm": device.count(Feature::FanPwm),
            "fan_tach": device.count(Feature::FanTach),
        }),
    );
    Ok(out_path)
}
