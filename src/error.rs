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

//! Unified error handling for dasharo-sensors
//!
//! A single error type shared by the firmware transports, the capability
//! tables and the hwmon surface.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::feature::Feature;
use crate::hwmon::{Attribute, SensorType};

/// Result type alias using DasharoError
pub type Result<T> = std::result::Result<T, DasharoError>;

/// Unified error type for all dasharo-sensors operations
#[derive(thiserror::Error, Debug)]
pub enum DasharoError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Firmware Errors
    // ============================================================================
    #[error("Firmware method {method} failed: {reason}")]
    Firmware {
        method: String,
        reason: String,
    },

    #[error("Firmware method {method} did not return within {timeout:?}")]
    Timeout {
        method: String,
        timeout: Duration,
    },

    #[error("Firmware method not supported: {0}")]
    MethodNotSupported(String),

    #[error("Firmware transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("ACPI device not found: {0}")]
    DeviceNotFound(String),

    // ============================================================================
    // Sensor Surface Errors
    // ============================================================================
    #[error("Channel {channel} of {feature} is not populated")]
    ChannelOutOfRange {
        feature: Feature,
        channel: i64,
    },

    #[error("Attribute {attribute} not supported for {sensor_type}")]
    AttributeNotSupported {
        sensor_type: SensorType,
        attribute: Attribute,
    },

    #[error("Unknown sensor attribute: {0}")]
    UnknownAttribute(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl DasharoError {
    /// Create a firmware failure for a named method
    pub fn firmware(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Firmware {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from the firmware round trip rather than the caller
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::Firmware { .. }
                | Self::Timeout { .. }
                | Self::MethodNotSupported(_)
                | Self::TransportUnavailable(_)
                | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_error_display() {
        let err = DasharoError::firmware("GTMP", "AE_NOT_FOUND");
        assert_eq!(err.to_string(), "Firmware method GTMP failed: AE_NOT_FOUND");
        assert!(err.is_device_error());
    }

    #[test]
    fn test_channel_out_of_range_is_caller_error() {
        let err = DasharoError::ChannelOutOfRange {
            feature: Feature::Temperature,
            channel: 30,
        };
        assert_eq!(err.to_string(), "Channel 30 of temperature is not populated");
        assert!(!err.is_device_error());
    }

    #[test]
    fn test_attribute_not_supported_display() {
        let err = DasharoError::AttributeNotSupported {
            sensor_type: SensorType::Pwm,
            attribute: Attribute::Label,
        };
        assert_eq!(err.to_string(), "Attribute label not supported for pwm");
    }

    #[test]
    fn test_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "test");
        let err: DasharoError = io_err.into();
        assert!(matches!(err, DasharoError::Io(_)));
    }
}
