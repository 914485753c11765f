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

//! Command Line Interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dasharo-sensors")]
#[command(version)]
#[command(about = "Read Dasharo firmware sensors")]
#[command(long_about = "dasharo-sensors - Read Dasharo firmware sensors

Discovers the temperature, fan speed and fan duty cycle sensors described
by a Dasharo firmware (ACPI device DSHR0001) and reads them the way the
hwmon class exposes them.

EXAMPLES:
    dasharo-sensors devices                     List Dasharo ACPI devices
    dasharo-sensors list                        Show every channel with its label
    dasharo-sensors read temp1_input            Read one attribute
    dasharo-sensors watch --interval 1000       Poll all channels every second
    dasharo-sensors dump-profile                Record a replayable firmware profile
    dasharo-sensors --profile board.json list   Replay a recorded profile

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Enable debug logging

FILES:
    ~/.config/dasharo-sensors/config.json     User configuration
    /etc/dasharo-sensors/config.json          System configuration
    /etc/dasharo-sensors/profiles/            Recorded firmware profiles")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file to use instead of the default locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Append lifecycle events to the JSON event log
    #[arg(long, global = true)]
    pub logging: bool,

    /// Answer firmware queries from a recorded profile
    #[arg(long, global = true)]
    pub profile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List Dasharo ACPI devices
    Devices,

    /// List populated channels with labels and current readings
    List,

    /// Read one attribute, e.g. temp1_input, fan2_label or pwm1
    Read {
        attribute: String,

        /// Bound device to read from (defaults to the first)
        #[arg(long)]
        device: Option<String>,
    },

    /// Poll every channel until interrupted
    Watch {
        /// Poll interval in milliseconds (defaults to the configured one)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many rounds
        #[arg(long)]
        count: Option<u64>,
    },

    /// Record discovered capabilities and current readings as a profile
    DumpProfile {
        /// Directory to write to
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
