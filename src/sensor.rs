/*
 * This file is part of fancontrol.
 *
 * Copyright (C) 2025 fancontrol contributors
 *
 * fancontrol is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * fancontrol is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with fancontrol. If not, see <https://www.gnu.org/licenses/>.
 */

//! Temperature sources.
//!
//! A [`Sensor`] carries the bookkeeping common to every source (labels, the
//! working range, last reading) and a [`SensorKind`] that knows how to obtain
//! a reading. The kind is only consulted in [`Sensor::read_temp`]; the range
//! arithmetic in [`TempRange::percent`] never looks at it.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{FanControlError, Result};
use crate::hwmon;

/// Device name recorded for every hddtemp-backed sensor.
pub const HDDTEMP_DEVICE: &str = "hddTemp";

/// Gap kept below `max` when the ambient-adjusted minimum reaches the top of the range.
const DEGENERATE_MARGIN: i64 = 3000;

/// Whole-degree values below this are scaled to milli-degrees.
const MILLI_THRESHOLD: i32 = 1000;

/// Working temperature range of a sensor, in milli-degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempRange {
    min: i32,
    max: i32,
    offset: i32,
}

impl TempRange {
    /// Build a range, normalizing whole-degree inputs to milli-degrees.
    /// Rejects `min > max` after normalization.
    pub fn new(min: i32, max: i32, offset: i32) -> Result<Self> {
        let (min, max, offset) = (normalize(min), normalize(max), normalize(offset));
        if min > max {
            return Err(FanControlError::invariant(format!(
                "minTemp {} > maxTemp {}",
                min, max
            )));
        }
        Ok(Self { min, max, offset })
    }

    pub fn hwmon_default() -> Self {
        Self { min: 45_000, max: 78_000, offset: 24_000 }
    }

    pub fn hddtemp_default() -> Self {
        Self { min: 45_000, max: 63_000, offset: 27_000 }
    }

    pub fn min(&self) -> i32 { self.min }
    pub fn max(&self) -> i32 { self.max }
    pub fn offset(&self) -> i32 { self.offset }

    /// Position of `reading` inside the range, as an integer percentage.
    ///
    /// The lower bound is lifted to `ambient + offset` when that is warmer than
    /// `min`. If the lifted bound reaches `max` it drops back to `max - 3000`,
    /// never below `min`, so the divisor stays positive.
    pub fn percent(&self, reading: i32, ambient: i32) -> u8 {
        let (reading, ambient) = (reading as i64, ambient as i64);
        let (min, max, offset) = (self.min as i64, self.max as i64, self.offset as i64);

        if reading >= max {
            return 100;
        }

        let mut effective_min = (ambient + offset).max(min);
        if effective_min >= max {
            effective_min = (max - DEGENERATE_MARGIN).max(min);
        }

        if reading <= min || reading <= effective_min {
            return 0;
        }

        ((reading - effective_min) * 100 / (max - effective_min)) as u8
    }
}

fn normalize(value: i32) -> i32 {
    if value < MILLI_THRESHOLD {
        value.saturating_mul(1000)
    } else {
        value
    }
}

/// Labels are stored one per line, so they must be non-blank single lines.
pub(crate) fn validate_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(FanControlError::invariant("label is blank"));
    }
    if label.contains('\n') || label.contains('\r') {
        return Err(FanControlError::invariant(format!(
            "label {:?} contains a line break",
            label
        )));
    }
    Ok(())
}

/// How a sensor obtains its reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorKind {
    /// `<dir>/<instance>_input` holding milli-degrees.
    HwMon { dir: PathBuf },
    /// External hddtemp binary queried for `/dev/<instance>`, whole degrees.
    HddTemp { probe: PathBuf },
}

impl SensorKind {
    /// Numeric tag used by the persisted config.
    pub fn code(&self) -> u8 {
        match self {
            SensorKind::HwMon { .. } => 1,
            SensorKind::HddTemp { .. } => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::HwMon { .. } => "hwmon",
            SensorKind::HddTemp { .. } => "hddtemp",
        }
    }

    pub fn locator(&self) -> &Path {
        match self {
            SensorKind::HwMon { dir } => dir,
            SensorKind::HddTemp { probe } => probe,
        }
    }
}

#[derive(Debug)]
pub struct Sensor {
    device_name: String,
    instance_name: String,
    label: String,
    custom_label: String,
    range: TempRange,
    current_temp: i32,
    current_percent: u8,
    kind: SensorKind,
}

impl Sensor {
    /// hwmon sensor backed by `<dir>/<stem>_input`.
    ///
    /// The label comes from `<stem>_label` when present, otherwise the stem.
    pub fn hwmon(
        device_name: &str,
        dir: impl Into<PathBuf>,
        stem: &str,
        range: TempRange,
        custom_label: Option<String>,
    ) -> Result<Self> {
        let dir = dir.into();
        let label = hwmon::read_first_line(hwmon::attr_path(&dir, stem, "_label"))
            .ok()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| stem.to_string());
        Self::build(device_name, stem, label, range, custom_label, SensorKind::HwMon { dir })
    }

    /// hddtemp sensor for `/dev/<disk>`. Without an explicit label the disk
    /// model from sysfs is used, falling back to the disk name.
    pub fn hddtemp(
        disk: &str,
        probe: impl Into<PathBuf>,
        label: Option<String>,
        range: TempRange,
        custom_label: Option<String>,
    ) -> Result<Self> {
        let label = label
            .filter(|l| !l.is_empty())
            .or_else(|| disk_model(disk))
            .unwrap_or_else(|| disk.to_string());
        Self::build(
            HDDTEMP_DEVICE,
            disk,
            label,
            range,
            custom_label,
            SensorKind::HddTemp { probe: probe.into() },
        )
    }

    fn build(
        device_name: &str,
        instance_name: &str,
        label: String,
        range: TempRange,
        custom_label: Option<String>,
        kind: SensorKind,
    ) -> Result<Self> {
        validate_label(&label)?;
        let custom_label = match custom_label.filter(|l| !l.is_empty()) {
            Some(l) => {
                validate_label(&l)?;
                l
            }
            None => format!("{}_{}", device_name, label),
        };
        Ok(Self {
            device_name: device_name.to_string(),
            instance_name: instance_name.to_string(),
            label,
            custom_label,
            range,
            current_temp: 0,
            current_percent: 0,
            kind,
        })
    }

    pub fn device_name(&self) -> &str { &self.device_name }
    pub fn instance_name(&self) -> &str { &self.instance_name }
    pub fn label(&self) -> &str { &self.label }
    pub fn custom_label(&self) -> &str { &self.custom_label }
    pub fn range(&self) -> TempRange { self.range }
    pub fn current_temp(&self) -> i32 { self.current_temp }
    pub fn current_percent(&self) -> u8 { self.current_percent }
    pub fn kind(&self) -> &SensorKind { &self.kind }

    pub fn set_temperature_range(&mut self, range: TempRange) {
        self.range = range;
    }

    pub fn set_custom_label(&mut self, label: &str) -> Result<()> {
        validate_label(label)?;
        self.custom_label = label.to_string();
        Ok(())
    }

    /// Read the source, store and return the temperature in milli-degrees.
    pub fn read_temp(&mut self) -> Result<i32> {
        let temp = match &self.kind {
            SensorKind::HwMon { dir } => {
                let path = hwmon::attr_path(dir, &self.instance_name, "_input");
                let raw = hwmon::read_int(&path)?;
                i32::try_from(raw).map_err(|_| FanControlError::HardwareValue {
                    path,
                    value: raw.to_string(),
                })?
            }
            SensorKind::HddTemp { probe } => probe_disk(probe, &self.instance_name)?,
        };
        self.current_temp = temp;
        Ok(temp)
    }

    /// Take a reading and place it in the working range, lifted by `ambient`.
    pub fn update(&mut self, ambient: i32) -> Result<u8> {
        let reading = self.read_temp()?;
        self.current_percent = self.range.percent(reading, ambient);
        Ok(self.current_percent)
    }
}

fn disk_model(disk: &str) -> Option<String> {
    hwmon::read_first_line(Path::new("/sys/block").join(disk).join("device").join("model"))
        .ok()
        .filter(|m| !m.is_empty())
}

/// Run `<probe> -n /dev/<disk>` and scale the whole-degree answer.
/// A drive that reports no number (asleep, unknown) reads as 0.
fn probe_disk(probe: &Path, disk: &str) -> Result<i32> {
    let output = Command::new(probe)
        .arg("-n")
        .arg(format!("/dev/{}", disk))
        .output()
        .map_err(|e| FanControlError::Probe {
            probe: probe.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(FanControlError::Probe {
            probe: probe.to_path_buf(),
            reason: format!(
                "exit {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next().unwrap_or("").trim();
    let digits: String = first.chars().take_while(|c| c.is_ascii_digit()).collect();
    let degrees = digits.parse::<i32>().unwrap_or_else(|_| {
        debug!("hddtemp gave no temperature for {}: {:?}", disk, first);
        0
    });
    Ok(degrees.saturating_mul(1000))
}
