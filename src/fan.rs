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

//! Controllable fans.
//!
//! Writes to a fan are only meaningful while its manual override is engaged;
//! [`Fan::change_speed`] silently ignores requests otherwise. A fan that is
//! dropped with the override engaged hands control back to the firmware.

use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, warn};

use crate::error::{FanControlError, Result};
use crate::hwmon;
use crate::logger;
use crate::sensor::validate_label;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanKind {
    /// `<dir>/<stem>_{min,max,label,input,output,manual}`
    HwMon { dir: PathBuf, stem: String },
}

impl FanKind {
    pub fn code(&self) -> u8 {
        match self {
            FanKind::HwMon { .. } => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FanKind::HwMon { .. } => "hwmon",
        }
    }

    pub fn locator(&self) -> &Path {
        match self {
            FanKind::HwMon { dir, .. } => dir,
        }
    }

    pub fn instance_name(&self) -> &str {
        match self {
            FanKind::HwMon { stem, .. } => stem,
        }
    }

    fn attr(&self, suffix: &str) -> PathBuf {
        match self {
            FanKind::HwMon { dir, stem } => hwmon::attr_path(dir, stem, suffix),
        }
    }
}

#[derive(Debug)]
pub struct Fan {
    device_name: String,
    label: String,
    custom_label: String,
    min_speed: u32,
    max_speed: u32,
    current_speed: u32,
    manual: bool,
    kind: FanKind,
}

fn read_speed_attr(path: PathBuf) -> Result<u32> {
    let raw = hwmon::read_int(&path)?;
    u32::try_from(raw).map_err(|_| FanControlError::HardwareValue {
        path,
        value: raw.to_string(),
    })
}

impl Fan {
    /// hwmon fan at `<dir>/<stem>_*`. Speed limits come from `_min`/`_max`;
    /// the label from `_label`, falling back to the stem.
    pub fn hwmon(
        device_name: &str,
        dir: impl Into<PathBuf>,
        stem: &str,
        custom_label: Option<String>,
    ) -> Result<Self> {
        let kind = FanKind::HwMon { dir: dir.into(), stem: stem.to_string() };
        let min = read_speed_attr(kind.attr("_min"))?;
        let max = read_speed_attr(kind.attr("_max"))?;
        let label = hwmon::read_first_line(kind.attr("_label"))
            .ok()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| stem.to_string());
        Self::with_limits(device_name, kind, label, min, max, custom_label)
    }

    /// Build a fan from already known values without touching the hardware.
    pub fn with_limits(
        device_name: &str,
        kind: FanKind,
        label: String,
        min_speed: u32,
        max_speed: u32,
        custom_label: Option<String>,
    ) -> Result<Self> {
        if min_speed > max_speed {
            return Err(FanControlError::invariant(format!(
                "minSpeed {} > maxSpeed {}",
                min_speed, max_speed
            )));
        }
        validate_label(&label)?;
        let custom_label = match custom_label.filter(|l| !l.is_empty()) {
            Some(l) => {
                validate_label(&l)?;
                l
            }
            None => format!("{} {}", label, device_name),
        };
        Ok(Self {
            device_name: device_name.to_string(),
            label,
            custom_label,
            min_speed,
            max_speed,
            current_speed: 0,
            manual: false,
            kind,
        })
    }

    pub fn device_name(&self) -> &str { &self.device_name }
    pub fn label(&self) -> &str { &self.label }
    pub fn custom_label(&self) -> &str { &self.custom_label }
    pub fn min_speed(&self) -> u32 { self.min_speed }
    pub fn max_speed(&self) -> u32 { self.max_speed }
    pub fn current_speed(&self) -> u32 { self.current_speed }
    pub fn is_manual(&self) -> bool { self.manual }
    pub fn kind(&self) -> &FanKind { &self.kind }

    pub fn set_custom_label(&mut self, label: &str) -> Result<()> {
        validate_label(label)?;
        self.custom_label = label.to_string();
        Ok(())
    }

    /// Measured speed from `_input`.
    pub fn read_speed(&self) -> Result<u32> {
        read_speed_attr(self.kind.attr("_input"))
    }

    /// Duty for a percentage of the speed range, floored.
    pub fn target_for(&self, percent: u8) -> u32 {
        let span = (self.max_speed - self.min_speed) as u64;
        self.min_speed + (span * percent.min(100) as u64 / 100) as u32
    }

    /// Write `value` to `_output`. Returns whether a write happened: nothing is
    /// written without the override or when the value is unchanged.
    pub fn change_speed(&mut self, value: u32) -> Result<bool> {
        if !self.manual || value == self.current_speed {
            return Ok(false);
        }
        hwmon::write_int(self.kind.attr("_output"), value as i64)?;
        debug!("{}: speed {} -> {}", self.custom_label, self.current_speed, value);
        logger::log_event(
            "speed_write",
            json!({ "fan": self.custom_label, "from": self.current_speed, "to": value }),
        );
        self.current_speed = value;
        Ok(true)
    }

    pub fn manual_override_on(&mut self) -> Result<()> {
        self.set_manual(true)
    }

    pub fn manual_override_off(&mut self) -> Result<()> {
        self.set_manual(false)
    }

    fn set_manual(&mut self, manual: bool) -> Result<()> {
        if self.manual == manual {
            return Ok(());
        }
        hwmon::write_int(self.kind.attr("_manual"), manual as i64)?;
        self.manual = manual;
        logger::log_event("override", json!({ "fan": self.custom_label, "manual": manual }));
        Ok(())
    }
}

impl Drop for Fan {
    fn drop(&mut self) {
        if self.manual {
            if let Err(e) = self.set_manual(false) {
                warn!("failed to return {} to automatic control: {}", self.custom_label, e);
            }
        }
    }
}
