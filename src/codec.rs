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

//! Persisted controller graph.
//!
//! One value per line:
//!
//! ```text
//! <fan count>
//! per fan:    kind, deviceName, locator, instanceName, customLabel, <sensor count>
//! per sensor: kind, deviceName, locator, instanceName, minTemp, maxTemp, offsetTemp, customLabel
//! ambient:    one sensor record, absent when there is no ambient sensor
//! ```
//!
//! Temperatures are stored in whole degrees. Kind codes: fan hwmon `1`;
//! sensor hwmon `1`, hddtemp `2`.

use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::controller::FanController;
use crate::error::{FanControlError, Result};
use crate::fan::Fan;
use crate::node::FanNode;
use crate::sensor::{Sensor, TempRange};

const SENSOR_RECORD_LINES: usize = 8;
const CONFIG_MODE: u32 = 0o660;

// ============================================================================
// Encoding
// ============================================================================

fn push_sensor(out: &mut String, sensor: &Sensor) {
    let range = sensor.range();
    let _ = writeln!(out, "{}", sensor.kind().code());
    let _ = writeln!(out, "{}", sensor.device_name());
    let _ = writeln!(out, "{}", sensor.kind().locator().display());
    let _ = writeln!(out, "{}", sensor.instance_name());
    let _ = writeln!(out, "{}", range.min() / 1000);
    let _ = writeln!(out, "{}", range.max() / 1000);
    let _ = writeln!(out, "{}", range.offset() / 1000);
    let _ = writeln!(out, "{}", sensor.custom_label());
}

pub fn encode_parts(ambient: Option<&Sensor>, nodes: &[FanNode]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", nodes.len());
    for node in nodes {
        let fan = node.fan();
        let _ = writeln!(out, "{}", fan.kind().code());
        let _ = writeln!(out, "{}", fan.device_name());
        let _ = writeln!(out, "{}", fan.kind().locator().display());
        let _ = writeln!(out, "{}", fan.kind().instance_name());
        let _ = writeln!(out, "{}", fan.custom_label());
        let _ = writeln!(out, "{}", node.sensors().len());
        for sensor in node.sensors() {
            push_sensor(&mut out, sensor);
        }
    }
    if let Some(sensor) = ambient {
        push_sensor(&mut out, sensor);
    }
    out
}

pub fn encode(controller: &FanController) -> String {
    controller.inspect(encode_parts)
}

// ============================================================================
// Decoding
// ============================================================================

struct Reader<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Only the final line terminator is dropped; a blank last line is a field.
    fn new(text: &'a str) -> Self {
        Self { lines: text.lines().collect(), pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.lines.len() - self.pos
    }

    /// 1-based number of the line read last.
    fn line(&self) -> usize {
        self.pos
    }

    fn field(&mut self, what: &str) -> Result<&'a str> {
        match self.lines.get(self.pos) {
            Some(l) => {
                self.pos += 1;
                Ok(l)
            }
            None => Err(FanControlError::parse(
                self.pos + 1,
                format!("unexpected end of input, expected {}", what),
            )),
        }
    }

    fn number<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let raw = self.field(what)?;
        raw.trim()
            .parse()
            .map_err(|_| FanControlError::parse(self.pos, format!("expected {}, found {:?}", what, raw)))
    }
}

fn read_sensor(r: &mut Reader<'_>) -> Result<Sensor> {
    let kind: u8 = r.number("sensor kind")?;
    let kind_line = r.line();
    if kind != 1 && kind != 2 {
        return Err(FanControlError::parse(kind_line, format!("unknown sensor kind {}", kind)));
    }
    let device = r.field("sensor device name")?;
    let locator = r.field("sensor locator")?;
    let instance = r.field("sensor instance name")?;
    let min: i32 = r.number("minTemp")?;
    let max: i32 = r.number("maxTemp")?;
    let range_line = r.line();
    let offset: i32 = r.number("offsetTemp")?;
    let custom = r.field("sensor custom label")?.to_string();

    let range = TempRange::new(min, max, offset)
        .map_err(|e| FanControlError::parse(range_line, e.to_string()))?;
    let sensor = match kind {
        1 => Sensor::hwmon(device, locator, instance, range, Some(custom)),
        _ => Sensor::hddtemp(instance, locator, None, range, Some(custom)),
    };
    sensor.map_err(|e| at_line(e, kind_line))
}

fn read_node(r: &mut Reader<'_>) -> Result<FanNode> {
    let kind: u8 = r.number("fan kind")?;
    let kind_line = r.line();
    if kind != 1 {
        return Err(FanControlError::parse(kind_line, format!("unknown fan kind {}", kind)));
    }
    let device = r.field("fan device name")?;
    let locator = r.field("fan locator")?;
    let instance = r.field("fan instance name")?;
    let custom = r.field("fan custom label")?.to_string();
    let fan = Fan::hwmon(device, locator, instance, Some(custom)).map_err(|e| at_line(e, kind_line))?;

    let count: usize = r.number("sensor count")?;
    let mut sensors = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        sensors.push(read_sensor(r)?);
    }
    Ok(FanNode::with_sensors(fan, sensors))
}

/// Invariant failures while rebuilding a record are reported as parse errors;
/// hardware errors pass through unchanged.
fn at_line(e: FanControlError, line: usize) -> FanControlError {
    match e {
        FanControlError::InvariantViolation(msg) => FanControlError::parse(line, msg),
        other => other,
    }
}

/// Rebuild the graph. Nothing is returned unless every record is valid.
pub fn decode_parts(text: &str) -> Result<(Option<Sensor>, Vec<FanNode>)> {
    let mut r = Reader::new(text);
    let count: usize = r.number("fan count")?;
    let mut nodes = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        nodes.push(read_node(&mut r)?);
    }

    let ambient = match r.remaining() {
        0 => None,
        n if n < SENSOR_RECORD_LINES => {
            return Err(FanControlError::parse(
                r.line() + n + 1,
                format!("truncated ambient sensor record ({} of {} lines)", n, SENSOR_RECORD_LINES),
            ))
        }
        _ => Some(read_sensor(&mut r)?),
    };

    if r.remaining() > 0 {
        return Err(FanControlError::parse(r.line() + 1, "unexpected data after ambient sensor record"));
    }
    Ok((ambient, nodes))
}

pub fn decode(text: &str) -> Result<FanController> {
    let (ambient, nodes) = decode_parts(text)?;
    FanController::from_parts(ambient, nodes)
}

// ============================================================================
// Files
// ============================================================================

/// Write the encoded graph to `path` via a temporary file and a rename.
pub fn save(controller: &FanController, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = encode(controller);

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(text.as_bytes())?;
    file.sync_all()?;
    drop(file);
    fs::set_permissions(&temp_path, fs::Permissions::from_mode(CONFIG_MODE))?;

    fs::rename(&temp_path, path)?;
    debug!("saved {} fan node(s) to {}", controller.node_count(), path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<FanController> {
    let text = fs::read_to_string(path)?;
    let controller = decode(&text)?;
    debug!("loaded {} fan node(s) from {}", controller.node_count(), path.display());
    Ok(controller)
}
