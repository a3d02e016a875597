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

//! Hardware inventory.
//!
//! A [`DiscoveryProvider`] yields an [`Inventory`] of typed records. Records
//! are plain data; [`HwmonDevice::sensor`], [`HwmonDevice::fan`] and
//! [`DiskRecord::sensor`] turn them into owned devices on demand.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::fan::Fan;
use crate::hwmon::{self, extract_index, resolve_device_dir, HWMON_ROOT};
use crate::sensor::{Sensor, TempRange};
use crate::system;

pub const BLOCK_ROOT: &str = "/sys/block";

/// Virtual block devices hddtemp cannot query.
const SKIPPED_DISK_PREFIXES: [&str; 7] = ["loop", "ram", "zram", "dm-", "sr", "md", "nbd"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorRecord {
    pub stem: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanRecord {
    pub stem: String,
    pub label: String,
    pub min_speed: Option<u32>,
    pub max_speed: Option<u32>,
    /// `_output` and `_manual` are both present
    pub controllable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HwmonDevice {
    pub name: String,
    pub dir: PathBuf,
    pub sensors: Vec<SensorRecord>,
    pub fans: Vec<FanRecord>,
}

impl HwmonDevice {
    pub fn sensor(&self, stem: &str) -> Result<Sensor> {
        Sensor::hwmon(&self.name, &self.dir, stem, TempRange::hwmon_default(), None)
    }

    pub fn fan(&self, stem: &str) -> Result<Fan> {
        Fan::hwmon(&self.name, &self.dir, stem, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskRecord {
    pub name: String,
    pub model: String,
}

impl DiskRecord {
    pub fn sensor(&self, probe: &Path) -> Result<Sensor> {
        Sensor::hddtemp(&self.name, probe, Some(self.model.clone()), TempRange::hddtemp_default(), None)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory {
    pub hwmon: Vec<HwmonDevice>,
    pub disks: Vec<DiskRecord>,
    /// hddtemp binary used to query `disks`
    pub hddtemp: Option<PathBuf>,
}

impl Inventory {
    pub fn device(&self, name: &str) -> Option<&HwmonDevice> {
        self.hwmon.iter().find(|d| d.name == name)
    }

    /// Every temperature source as an owned sensor with default ranges.
    pub fn all_sensors(&self) -> Result<Vec<Sensor>> {
        let mut out = Vec::new();
        for dev in &self.hwmon {
            for rec in &dev.sensors {
                out.push(dev.sensor(&rec.stem)?);
            }
        }
        if let Some(probe) = &self.hddtemp {
            for disk in &self.disks {
                out.push(disk.sensor(probe)?);
            }
        }
        Ok(out)
    }

    /// Every fan that can be put under manual control.
    pub fn controllable_fans(&self) -> Result<Vec<Fan>> {
        let mut out = Vec::new();
        for dev in &self.hwmon {
            for rec in dev.fans.iter().filter(|f| f.controllable) {
                out.push(dev.fan(&rec.stem)?);
            }
        }
        Ok(out)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for dev in &self.hwmon {
            let _ = writeln!(out, "{} ({})", dev.name, dev.dir.display());
            for s in &dev.sensors {
                let _ = writeln!(out, "  sensor {:<8} {}", s.stem, s.label);
            }
            for f in &dev.fans {
                let limits = match (f.min_speed, f.max_speed) {
                    (Some(min), Some(max)) => format!("{}-{}", min, max),
                    _ => "?".to_string(),
                };
                let mode = if f.controllable { "" } else { " (read-only)" };
                let _ = writeln!(out, "  fan    {:<8} {} [{}]{}", f.stem, f.label, limits, mode);
            }
        }
        match &self.hddtemp {
            Some(probe) => {
                for disk in &self.disks {
                    let _ = writeln!(out, "disk {} {} via {}", disk.name, disk.model, probe.display());
                }
            }
            None if !self.disks.is_empty() => {
                let _ = writeln!(out, "{} disk(s) found but no hddtemp binary", self.disks.len());
            }
            None => {}
        }
        out
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait DiscoveryProvider {
    fn discover(&self) -> Result<Inventory>;
}

/// Text listing of whatever `provider` finds.
pub fn describe(provider: &dyn DiscoveryProvider) -> Result<String> {
    let inventory = provider.discover()?;
    if inventory.hwmon.is_empty() && inventory.disks.is_empty() {
        return Ok("no hwmon devices or disks found\n".to_string());
    }
    Ok(inventory.render())
}

pub struct SysfsDiscovery {
    hwmon_root: PathBuf,
    block_root: PathBuf,
    hddtemp: Option<PathBuf>,
}

impl Default for SysfsDiscovery {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SysfsDiscovery {
    /// System roots; the hddtemp binary is looked up when not given.
    pub fn new(hddtemp: Option<PathBuf>) -> Self {
        Self {
            hwmon_root: PathBuf::from(HWMON_ROOT),
            block_root: PathBuf::from(BLOCK_ROOT),
            hddtemp: hddtemp.or_else(|| system::find_executable("hddtemp")),
        }
    }

    pub fn with_roots(hwmon_root: impl Into<PathBuf>, block_root: impl Into<PathBuf>, hddtemp: Option<PathBuf>) -> Self {
        Self {
            hwmon_root: hwmon_root.into(),
            block_root: block_root.into(),
            hddtemp,
        }
    }

    fn scan_hwmon(&self) -> Vec<HwmonDevice> {
        let entries = match fs::read_dir(&self.hwmon_root) {
            Ok(e) => e,
            Err(e) => {
                warn!("cannot read {}: {}", self.hwmon_root.display(), e);
                return Vec::new();
            }
        };
        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();

        let mut devices = Vec::new();
        for path in paths {
            let Some((dir, name)) = resolve_device_dir(&path) else {
                debug!("skipping {}: no name attribute", path.display());
                continue;
            };
            let (sensors, fans) = scan_device(&dir);
            if sensors.is_empty() && fans.is_empty() {
                continue;
            }
            devices.push(HwmonDevice { name, dir, sensors, fans });
        }
        devices
    }

    fn scan_disks(&self) -> Vec<DiskRecord> {
        let Ok(entries) = fs::read_dir(&self.block_root) else {
            return Vec::new();
        };
        let mut disks: Vec<DiskRecord> = entries
            .flatten()
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !SKIPPED_DISK_PREFIXES.iter().any(|p| name.starts_with(p)))
            .map(|name| {
                let model = hwmon::read_first_line(self.block_root.join(&name).join("device").join("model"))
                    .ok()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| name.clone());
                DiskRecord { name, model }
            })
            .collect();
        disks.sort_by(|a, b| a.name.cmp(&b.name));
        disks
    }
}

fn read_speed(dir: &Path, stem: &str, suffix: &str) -> Option<u32> {
    hwmon::read_int(hwmon::attr_path(dir, stem, suffix))
        .ok()
        .and_then(|v| u32::try_from(v).ok())
}

fn label_or_stem(dir: &Path, stem: &str) -> String {
    hwmon::read_first_line(hwmon::attr_path(dir, stem, "_label"))
        .ok()
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| stem.to_string())
}

fn scan_device(dir: &Path) -> (Vec<SensorRecord>, Vec<FanRecord>) {
    let mut temps: Vec<usize> = Vec::new();
    let mut fans: Vec<usize> = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let fname = entry.file_name().to_string_lossy().to_string();
            if let Some(i) = extract_index(&fname, "temp", "_input") {
                temps.push(i);
            } else if let Some(i) = extract_index(&fname, "fan", "_input") {
                fans.push(i);
            }
        }
    }
    temps.sort_unstable();
    fans.sort_unstable();

    let sensors = temps
        .into_iter()
        .map(|i| {
            let stem = format!("temp{}", i);
            SensorRecord { label: label_or_stem(dir, &stem), stem }
        })
        .collect();
    let fans = fans
        .into_iter()
        .map(|i| {
            let stem = format!("fan{}", i);
            FanRecord {
                label: label_or_stem(dir, &stem),
                min_speed: read_speed(dir, &stem, "_min"),
                max_speed: read_speed(dir, &stem, "_max"),
                controllable: hwmon::attr_path(dir, &stem, "_output").exists()
                    && hwmon::attr_path(dir, &stem, "_manual").exists(),
                stem,
            }
        })
        .collect();
    (sensors, fans)
}

impl DiscoveryProvider for SysfsDiscovery {
    fn discover(&self) -> Result<Inventory> {
        let hwmon = self.scan_hwmon();
        let disks = self.scan_disks();
        debug!("discovered {} hwmon device(s), {} disk(s)", hwmon.len(), disks.len());
        Ok(Inventory {
            hwmon,
            disks,
            hddtemp: self.hddtemp.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FanControlError;
    use crate::test_utils::test_utils::{write_probe_script, FakeHwmon};
    use serial_test::serial;
    use tempfile::TempDir;

    fn block_root(disks: &[(&str, Option<&str>)]) -> TempDir {
        let root = TempDir::new().unwrap();
        for (name, model) in disks {
            let dev = root.path().join(name).join("device");
            fs::create_dir_all(&dev).unwrap();
            if let Some(m) = model {
                fs::write(dev.join("model"), format!("{}   \n", m)).unwrap();
            }
        }
        root
    }

    #[test]
    fn test_scan_hwmon_tree() {
        let hw = FakeHwmon::new("applesmc");
        hw.temp("temp2", Some("TC0P"), 50_000);
        hw.temp("temp10", None, 40_000);
        hw.fan("fan1", Some("Exhaust"), 1200, 6200);
        hw.write_attr("fan2", "_input", "900");

        // nested layout with name under device/
        let nested = hw.root().join("hwmon1").join("device");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("name"), "it87\n").unwrap();
        fs::write(nested.join("temp1_input"), "30000\n").unwrap();

        // no name at all
        fs::create_dir_all(hw.root().join("hwmon2")).unwrap();

        let blocks = block_root(&[]);
        let inv = SysfsDiscovery::with_roots(hw.root(), blocks.path(), None).discover().unwrap();

        assert_eq!(inv.hwmon.len(), 2);
        let smc = inv.device("applesmc").unwrap();
        assert_eq!(
            smc.sensors,
            vec![
                SensorRecord { stem: "temp2".into(), label: "TC0P".into() },
                SensorRecord { stem: "temp10".into(), label: "temp10".into() },
            ]
        );
        assert_eq!(smc.fans.len(), 2);
        assert_eq!(smc.fans[0].min_speed, Some(1200));
        assert!(smc.fans[0].controllable);
        assert!(!smc.fans[1].controllable);
        assert_eq!(smc.fans[1].max_speed, None);

        let it87 = inv.device("it87").unwrap();
        assert!(it87.dir.ends_with("device"));
    }

    #[test]
    fn test_inventory_builds_devices() {
        let hw = FakeHwmon::new("applesmc");
        hw.temp("temp1", Some("TC0P"), 50_000);
        hw.fan("fan1", Some("Exhaust"), 1200, 6200);
        hw.write_attr("fan2", "_input", "900");

        let blocks = block_root(&[]);
        let inv = SysfsDiscovery::with_roots(hw.root(), blocks.path(), None).discover().unwrap();

        let sensors = inv.all_sensors().unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].custom_label(), "applesmc_TC0P");
        assert_eq!(sensors[0].range(), TempRange::hwmon_default());

        let fans = inv.controllable_fans().unwrap();
        assert_eq!(fans.len(), 1);
        assert_eq!(fans[0].custom_label(), "Exhaust applesmc");
    }

    #[test]
    #[serial(probe)]
    fn test_disks_skip_virtual_devices() {
        let probe_dir = TempDir::new().unwrap();
        let probe = write_probe_script(probe_dir.path(), "echo 36");
        let blocks = block_root(&[
            ("sda", Some("Samsung SSD 860")),
            ("sdb", None),
            ("loop0", None),
            ("zram0", None),
            ("dm-1", None),
            ("sr0", None),
            ("nbd3", None),
        ]);
        let hwmon_root = TempDir::new().unwrap();

        let inv = SysfsDiscovery::with_roots(hwmon_root.path(), blocks.path(), Some(probe.clone()))
            .discover()
            .unwrap();
        assert_eq!(
            inv.disks,
            vec![
                DiskRecord { name: "sda".into(), model: "Samsung SSD 860".into() },
                DiskRecord { name: "sdb".into(), model: "sdb".into() },
            ]
        );

        let mut sensors = inv.all_sensors().unwrap();
        assert_eq!(sensors[0].custom_label(), "hddTemp_Samsung SSD 860");
        assert_eq!(sensors[0].range(), TempRange::hddtemp_default());
        assert_eq!(sensors[0].read_temp().unwrap(), 36_000);
        assert!(inv.render().contains("disk sda Samsung SSD 860"));
    }

    #[test]
    fn test_missing_roots_yield_empty_inventory() {
        let inv = SysfsDiscovery::with_roots("/nonexistent/hwmon", "/nonexistent/block", None)
            .discover()
            .unwrap();
        assert_eq!(inv, Inventory::default());
    }

    #[test]
    fn test_describe_with_mock_provider() {
        let mut empty = MockDiscoveryProvider::new();
        empty.expect_discover().times(1).returning(|| Ok(Inventory::default()));
        assert_eq!(describe(&empty).unwrap(), "no hwmon devices or disks found\n");

        let mut one = MockDiscoveryProvider::new();
        one.expect_discover().returning(|| {
            Ok(Inventory {
                hwmon: vec![HwmonDevice {
                    name: "nct6775".into(),
                    dir: PathBuf::from("/sys/class/hwmon/hwmon3"),
                    sensors: vec![SensorRecord { stem: "temp1".into(), label: "SYSTIN".into() }],
                    fans: vec![FanRecord {
                        stem: "fan2".into(),
                        label: "fan2".into(),
                        min_speed: Some(300),
                        max_speed: Some(1500),
                        controllable: true,
                    }],
                }],
                disks: vec![DiskRecord { name: "sda".into(), model: "ST4000".into() }],
                hddtemp: None,
            })
        });
        let text = describe(&one).unwrap();
        assert!(text.starts_with("nct6775 (/sys/class/hwmon/hwmon3)\n"));
        assert!(text.contains("SYSTIN"));
        assert!(text.contains("[300-1500]"));
        assert!(text.contains("1 disk(s) found but no hddtemp binary"));

        let mut failing = MockDiscoveryProvider::new();
        failing.expect_discover().returning(|| Err(FanControlError::NotRunning));
        assert!(describe(&failing).is_err());
    }
}
