/*
 * Test utilities for fancontrol
 *
 * Fake hwmon directories, probe scripts and small graph builders shared by the
 * unit tests of the device, node and controller modules.
 */

#[cfg(test)]
pub mod test_utils {
    use crate::fan::Fan;
    use crate::node::FanNode;
    use crate::sensor::{Sensor, TempRange};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// One hwmon device directory inside a temporary root.
    pub struct FakeHwmon {
        root: TempDir,
        dir: PathBuf,
    }

    impl FakeHwmon {
        pub fn new(name: &str) -> Self {
            let root = TempDir::new().unwrap();
            let dir = root.path().join("hwmon0");
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("name"), format!("{}\n", name)).unwrap();
            Self { root, dir }
        }

        pub fn dir(&self) -> &Path {
            &self.dir
        }

        pub fn root(&self) -> &Path {
            self.root.path()
        }

        pub fn temp(&self, stem: &str, label: Option<&str>, value: i64) {
            self.set_temp(stem, value);
            if let Some(label) = label {
                fs::write(self.dir.join(format!("{}_label", stem)), format!("{}\n", label)).unwrap();
            }
        }

        pub fn set_temp(&self, stem: &str, value: i64) {
            fs::write(self.dir.join(format!("{}_input", stem)), format!("{}\n", value)).unwrap();
        }

        pub fn fan(&self, stem: &str, label: Option<&str>, min: u32, max: u32) {
            self.write_attr(stem, "_min", &min.to_string());
            self.write_attr(stem, "_max", &max.to_string());
            self.write_attr(stem, "_input", &min.to_string());
            self.write_attr(stem, "_output", &min.to_string());
            self.write_attr(stem, "_manual", "0");
            if let Some(label) = label {
                self.write_attr(stem, "_label", label);
            }
        }

        pub fn write_attr(&self, stem: &str, suffix: &str, value: &str) {
            fs::write(self.dir.join(format!("{}{}", stem, suffix)), format!("{}\n", value)).unwrap();
        }

        pub fn read_attr(&self, stem: &str, suffix: &str) -> String {
            fs::read_to_string(self.dir.join(format!("{}{}", stem, suffix)))
                .unwrap()
                .trim()
                .to_string()
        }

        pub fn remove_attr(&self, stem: &str, suffix: &str) {
            fs::remove_file(self.dir.join(format!("{}{}", stem, suffix))).unwrap();
        }

        pub fn sensor(&self, stem: &str, range: TempRange) -> Sensor {
            Sensor::hwmon(&self.device_name(), &self.dir, stem, range, None).unwrap()
        }

        pub fn fan_device(&self, stem: &str) -> Fan {
            Fan::hwmon(&self.device_name(), &self.dir, stem, None).unwrap()
        }

        fn device_name(&self) -> String {
            crate::hwmon::read_first_line(self.dir.join("name")).unwrap()
        }
    }

    /// Writes an executable `/bin/sh` script standing in for the hddtemp binary.
    pub fn write_probe_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("hddtemp");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// A node with one fan (`fan1`, 1000..3000 rpm) and one sensor per stem.
    pub fn create_node(hw: &FakeHwmon, sensors: &[(&str, i64)]) -> FanNode {
        hw.fan("fan1", Some("Exhaust"), 1000, 3000);
        let mut node = FanNode::new(hw.fan_device("fan1"));
        for (stem, value) in sensors {
            hw.temp(stem, None, *value);
            node.push_sensor(hw.sensor(stem, TempRange::hwmon_default()));
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use serial_test::serial;

    #[test]
    fn test_fake_hwmon_layout() {
        let hw = FakeHwmon::new("nct6775");
        hw.temp("temp1", Some("SYSTIN"), 41_000);
        hw.fan("fan2", None, 600, 1800);

        assert_eq!(hw.read_attr("temp1", "_input"), "41000");
        assert_eq!(hw.read_attr("temp1", "_label"), "SYSTIN");
        assert_eq!(hw.read_attr("fan2", "_max"), "1800");
        assert_eq!(hw.read_attr("fan2", "_manual"), "0");
        assert!(hw.dir().starts_with(hw.root()));
    }

    #[test]
    #[serial(probe)]
    fn test_probe_script_runs() {
        let dir = tempfile::TempDir::new().unwrap();
        let probe = write_probe_script(dir.path(), "echo 38");
        let out = std::process::Command::new(&probe).output().unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "38");
    }

    #[test]
    fn test_create_node() {
        let hw = FakeHwmon::new("applesmc");
        let node = create_node(&hw, &[("temp1", 50_000), ("temp2", 40_000)]);
        assert_eq!(node.sensors().len(), 2);
        assert_eq!(node.fan().label(), "Exhaust");
    }
}
