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

//! Plain-integer sysfs access.
//!
//! hwmon exposes every value as a small text file holding one integer. Nothing
//! here interprets units; callers decide what the number means.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{FanControlError, Result};

pub const HWMON_ROOT: &str = "/sys/class/hwmon";

/// Read a file and trim surrounding whitespace.
pub fn read_trimmed<P: AsRef<Path>>(p: P) -> io::Result<String> {
    let mut s = String::new();
    fs::File::open(p)?.read_to_string(&mut s)?;
    Ok(s.trim().to_string())
}

/// First line of a file, trimmed. Labels are single-line by convention but
/// some drivers pad them with trailing blanks or extra lines.
pub fn read_first_line<P: AsRef<Path>>(p: P) -> io::Result<String> {
    let raw = read_trimmed(p)?;
    Ok(raw.lines().next().unwrap_or("").trim_end().to_string())
}

pub fn read_int<P: AsRef<Path>>(p: P) -> Result<i64> {
    let path = p.as_ref();
    let raw = read_trimmed(path).map_err(|e| FanControlError::hardware_io(path, e))?;
    raw.parse::<i64>().map_err(|_| FanControlError::HardwareValue {
        path: path.to_path_buf(),
        value: raw,
    })
}

pub fn write_int<P: AsRef<Path>>(p: P, value: i64) -> Result<()> {
    let path = p.as_ref();
    fs::write(path, value.to_string()).map_err(|e| FanControlError::hardware_io(path, e))
}

/// Path of `<dir>/<stem><suffix>`, e.g. `temp1` + `_input`.
pub fn attr_path(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}{}", stem, suffix))
}

pub fn extract_index(fname: &str, prefix: &str, suffix: &str) -> Option<usize> {
    if fname.starts_with(prefix) && fname.ends_with(suffix) && fname.len() > prefix.len() + suffix.len() {
        let mid = &fname[prefix.len()..fname.len() - suffix.len()];
        mid.parse().ok()
    } else {
        None
    }
}

/// Resolve the directory holding the attribute files of an hwmon entry.
/// Older drivers keep `name` and the attributes under `device/`.
pub fn resolve_device_dir(hwmon_entry: &Path) -> Option<(PathBuf, String)> {
    let dir = fs::canonicalize(hwmon_entry).unwrap_or_else(|_| hwmon_entry.to_path_buf());
    if let Ok(name) = read_first_line(dir.join("name")) {
        return Some((dir, name));
    }
    let nested = dir.join("device");
    read_first_line(nested.join("name")).ok().map(|name| (nested, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_extract_index_valid() {
        assert_eq!(extract_index("fan1_input", "fan", "_input"), Some(1));
        assert_eq!(extract_index("fan12_input", "fan", "_input"), Some(12));
        assert_eq!(extract_index("temp2_label", "temp", "_label"), Some(2));
    }

    #[test]
    fn test_extract_index_invalid() {
        assert_eq!(extract_index("fan_input", "fan", "_input"), None);
        assert_eq!(extract_index("fan1_output", "fan", "_input"), None);
        assert_eq!(extract_index("temp1_input", "fan", "_input"), None);
        assert_eq!(extract_index("fanabc_input", "fan", "_input"), None);
        assert_eq!(extract_index("", "fan", "_input"), None);
    }

    #[test]
    fn test_read_trimmed() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("test.txt");
        let mut file = fs::File::create(&test_file).unwrap();
        writeln!(file, "  test content  ").unwrap();

        assert_eq!(read_trimmed(&test_file).unwrap(), "test content");
    }

    #[test]
    fn test_read_first_line_drops_trailing_blanks() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("fan1_label");
        fs::write(&test_file, "Exhaust   \nignored\n").unwrap();

        assert_eq!(read_first_line(&test_file).unwrap(), "Exhaust");
    }

    #[test]
    fn test_read_int() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("temp1_input");
        fs::write(&good, "45000\n").unwrap();
        assert_eq!(read_int(&good).unwrap(), 45000);

        let bad = temp_dir.path().join("temp2_input");
        fs::write(&bad, "n/a\n").unwrap();
        assert!(matches!(read_int(&bad), Err(FanControlError::HardwareValue { .. })));

        let missing = temp_dir.path().join("temp3_input");
        assert!(matches!(read_int(&missing), Err(FanControlError::HardwareIo { .. })));
    }

    #[test]
    fn test_write_int() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("fan1_output");
        write_int(&out, 2500).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "2500");

        let unwritable = temp_dir.path().join("missing").join("fan1_output");
        assert!(write_int(&unwritable, 1).is_err());
    }

    #[test]
    fn test_resolve_device_dir_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let direct = temp_dir.path().join("hwmon0");
        fs::create_dir_all(&direct).unwrap();
        fs::write(direct.join("name"), "applesmc\n").unwrap();
        let (dir, name) = resolve_device_dir(&direct).unwrap();
        assert_eq!(name, "applesmc");
        assert!(dir.ends_with("hwmon0"));

        let nested = temp_dir.path().join("hwmon1");
        fs::create_dir_all(nested.join("device")).unwrap();
        fs::write(nested.join("device").join("name"), "it87\n").unwrap();
        let (dir, name) = resolve_device_dir(&nested).unwrap();
        assert_eq!(name, "it87");
        assert!(dir.ends_with("device"));

        let empty = temp_dir.path().join("hwmon2");
        fs::create_dir_all(&empty).unwrap();
        assert!(resolve_device_dir(&empty).is_none());
    }
}
