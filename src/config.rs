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

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FanControlError, Result};

pub const APP_DIR_ENV: &str = "FANCONTROL_HOME";
pub const RUN_DIR_ENV: &str = "FANCONTROL_RUN_DIR";

const MIN_POLL_MS: u64 = 250;
const MAX_POLL_MS: u64 = 10_000;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Directory holding the persisted graph, settings and event logs.
pub fn app_dir() -> PathBuf {
    if let Ok(dir) = env::var(APP_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Path::new(&home).join(".fanControl");
        }
    }
    PathBuf::from("/etc/fancontrol")
}

/// Directory holding the PID and user files of a running service.
pub fn run_dir() -> PathBuf {
    match env::var(RUN_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("/run/fancontrol"),
    }
}

pub fn config_path() -> PathBuf {
    app_dir().join("config")
}

pub fn settings_path() -> PathBuf {
    app_dir().join("settings.json")
}

fn default_poll_interval_ms() -> u64 { 1000 }
fn default_event_log() -> bool { true }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// tracing filter used when `FANCONTROL_LOG` is unset
    #[serde(default)]
    pub log_level: Option<String>,
    /// Write the JSON event log next to the config
    #[serde(default = "default_event_log")]
    pub event_log: bool,
    /// hddtemp binary; searched in PATH when unset
    #[serde(default)]
    pub hddtemp_path: Option<PathBuf>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            log_level: None,
            event_log: default_event_log(),
            hddtemp_path: None,
        }
    }
}

impl ServiceSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

pub fn validate_settings(settings: &ServiceSettings) -> std::result::Result<(), String> {
    if !(MIN_POLL_MS..=MAX_POLL_MS).contains(&settings.poll_interval_ms) {
        return Err(format!(
            "poll_interval_ms must be within {}..={} (got {})",
            MIN_POLL_MS, MAX_POLL_MS, settings.poll_interval_ms
        ));
    }
    if let Some(level) = &settings.log_level {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(format!("unknown log_level {:?}", level));
        }
    }
    if let Some(path) = &settings.hddtemp_path {
        if !path.is_absolute() {
            return Err(format!("hddtemp_path must be absolute: {}", path.display()));
        }
    }
    Ok(())
}

/// Settings from `path`; a missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<ServiceSettings> {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ServiceSettings::default()),
        Err(e) => return Err(e.into()),
    };
    let settings: ServiceSettings = serde_json::from_str(&data)
        .map_err(|e| FanControlError::Settings(format!("{}: {}", path.display(), e)))?;
    validate_settings(&settings).map_err(FanControlError::Settings)?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &ServiceSettings) -> Result<()> {
    validate_settings(settings).map_err(FanControlError::Settings)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
    Ok(())
}
