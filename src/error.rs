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

//! Error type shared by the whole crate.

use std::io;
use std::path::PathBuf;

/// Result type alias using FanControlError
pub type Result<T> = std::result::Result<T, FanControlError>;

#[derive(thiserror::Error, Debug)]
pub enum FanControlError {
    // ============================================================================
    // Hardware access
    // ============================================================================
    #[error("Hardware I/O error on {path}: {source}")]
    HardwareIo {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Invalid hardware value in {path}: {value:?}")]
    HardwareValue {
        path: PathBuf,
        value: String,
    },

    #[error("Probe {probe} failed: {reason}")]
    Probe {
        probe: PathBuf,
        reason: String,
    },

    // ============================================================================
    // Persisted configuration
    // ============================================================================
    #[error("Config parse error at line {line}: {reason}")]
    ConfigParse {
        line: usize,
        reason: String,
    },

    #[error("Settings error: {0}")]
    Settings(String),

    // ============================================================================
    // Graph invariants and lifecycle
    // ============================================================================
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Controller is running; stop it before editing the fan topology")]
    ControllerRunning,

    #[error("Index {index} out of range ({len} present)")]
    IndexOutOfRange {
        index: usize,
        len: usize,
    },

    // ============================================================================
    // Service run rights
    // ============================================================================
    #[error("fancontrol is already running (pid {pid}, user {user})")]
    AlreadyRunning {
        pid: i32,
        user: String,
    },

    #[error("fancontrol is not running")]
    NotRunning,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FanControlError {
    pub fn hardware_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FanControlError::HardwareIo {
            path: path.into(),
            source,
        }
    }

    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        FanControlError::ConfigParse {
            line,
            reason: reason.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        FanControlError::InvariantViolation(msg.into())
    }

    /// True for errors raised by a device read or write during a tick.
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            FanControlError::HardwareIo { .. }
                | FanControlError::HardwareValue { .. }
                | FanControlError::Probe { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FanControlError::parse(7, "expected integer");
        assert_eq!(format!("{}", err), "Config parse error at line 7: expected integer");

        let err = FanControlError::invariant("minTemp 80000 > maxTemp 70000");
        assert_eq!(
            format!("{}", err),
            "Invariant violation: minTemp 80000 > maxTemp 70000"
        );

        let err = FanControlError::AlreadyRunning { pid: 42, user: "root".into() };
        assert!(format!("{}", err).contains("pid 42"));
    }

    #[test]
    fn test_hardware_classification() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(FanControlError::hardware_io("/sys/class/hwmon/hwmon0/temp1_input", io_err).is_hardware());
        assert!(!FanControlError::ControllerRunning.is_hardware());
        assert!(!FanControlError::parse(1, "x").is_hardware());
    }

    #[test]
    fn test_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "test");
        let err: FanControlError = io_err.into();
        assert!(matches!(err, FanControlError::Io(_)));
    }
}
