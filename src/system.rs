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

//! Process and host helpers.

use std::env;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const SYSTEM_BIN_DIRS: [&str; 4] = ["/usr/sbin", "/sbin", "/usr/bin", "/bin"];

pub fn is_root() -> bool {
    // SAFETY: geteuid only returns the effective uid of the calling process.
    unsafe { libc::geteuid() == 0 }
}

/// Login name of the invoking user, falling back to the numeric uid.
pub fn current_user() -> String {
    for var in ["SUDO_USER", "USER", "LOGNAME"] {
        if let Ok(v) = env::var(var) {
            if !v.is_empty() {
                return v;
            }
        }
    }
    // SAFETY: getuid has no preconditions.
    unsafe { libc::getuid() }.to_string()
}

pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs the permission and existence check only.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

pub fn send_terminate(pid: i32) -> io::Result<()> {
    if pid <= 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {}", pid)));
    }
    // SAFETY: pid is positive, so this never targets a process group.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Locate `name` in `PATH` and the usual system binary directories.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let from_path = env::var_os("PATH")
        .map(|p| env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();
    from_path
        .into_iter()
        .chain(SYSTEM_BIN_DIRS.iter().map(PathBuf::from))
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_own_process_is_alive() {
        assert!(process_alive(std::process::id() as i32));
        assert!(!process_alive(0));
        assert!(!process_alive(-4));
    }

    #[test]
    fn test_send_terminate_rejects_groups() {
        assert!(send_terminate(0).is_err());
        assert!(send_terminate(-1).is_err());
    }

    #[test]
    fn test_current_user_not_empty() {
        assert!(!current_user().is_empty());
    }

    #[test]
    #[serial(env)]
    fn test_find_executable_in_path() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("fc-probe-test");
        fs::write(&bin, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();
        let plain = dir.path().join("fc-not-exec");
        fs::write(&plain, "").unwrap();

        let old = env::var_os("PATH");
        env::set_var("PATH", dir.path());
        assert_eq!(find_executable("fc-probe-test"), Some(bin));
        assert_eq!(find_executable("fc-not-exec"), None);
        match old {
            Some(v) => env::set_var("PATH", v),
            None => env::remove_var("PATH"),
        }
    }
}
