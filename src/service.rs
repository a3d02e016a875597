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

//! Foreground service: run rights, signal hookup, status and stop.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::ServiceSettings;
use crate::controller::FanController;
use crate::error::FanControlError;
use crate::logger;
use crate::system;

pub const PID_FILE_NAME: &str = "pid";
pub const USER_FILE_NAME: &str = "usr";
pub const STOP_TIMEOUT: Duration = Duration::from_secs(9);

// ============================================================================
// Run rights
// ============================================================================

/// Held while this process owns the run directory; releasing it removes the
/// PID and user files.
#[derive(Debug)]
pub struct RunLock {
    pid_path: PathBuf,
    user_path: PathBuf,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        for path in [&self.pid_path, &self.user_path] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// PID and user of a live instance recorded in `run_dir`.
pub fn running_instance(run_dir: &Path) -> Option<(i32, String)> {
    let pid = fs::read_to_string(run_dir.join(PID_FILE_NAME))
        .ok()?
        .trim()
        .parse::<i32>()
        .ok()?;
    if !system::process_alive(pid) {
        return None;
    }
    let user = fs::read_to_string(run_dir.join(USER_FILE_NAME))
        .map(|u| u.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    Some((pid, user))
}

fn write_new(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o644)
        .open(path)?;
    writeln!(file, "{}", content)?;
    file.sync_all()
}

/// Remove `pid_path` only if the PID it records is dead when re-read here.
/// A file rewritten by a concurrent claimant is left in place.
fn remove_stale_pid(pid_path: &Path) -> std::io::Result<()> {
    let recorded = match fs::read_to_string(pid_path) {
        Ok(text) => text.trim().parse::<i32>().ok(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if recorded.is_some_and(system::process_alive) {
        return Ok(());
    }
    debug!("removing stale {}", pid_path.display());
    match fs::remove_file(pid_path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Claim `run_dir` for this process. A live recorded PID refuses the claim;
/// a stale PID file is replaced. The PID file is created exclusively, so of
/// two concurrent claimants only one wins.
pub fn acquire_run_rights(run_dir: &Path) -> std::result::Result<RunLock, FanControlError> {
    if let Some((pid, user)) = running_instance(run_dir) {
        return Err(FanControlError::AlreadyRunning { pid, user });
    }
    fs::create_dir_all(run_dir)?;
    let pid_path = run_dir.join(PID_FILE_NAME);
    let user_path = run_dir.join(USER_FILE_NAME);
    remove_stale_pid(&pid_path)?;

    if let Err(e) = write_new(&pid_path, &std::process::id().to_string()) {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            if let Some((pid, user)) = running_instance(run_dir) {
                return Err(FanControlError::AlreadyRunning { pid, user });
            }
        }
        return Err(e.into());
    }
    let lock = RunLock { pid_path, user_path };
    // the PID file is ours, so whatever user file is left over can be overwritten
    fs::write(&lock.user_path, format!("{}\n", system::current_user()))?;
    Ok(lock)
}

// ============================================================================
// Status and stop
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    Running { pid: i32, user: String },
    Stopped,
}

pub fn status(run_dir: &Path) -> ServiceStatus {
    match running_instance(run_dir) {
        Some((pid, user)) => ServiceStatus::Running { pid, user },
        None => ServiceStatus::Stopped,
    }
}

/// SIGTERM the recorded instance and wait for it to exit.
pub fn stop_running(run_dir: &Path, timeout: Duration) -> Result<i32> {
    let (pid, _) = running_instance(run_dir).ok_or(FanControlError::NotRunning)?;
    system::send_terminate(pid).with_context(|| format!("failed to signal pid {}", pid))?;

    let deadline = Instant::now() + timeout;
    while system::process_alive(pid) {
        if Instant::now() >= deadline {
            return Err(anyhow!("pid {} still running after {:?}", pid, timeout));
        }
        thread::sleep(Duration::from_millis(100));
    }
    info!("stopped fancontrol (pid {})", pid);
    Ok(pid)
}

// ============================================================================
// Service loop
// ============================================================================

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub config_path: PathBuf,
    pub app_dir: PathBuf,
    pub run_dir: PathBuf,
    pub settings: ServiceSettings,
}

/// Start `controller` and keep it running until `shutdown` fires or its
/// sender goes away. The controller is stopped before returning.
pub fn run_until(controller: &mut FanController, shutdown: Receiver<()>) -> Result<()> {
    controller.start().context("failed to start controller")?;
    if !controller.is_running() {
        return Err(anyhow!("nothing to control: the configuration has no fans"));
    }
    logger::log_event(
        "service_start",
        json!({ "pid": std::process::id(), "nodes": controller.node_count() }),
    );

    let _ = shutdown.recv();

    controller.stop();
    logger::log_event("service_stop", json!({ "pid": std::process::id() }));
    Ok(())
}

/// Acquire run rights, load the persisted graph and drive the fans until
/// SIGINT or SIGTERM.
pub fn run_service(opts: &ServiceOptions) -> Result<()> {
    let _lock = acquire_run_rights(&opts.run_dir)?;

    if opts.settings.event_log {
        if let Err(e) = logger::init_logging(&opts.app_dir) {
            warn!("event log disabled: {}", e);
        }
    }

    let mut controller = match codec::load(&opts.config_path) {
        Ok(c) => c.with_poll_interval(opts.settings.poll_interval()),
        Err(e) => {
            logger::log_crash(&format!("cannot load {}: {}", opts.config_path.display(), e));
            return Err(e).with_context(|| format!("cannot load {}", opts.config_path.display()));
        }
    };

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to install signal handler")?;

    info!(
        "fancontrol running: pid {}, {} fan(s), interval {:?}",
        std::process::id(),
        controller.node_count(),
        controller.poll_interval()
    );
    let result = run_until(&mut controller, rx);
    if let Err(e) = &result {
        logger::log_crash(&e.to_string());
    }
    logger::shutdown_logging();
    result
}
