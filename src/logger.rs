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

//! JSON-lines event log.
//!
//! Every line is `{"ts_ms": .., "event": .., "data": ..}`. Until
//! [`init_logging`] has been called, events are dropped.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use serde_json::{json, Value};

pub const LOG_FILE_NAME: &str = "log";
pub const CRASH_FILE_NAME: &str = "crashlog";

struct EventSink {
    log: File,
    crash_path: PathBuf,
}

lazy_static! {
    static ref SINK: Mutex<Option<EventSink>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn render(event: &str, data: Value) -> String {
    json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    })
    .to_string()
}

/// Open `<dir>/log` for appending; crash records go to `<dir>/crashlog`.
pub fn init_logging(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let log = open_append(&dir.join(LOG_FILE_NAME))?;
    let mut guard = SINK.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(EventSink {
        log,
        crash_path: dir.join(CRASH_FILE_NAME),
    });
    Ok(())
}

pub fn shutdown_logging() {
    let mut guard = SINK.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(sink) = guard.as_mut() {
        let _ = sink.log.flush();
    }
    *guard = None;
}

pub fn is_enabled() -> bool {
    SINK.lock().map(|g| g.is_some()).unwrap_or(false)
}

pub fn log_event(event: &str, data: Value) {
    if let Ok(mut guard) = SINK.lock() {
        if let Some(sink) = guard.as_mut() {
            let _ = writeln!(sink.log, "{}", render(event, data));
        }
    }
}

/// Record a fatal condition in both the event log and the crash log.
pub fn log_crash(reason: &str) {
    let data = json!({ "reason": reason });
    if let Ok(mut guard) = SINK.lock() {
        if let Some(sink) = guard.as_mut() {
            let line = render("fatal", data);
            let _ = writeln!(sink.log, "{}", line);
            if let Ok(mut crash) = open_append(&sink.crash_path) {
                let _ = writeln!(crash, "{}", line);
            }
        }
    }
}
