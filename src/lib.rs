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

//! fancontrol - temperature driven fan control for Linux
//!
//! Fans exposed through hwmon are driven proportionally to the hottest of the
//! sensors bound to them. Sensors are hwmon temperature inputs or disks
//! queried through hddtemp; an optional ambient sensor lifts every sensor's
//! lower bound. The association graph is persisted in a line-oriented text
//! file and driven by a single worker thread.

pub mod error;
pub mod hwmon;
pub mod sensor;
pub mod fan;
pub mod node;
pub mod controller;
pub mod codec;
pub mod discovery;
pub mod config;
pub mod logger;
pub mod service;
pub mod system;

#[cfg(test)]
pub mod test_utils;

pub use controller::FanController;
pub use error::{FanControlError, Result};
pub use fan::{Fan, FanKind};
pub use node::FanNode;
pub use sensor::{Sensor, SensorKind, TempRange};
