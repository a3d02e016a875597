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

//! A fan bound to the sensors that drive it.

use serde_json::json;
use tracing::warn;

use crate::error::{FanControlError, Result};
use crate::fan::Fan;
use crate::logger;
use crate::sensor::Sensor;

#[derive(Debug)]
pub struct FanNode {
    fan: Fan,
    sensors: Vec<Sensor>,
}

impl FanNode {
    pub fn new(fan: Fan) -> Self {
        Self { fan, sensors: Vec::new() }
    }

    pub fn with_sensors(fan: Fan, sensors: Vec<Sensor>) -> Self {
        Self { fan, sensors }
    }

    pub fn fan(&self) -> &Fan { &self.fan }
    pub fn fan_mut(&mut self) -> &mut Fan { &mut self.fan }
    pub fn sensors(&self) -> &[Sensor] { &self.sensors }

    pub fn sensor_mut(&mut self, index: usize) -> Result<&mut Sensor> {
        let len = self.sensors.len();
        self.sensors
            .get_mut(index)
            .ok_or(FanControlError::IndexOutOfRange { index, len })
    }

    pub fn push_sensor(&mut self, sensor: Sensor) {
        self.sensors.push(sensor);
    }

    pub fn pop_sensor(&mut self) -> Option<Sensor> {
        self.sensors.pop()
    }

    pub fn remove_sensor(&mut self, index: usize) -> Result<Sensor> {
        if index >= self.sensors.len() {
            return Err(FanControlError::IndexOutOfRange { index, len: self.sensors.len() });
        }
        Ok(self.sensors.remove(index))
    }

    pub fn into_parts(self) -> (Fan, Vec<Sensor>) {
        (self.fan, self.sensors)
    }

    /// Highest percentage over all sensors, 0 without sensors. A sensor that
    /// fails to read is logged and left out of this tick.
    pub fn max_percent(&mut self, ambient: i32) -> u8 {
        let mut max = 0;
        for sensor in &mut self.sensors {
            match sensor.update(ambient) {
                Ok(p) => max = max.max(p),
                Err(e) => {
                    warn!("skipping sensor {}: {}", sensor.custom_label(), e);
                    logger::log_event(
                        "hardware_error",
                        json!({ "sensor": sensor.custom_label(), "error": e.to_string() }),
                    );
                }
            }
        }
        max
    }

    /// One control step. Returns the target speed; it is written only when it
    /// differs from the last speed written.
    pub fn tick(&mut self, ambient: i32) -> Result<u32> {
        let percent = self.max_percent(ambient);
        let target = self.fan.target_for(percent);
        if target != self.fan.current_speed() {
            self.fan.change_speed(target)?;
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::TempRange;
    use crate::test_utils::test_utils::{create_node, FakeHwmon};

    #[test]
    fn test_max_percent_picks_hottest() {
        let hw = FakeHwmon::new("coretemp");
        // default range 45..78, offset 24; ambient 0
        let mut node = create_node(&hw, &[("temp1", 50_000), ("temp2", 61_500), ("temp3", 40_000)]);
        assert_eq!(node.max_percent(0), 50);
    }

    #[test]
    fn test_max_percent_empty_node() {
        let hw = FakeHwmon::new("coretemp");
        let mut node = create_node(&hw, &[]);
        assert_eq!(node.max_percent(20_000), 0);
    }

    #[test]
    fn test_max_percent_skips_failing_sensor() {
        let hw = FakeHwmon::new("coretemp");
        let mut node = create_node(&hw, &[("temp1", 61_500), ("temp2", 78_000)]);
        hw.remove_attr("temp2", "_input");
        assert_eq!(node.max_percent(0), 50);
    }

    #[test]
    fn test_tick_writes_only_on_change() {
        let hw = FakeHwmon::new("coretemp");
        let mut node = create_node(&hw, &[("temp1", 61_500)]);
        node.fan_mut().manual_override_on().unwrap();

        assert_eq!(node.tick(0).unwrap(), 2000);
        assert_eq!(hw.read_attr("fan1", "_output"), "2000");

        hw.write_attr("fan1", "_output", "1");
        assert_eq!(node.tick(0).unwrap(), 2000);
        assert_eq!(hw.read_attr("fan1", "_output"), "1");

        hw.set_temp("temp1", 90_000);
        assert_eq!(node.tick(0).unwrap(), 3000);
        assert_eq!(hw.read_attr("fan1", "_output"), "3000");
    }

    #[test]
    fn test_tick_without_override_writes_nothing() {
        let hw = FakeHwmon::new("coretemp");
        let mut node = create_node(&hw, &[("temp1", 90_000)]);
        assert_eq!(node.tick(0).unwrap(), 3000);
        assert_eq!(hw.read_attr("fan1", "_output"), "1000");
    }

    #[test]
    fn test_tick_fan_write_failure_propagates() {
        let hw = FakeHwmon::new("coretemp");
        let mut node = create_node(&hw, &[("temp1", 90_000)]);
        node.fan_mut().manual_override_on().unwrap();
        std::fs::remove_dir_all(hw.dir()).unwrap();
        assert!(node.tick(0).unwrap_err().is_hardware());
    }

    #[test]
    fn test_sensor_edits() {
        let hw = FakeHwmon::new("coretemp");
        let mut node = create_node(&hw, &[("temp1", 1), ("temp2", 1), ("temp3", 1)]);

        let removed = node.remove_sensor(1).unwrap();
        assert_eq!(removed.instance_name(), "temp2");
        assert_eq!(node.sensors().len(), 2);

        assert!(matches!(
            node.remove_sensor(5),
            Err(FanControlError::IndexOutOfRange { index: 5, len: 2 })
        ));

        node.sensor_mut(0)
            .unwrap()
            .set_temperature_range(TempRange::new(30, 60, 0).unwrap());
        assert_eq!(node.sensors()[0].range().max(), 60_000);

        assert_eq!(node.pop_sensor().unwrap().instance_name(), "temp3");
        let (fan, sensors) = node.into_parts();
        assert_eq!(fan.kind().instance_name(), "fan1");
        assert_eq!(sensors.len(), 1);
    }
}
