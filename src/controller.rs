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

//! The control loop.
//!
//! A [`FanController`] owns the optional ambient sensor and every
//! [`FanNode`]. While idle the graph can be edited freely; [`FanController::start`]
//! engages manual override on every fan and spawns one worker thread that
//! ticks all nodes once per poll interval. The wait between ticks is
//! interruptible: [`FanController::stop`] wakes the worker at once, joins it,
//! and only then hands the fans back to automatic control, so no write can
//! land after the override has been released.
//!
//! The graph sits behind a single mutex shared with the worker. Topology edits
//! are refused with [`FanControlError::ControllerRunning`] while the worker is
//! alive.

use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::{FanControlError, Result};
use crate::fan::Fan;
use crate::logger;
use crate::node::FanNode;
use crate::sensor::{Sensor, TempRange};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct ControlGraph {
    ambient: Option<Sensor>,
    nodes: Vec<FanNode>,
}

impl ControlGraph {
    fn ambient_temp(&mut self) -> i32 {
        match self.ambient.as_mut() {
            Some(sensor) => sensor.read_temp().unwrap_or_else(|e| {
                warn!("ambient sensor unreadable, assuming 0: {}", e);
                0
            }),
            None => 0,
        }
    }

    fn tick(&mut self) {
        let ambient = self.ambient_temp();
        for node in self.nodes.iter_mut() {
            if let Err(e) = node.tick(ambient) {
                warn!("fan {}: {}", node.fan().custom_label(), e);
                logger::log_event(
                    "hardware_error",
                    json!({ "fan": node.fan().custom_label(), "error": e.to_string() }),
                );
            }
        }
    }

    fn release_overrides(&mut self) {
        for node in self.nodes.iter_mut() {
            if let Err(e) = node.fan_mut().manual_override_off() {
                error!("failed to release override on {}: {}", node.fan().custom_label(), e);
            }
        }
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct FanController {
    graph: Arc<Mutex<ControlGraph>>,
    worker: Option<Worker>,
    poll_interval: Duration,
}

impl fmt::Debug for FanController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanController")
            .field("poll_interval", &self.poll_interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn lock(graph: &Mutex<ControlGraph>) -> MutexGuard<'_, ControlGraph> {
    graph.lock().unwrap_or_else(|e| e.into_inner())
}

fn check_unique_fans<'a>(nodes: impl IntoIterator<Item = &'a FanNode>, candidate: &Fan) -> Result<()> {
    for node in nodes {
        if node.fan().kind() == candidate.kind() {
            return Err(FanControlError::invariant(format!(
                "fan {} at {} is already bound to a node",
                candidate.kind().instance_name(),
                candidate.kind().locator().display()
            )));
        }
    }
    Ok(())
}

fn check_node_list(nodes: &[FanNode]) -> Result<()> {
    for (i, node) in nodes.iter().enumerate() {
        check_unique_fans(&nodes[..i], node.fan())?;
    }
    Ok(())
}

impl Default for FanController {
    fn default() -> Self {
        Self::new()
    }
}

impl FanController {
    pub fn new() -> Self {
        Self {
            graph: Arc::new(Mutex::new(ControlGraph::default())),
            worker: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Controller over an existing graph. Rejects two nodes driving the same fan.
    pub fn from_parts(ambient: Option<Sensor>, nodes: Vec<FanNode>) -> Result<Self> {
        check_node_list(&nodes)?;
        let controller = Self::new();
        *lock(&controller.graph) = ControlGraph { ambient, nodes };
        Ok(controller)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn node_count(&self) -> usize {
        lock(&self.graph).nodes.len()
    }

    pub fn has_ambient_sensor(&self) -> bool {
        lock(&self.graph).ambient.is_some()
    }

    /// Borrow the graph for reading. The worker is held off for the duration.
    pub fn inspect<R>(&self, f: impl FnOnce(Option<&Sensor>, &[FanNode]) -> R) -> R {
        let graph = lock(&self.graph);
        f(graph.ambient.as_ref(), &graph.nodes)
    }

    /// Engage override on every fan and spawn the worker. No-op when already
    /// running or when there is nothing to drive.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        {
            let mut graph = lock(&self.graph);
            if graph.nodes.is_empty() {
                debug!("start ignored: no fan nodes");
                return Ok(());
            }
            for i in 0..graph.nodes.len() {
                if let Err(e) = graph.nodes[i].fan_mut().manual_override_on() {
                    graph.release_overrides();
                    return Err(e);
                }
            }
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let graph = Arc::clone(&self.graph);
        let interval = self.poll_interval;
        let handle = thread::Builder::new()
            .name("fancontrol-worker".to_string())
            .spawn(move || loop {
                lock(&graph).tick();
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| {
                lock(&self.graph).release_overrides();
                FanControlError::Io(e)
            })?;

        self.worker = Some(Worker { stop_tx, handle });
        info!(
            "controller started: {} node(s), interval {:?}",
            self.node_count(),
            self.poll_interval
        );
        Ok(())
    }

    /// Stop the worker, wait for it, then return every fan to automatic mode.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            error!("controller worker panicked");
        }
        lock(&self.graph).release_overrides();
        info!("controller stopped");
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_running() {
            return Err(FanControlError::ControllerRunning);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Topology edits (idle only)
    // ------------------------------------------------------------------------

    pub fn add_node(&mut self, node: FanNode) -> Result<()> {
        self.ensure_idle()?;
        let mut graph = lock(&self.graph);
        check_unique_fans(&graph.nodes, node.fan())?;
        graph.nodes.push(node);
        Ok(())
    }

    pub fn pop_node(&mut self) -> Result<Option<FanNode>> {
        self.ensure_idle()?;
        Ok(lock(&self.graph).nodes.pop())
    }

    pub fn remove_node(&mut self, index: usize) -> Result<FanNode> {
        self.ensure_idle()?;
        let mut graph = lock(&self.graph);
        let len = graph.nodes.len();
        if index >= len {
            return Err(FanControlError::IndexOutOfRange { index, len });
        }
        Ok(graph.nodes.remove(index))
    }

    pub fn add_sensor(&mut self, node: usize, sensor: Sensor) -> Result<()> {
        self.ensure_idle()?;
        let mut graph = lock(&self.graph);
        let len = graph.nodes.len();
        graph
            .nodes
            .get_mut(node)
            .ok_or(FanControlError::IndexOutOfRange { index: node, len })?
            .push_sensor(sensor);
        Ok(())
    }

    pub fn remove_sensor(&mut self, node: usize, sensor: usize) -> Result<Sensor> {
        self.ensure_idle()?;
        let mut graph = lock(&self.graph);
        let len = graph.nodes.len();
        graph
            .nodes
            .get_mut(node)
            .ok_or(FanControlError::IndexOutOfRange { index: node, len })?
            .remove_sensor(sensor)
    }

    pub fn set_temperature_range(&mut self, node: usize, sensor: usize, range: TempRange) -> Result<()> {
        self.ensure_idle()?;
        let mut graph = lock(&self.graph);
        let len = graph.nodes.len();
        graph
            .nodes
            .get_mut(node)
            .ok_or(FanControlError::IndexOutOfRange { index: node, len })?
            .sensor_mut(sensor)?
            .set_temperature_range(range);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Ownership hand-off
    // ------------------------------------------------------------------------

    /// Install a new ambient sensor; the previous one is released.
    pub fn set_ambient_sensor(&mut self, sensor: Option<Sensor>) -> Result<()> {
        self.replace_ambient_sensor(sensor).map(drop)
    }

    /// Install a new ambient sensor and hand the previous one to the caller.
    pub fn replace_ambient_sensor(&mut self, sensor: Option<Sensor>) -> Result<Option<Sensor>> {
        self.ensure_idle()?;
        Ok(std::mem::replace(&mut lock(&self.graph).ambient, sensor))
    }

    pub fn detach_ambient_sensor(&mut self) -> Result<Option<Sensor>> {
        self.replace_ambient_sensor(None)
    }

    /// Replace the node list; the previous nodes are released, which returns
    /// their fans to automatic control.
    pub fn set_nodes(&mut self, nodes: Vec<FanNode>) -> Result<()> {
        self.replace_nodes(nodes).map(drop)
    }

    pub fn replace_nodes(&mut self, nodes: Vec<FanNode>) -> Result<Vec<FanNode>> {
        self.ensure_idle()?;
        check_node_list(&nodes)?;
        Ok(std::mem::replace(&mut lock(&self.graph).nodes, nodes))
    }

    pub fn take_nodes(&mut self) -> Result<Vec<FanNode>> {
        self.replace_nodes(Vec::new())
    }

    /// Stop the controller and hand out everything it owned.
    pub fn into_parts(mut self) -> (Option<Sensor>, Vec<FanNode>) {
        self.stop();
        let graph = std::mem::take(&mut *lock(&self.graph));
        (graph.ambient, graph.nodes)
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let running = self.is_running();
        self.inspect(|ambient, nodes| ControllerSnapshot {
            running,
            ambient: ambient.map(SensorStatus::from),
            nodes: nodes.iter().map(NodeStatus::from).collect(),
        })
    }
}

impl Drop for FanController {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Status view
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SensorStatus {
    pub kind: &'static str,
    pub device_name: String,
    pub instance_name: String,
    pub label: String,
    pub custom_label: String,
    pub min_temp: i32,
    pub max_temp: i32,
    pub offset_temp: i32,
    pub current_temp: i32,
    pub current_percent: u8,
}

impl From<&Sensor> for SensorStatus {
    fn from(s: &Sensor) -> Self {
        let range = s.range();
        Self {
            kind: s.kind().name(),
            device_name: s.device_name().to_string(),
            instance_name: s.instance_name().to_string(),
            label: s.label().to_string(),
            custom_label: s.custom_label().to_string(),
            min_temp: range.min(),
            max_temp: range.max(),
            offset_temp: range.offset(),
            current_temp: s.current_temp(),
            current_percent: s.current_percent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NodeStatus {
    pub kind: &'static str,
    pub device_name: String,
    pub instance_name: String,
    pub label: String,
    pub custom_label: String,
    pub min_speed: u32,
    pub max_speed: u32,
    pub current_speed: u32,
    pub manual: bool,
    pub sensors: Vec<SensorStatus>,
}

impl From<&FanNode> for NodeStatus {
    fn from(node: &FanNode) -> Self {
        let fan = node.fan();
        Self {
            kind: fan.kind().name(),
            device_name: fan.device_name().to_string(),
            instance_name: fan.kind().instance_name().to_string(),
            label: fan.label().to_string(),
            custom_label: fan.custom_label().to_string(),
            min_speed: fan.min_speed(),
            max_speed: fan.max_speed(),
            current_speed: fan.current_speed(),
            manual: fan.is_manual(),
            sensors: node.sensors().iter().map(SensorStatus::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub running: bool,
    pub ambient: Option<SensorStatus>,
    pub nodes: Vec<NodeStatus>,
}
