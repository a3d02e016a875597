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

mod cli;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info};

use fancontrol::codec;
use fancontrol::config::{self, ServiceSettings};
use fancontrol::controller::{ControllerSnapshot, SensorStatus};
use fancontrol::discovery::{self, SysfsDiscovery};
use fancontrol::error::FanControlError;
use fancontrol::service::{self, ServiceOptions, ServiceStatus, STOP_TIMEOUT};
use fancontrol::system;

use cli::{Cli, Command};

const LOG_ENV: &str = "FANCONTROL_LOG";

fn init_tracing(verbose: bool, settings: &ServiceSettings) {
    let log_level = std::env::var(LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            "debug".to_string()
        } else {
            settings.log_level.clone().unwrap_or_else(|| "info".to_string())
        }
    });

    let mut use_journald = std::path::Path::new("/run/systemd/journal/socket").exists();
    if use_journald {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stderr", e);
                use_journald = false;
            }
        }
    }
    if !use_journald {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_env_filter(&log_level)
            .init();
    }
}

fn require_root() -> Result<()> {
    if !system::is_root() {
        return Err(anyhow!("root privileges are needed to control fans; re-run with sudo"));
    }
    Ok(())
}

fn print_sensor(indent: &str, s: &SensorStatus) {
    println!(
        "{}{} [{}] {}-{} C, offset {} C",
        indent,
        s.custom_label,
        s.kind,
        s.min_temp / 1000,
        s.max_temp / 1000,
        s.offset_temp / 1000
    );
}

fn print_snapshot(snapshot: &ControllerSnapshot) {
    if snapshot.nodes.is_empty() {
        println!("no fans configured");
    }
    for node in &snapshot.nodes {
        println!(
            "{} ({}) {}-{} rpm",
            node.custom_label, node.instance_name, node.min_speed, node.max_speed
        );
        for sensor in &node.sensors {
            print_sensor("  <- ", sensor);
        }
    }
    match &snapshot.ambient {
        Some(a) => print_sensor("ambient: ", a),
        None => println!("ambient: none"),
    }
}

fn stop(opts: &ServiceOptions) -> Result<()> {
    let pid = service::stop_running(&opts.run_dir, STOP_TIMEOUT)?;
    println!("fancontrol (pid {}) stopped", pid);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if cli.command.needs_root() {
        require_root()?;
    }
    let app_dir = config::app_dir();
    let settings = config::load_settings(&config::settings_path()).context("invalid settings")?;
    init_tracing(cli.verbose, &settings);

    let opts = ServiceOptions {
        config_path: cli.config.unwrap_or_else(config::config_path),
        app_dir,
        run_dir: config::run_dir(),
        settings,
    };

    match cli.command {
        Command::Start => service::run_service(&opts),
        Command::Stop => stop(&opts),
        Command::Restart => {
            match stop(&opts) {
                Ok(()) => {}
                Err(e) if matches!(e.downcast_ref::<FanControlError>(), Some(FanControlError::NotRunning)) => {
                    info!("no running instance to stop");
                }
                Err(e) => return Err(e),
            }
            service::run_service(&opts)
        }
        Command::Status => {
            match service::status(&opts.run_dir) {
                ServiceStatus::Running { pid, user } => {
                    println!("fancontrol is running (pid {}, started by {})", pid, user)
                }
                ServiceStatus::Stopped => println!("fancontrol is not running"),
            }
            Ok(())
        }
        Command::Check => {
            let controller = codec::load(&opts.config_path)
                .with_context(|| format!("cannot load {}", opts.config_path.display()))?;
            println!("{}: OK", opts.config_path.display());
            print_snapshot(&controller.snapshot());
            Ok(())
        }
        Command::Discover => {
            let provider = SysfsDiscovery::new(opts.settings.hddtemp_path.clone());
            print!("{}", discovery::describe(&provider)?);
            Ok(())
        }
        Command::Version => {
            println!("fancontrol {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
