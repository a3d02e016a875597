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

//! Command line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fancontrol")]
#[command(version)]
#[command(about = "Temperature driven fan control for Linux")]
#[command(after_help = "ENVIRONMENT VARIABLES:
    FANCONTROL_HOME      App directory (default $HOME/.fanControl)
    FANCONTROL_RUN_DIR   Run directory (default /run/fancontrol)
    FANCONTROL_LOG       Tracing filter (default info)")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Fan graph to load instead of <app dir>/config
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the control loop in the foreground until SIGINT/SIGTERM
    Start,
    /// Stop the running instance
    Stop,
    /// Stop the running instance, then start
    Restart,
    /// Report whether an instance is running
    Status,
    /// Load the configuration and print the fan graph
    Check,
    /// List hwmon sensors, fans and disks
    Discover,
    /// Show the version
    Version,
}

impl Command {
    /// Commands that touch fan hardware or another root process.
    pub fn needs_root(&self) -> bool {
        matches!(self, Command::Start | Command::Stop | Command::Restart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags_and_command() {
        let cli = Cli::try_parse_from(["fancontrol", "--config", "/tmp/fc", "-v", "check"]).unwrap();
        assert_eq!(cli.command, Command::Check);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/fc")));
        assert!(cli.verbose);

        // flags are accepted after the subcommand too
        let cli = Cli::try_parse_from(["fancontrol", "status", "-c", "/etc/fc"]).unwrap();
        assert_eq!(cli.command, Command::Status);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/fc")));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Cli::try_parse_from(["fancontrol"]).is_err());
        assert!(Cli::try_parse_from(["fancontrol", "--config"]).is_err());
        assert!(Cli::try_parse_from(["fancontrol", "--frobnicate", "start"]).is_err());
        assert!(Cli::try_parse_from(["fancontrol", "start", "stop"]).is_err());
        assert!(Cli::try_parse_from(["fancontrol", "frobnicate"]).is_err());
    }

    #[test]
    fn test_root_commands() {
        assert!(Command::Start.needs_root());
        assert!(Command::Restart.needs_root());
        assert!(!Command::Status.needs_root());
        assert!(!Command::Discover.needs_root());
    }
}
