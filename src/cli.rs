//! Command-line interface based on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (monitor, watch, register,
//! status) and the global flags (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{MonitorOverrides, WatcherOverrides};
use crate::observer::TerminalPolicy;

/// jobwatch: turns remote agent jobs into a durable stream of actionable events.
#[derive(Debug, Parser)]
#[command(name = "jobwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML config file (default: $JOBWATCH_CONFIG or jobwatch.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enables debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Polls tracked jobs and appends actionable events to the event log.
    Monitor {
        /// Jobs file (JSON array or JSON Lines).
        #[arg(long)]
        jobs: Option<PathBuf>,

        /// Event log to append to.
        #[arg(long)]
        events: Option<PathBuf>,

        /// Monitor state file.
        #[arg(long)]
        state: Option<PathBuf>,

        /// Seconds between sweeps.
        #[arg(long)]
        poll: Option<u64>,

        /// Minutes without activity before a job is reported stuck.
        #[arg(long)]
        stuck_minutes: Option<u32>,

        /// Base URL of the job API.
        #[arg(long)]
        api_base: Option<String>,

        /// When a job in a terminal status produces a terminal event.
        #[arg(long, value_enum)]
        terminal_policy: Option<TerminalPolicy>,

        /// Runs a single sweep and exits.
        #[arg(long, default_value_t = false)]
        once: bool,
    },

    /// Tails the event log and runs a handler command for every new event.
    Watch {
        /// Event log to tail.
        #[arg(long)]
        events: Option<PathBuf>,

        /// Shell command to run per event; the event JSON is in $JULES_EVENT.
        #[arg(long)]
        command: Option<String>,

        /// Watcher state file.
        #[arg(long)]
        state: Option<PathBuf>,

        /// Seconds between event log checks.
        #[arg(long)]
        poll: Option<f64>,

        /// Drains the log once and exits.
        #[arg(long, default_value_t = false)]
        once: bool,
    },

    /// Adds a job id to the jobs file so the monitor starts tracking it.
    Register {
        job_id: String,

        /// Jobs file to append to.
        #[arg(long)]
        jobs: Option<PathBuf>,

        /// JSON object stored alongside the job.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Shows what the monitor and the watcher have recorded.
    Status {
        /// Monitor state file.
        #[arg(long)]
        state: Option<PathBuf>,

        /// Watcher state file.
        #[arg(long)]
        watcher_state: Option<PathBuf>,
    },
}

impl Command {
    /// Monitor flags as config overrides. Only meaningful for [`Command::Monitor`].
    pub fn monitor_overrides(&self) -> MonitorOverrides {
        match self {
            Command::Monitor {
                jobs,
                events,
                state,
                poll,
                stuck_minutes,
                api_base,
                terminal_policy,
                ..
            } => MonitorOverrides {
                jobs_path: jobs.clone(),
                events_path: events.clone(),
                state_path: state.clone(),
                poll_secs: *poll,
                stuck_minutes: *stuck_minutes,
                api_base: api_base.clone(),
                terminal_policy: *terminal_policy,
            },
            _ => MonitorOverrides::default(),
        }
    }

    /// Watch flags as config overrides. Only meaningful for [`Command::Watch`].
    pub fn watcher_overrides(&self) -> WatcherOverrides {
        match self {
            Command::Watch {
                events,
                command,
                state,
                poll,
                ..
            } => WatcherOverrides {
                events_path: events.clone(),
                state_path: state.clone(),
                poll_secs: *poll,
                command: command.clone(),
            },
            _ => WatcherOverrides::default(),
        }
    }
}
