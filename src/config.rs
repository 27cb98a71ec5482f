//! Configuration loaded from `jobwatch.toml`.
//!
//! [`WatchConfig`] holds every tunable of the monitor and the watcher. Keys
//! missing from the file fall back to sensible defaults, and a missing file is
//! the same as an empty one. `JULES_API_TOKEN` and `JULES_API_BASE` take
//! precedence over the file; command-line flags take precedence over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;

use crate::error::{Result, WatchError};
use crate::observer::{MonitorSettings, TerminalPolicy};
use crate::remote::DEFAULT_API_BASE;
use crate::tailer::TailerSettings;

pub const DEFAULT_CONFIG_PATH: &str = "jobwatch.toml";

/// Top-level configuration loaded from `jobwatch.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Jobs file (JSON array or JSON Lines) listing tracked job ids.
    #[serde(default)]
    pub jobs_path: Option<PathBuf>,

    /// Event log written by the monitor and tailed by the watcher.
    #[serde(default)]
    pub events_path: Option<PathBuf>,

    #[serde(default = "default_monitor_state_path")]
    pub monitor_state_path: PathBuf,

    #[serde(default = "default_watcher_state_path")]
    pub watcher_state_path: PathBuf,

    /// Seconds between monitor sweeps.
    #[serde(default = "default_monitor_poll_secs")]
    pub monitor_poll_secs: u64,

    /// Seconds between event log checks.
    #[serde(default = "default_watcher_poll_secs")]
    pub watcher_poll_secs: f64,

    /// Minutes without activity before a job is reported stuck.
    #[serde(default = "default_stuck_minutes")]
    pub stuck_minutes: u32,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bearer token for the job API.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Timeout for each remote call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub terminal_policy: TerminalPolicy,

    /// Shell command the watcher runs for each event.
    #[serde(default)]
    pub handler_command: Option<String>,
}

// Default state files: dotfiles in the working directory.
fn default_monitor_state_path() -> PathBuf {
    PathBuf::from(".jobwatch_monitor_state.json")
}

fn default_watcher_state_path() -> PathBuf {
    PathBuf::from(".jobwatch_watcher_state.json")
}

// Default sweep interval: 45s.
fn default_monitor_poll_secs() -> u64 {
    45
}

fn default_watcher_poll_secs() -> f64 {
    1.0
}

// Default stuck threshold: 20 minutes.
fn default_stuck_minutes() -> u32 {
    20
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            jobs_path: None,
            events_path: None,
            monitor_state_path: default_monitor_state_path(),
            watcher_state_path: default_watcher_state_path(),
            monitor_poll_secs: default_monitor_poll_secs(),
            watcher_poll_secs: default_watcher_poll_secs(),
            stuck_minutes: default_stuck_minutes(),
            api_base: default_api_base(),
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            terminal_policy: TerminalPolicy::default(),
            handler_command: None,
        }
    }
}

/// Command-line values for the monitor; `Some` wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct MonitorOverrides {
    pub jobs_path: Option<PathBuf>,
    pub events_path: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
    pub poll_secs: Option<u64>,
    pub stuck_minutes: Option<u32>,
    pub api_base: Option<String>,
    pub terminal_policy: Option<TerminalPolicy>,
}

/// Command-line values for the watcher; `Some` wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct WatcherOverrides {
    pub events_path: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
    pub poll_secs: Option<f64>,
    pub command: Option<String>,
}

impl WatchConfig {
    /// Loads `path`, or defaults if it does not exist, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<WatchConfig>(&contents)?)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("JULES_API_TOKEN")
            && !token.is_empty()
        {
            self.api_token = Some(token);
        }
        if let Some(base) = var("JULES_API_BASE")
            && !base.is_empty()
        {
            self.api_base = base;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Resolves monitor settings; the jobs file and event log are required.
    pub fn monitor_settings(&self, cli: MonitorOverrides) -> Result<(MonitorSettings, String)> {
        let jobs_path = cli
            .jobs_path
            .or_else(|| self.jobs_path.clone())
            .ok_or_else(|| WatchError::Config("jobs_path must be provided".into()))?;
        let events_path = cli
            .events_path
            .or_else(|| self.events_path.clone())
            .ok_or_else(|| WatchError::Config("events_path must be provided".into()))?;
        let stuck_minutes = cli.stuck_minutes.unwrap_or(self.stuck_minutes);
        let poll_secs = cli.poll_secs.unwrap_or(self.monitor_poll_secs);

        let settings = MonitorSettings {
            jobs_path,
            events_path,
            state_path: cli
                .state_path
                .unwrap_or_else(|| self.monitor_state_path.clone()),
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            stuck_threshold: TimeDelta::minutes(i64::from(stuck_minutes)),
            terminal_policy: cli.terminal_policy.unwrap_or(self.terminal_policy),
        };
        let api_base = cli.api_base.unwrap_or_else(|| self.api_base.clone());
        Ok((settings, api_base))
    }

    /// Resolves watcher settings and the handler command.
    pub fn watcher_settings(&self, cli: WatcherOverrides) -> Result<(TailerSettings, String)> {
        let events_path = cli
            .events_path
            .or_else(|| self.events_path.clone())
            .ok_or_else(|| WatchError::Config("events_path must be provided".into()))?;
        let command = cli
            .command
            .or_else(|| self.handler_command.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| WatchError::Config("a handler command must be provided".into()))?;
        let poll_secs = cli.poll_secs.unwrap_or(self.watcher_poll_secs);
        if !poll_secs.is_finite() || poll_secs <= 0.0 {
            return Err(WatchError::Config(format!(
                "watcher poll interval must be positive, got {poll_secs}"
            )));
        }

        let settings = TailerSettings {
            events_path,
            state_path: cli
                .state_path
                .unwrap_or_else(|| self.watcher_state_path.clone()),
            poll_interval: Duration::from_secs_f64(poll_secs),
        };
        Ok((settings, command))
    }
}
