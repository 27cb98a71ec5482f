use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store;

/// What the monitor remembers about one job between sweeps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
    /// Pagination token of the last consumed message batch.
    #[serde(default)]
    pub cursor: Option<String>,
    /// Last remote status seen.
    #[serde(default)]
    pub last_status: Option<String>,
    /// Last status change or actionable condition.
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
}

/// Persisted `job_id → JobState` table, rewritten wholesale after every sweep.
///
/// Deleting the file forces a full re-scan: no cursors, no prior statuses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorState {
    jobs: BTreeMap<String, JobState>,
}

impl MonitorState {
    /// Loads the snapshot at `path`; an absent file is an empty table.
    pub fn load(path: &Path) -> Result<Self> {
        store::load_json_or_default(path)
    }

    /// Atomically replaces the snapshot at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        store::save_json(path, self)
    }

    /// State recorded for `job_id`, if it was ever polled.
    pub fn get(&self, job_id: &str) -> Option<&JobState> {
        self.jobs.get(job_id)
    }

    /// Records `state` for `job_id`, replacing any previous entry.
    pub fn insert(&mut self, job_id: &str, state: JobState) {
        self.jobs.insert(job_id.to_string(), state);
    }

    /// Jobs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JobState)> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// When a job sitting in a terminal status produces a terminal event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalPolicy {
    /// Once, in the sweep where the recorded status changes into the terminal one.
    #[default]
    OnTransition,
    /// On every sweep until the job is removed from the jobs file.
    EveryCycle,
}

impl fmt::Display for TerminalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalPolicy::OnTransition => write!(f, "on-transition"),
            TerminalPolicy::EveryCycle => write!(f, "every-cycle"),
        }
    }
}
