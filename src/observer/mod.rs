//! The job state monitor.
//!
//! Each sweep reads the jobs file, polls every job once, in order, and appends
//! at most one actionable event per job to the event log:
//!
//! ```text
//! status fetch ─fail──────────────────────────────► error (message)
//!      │
//!      ├─ terminal ─(per TerminalPolicy)──────────► completed | error (status)
//!      │
//!      └─ messages since cursor ─question found───► question
//!                 │
//!                 └─ idle ≥ stuck threshold ──────► stuck (then reset)
//! ```
//!
//! Sweeps never overlap, so a job's state is only ever mutated by one cycle.

mod classify;
mod state;

pub use classify::{first_question, is_question, stuck_due};
pub use state::{JobState, MonitorState, TerminalPolicy};

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::event::Event;
use crate::jobs;
use crate::remote::JobApi;
use crate::store;

/// Resolved monitor parameters.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Jobs file re-read at the start of every sweep.
    pub jobs_path: PathBuf,
    /// Event log the monitor appends to.
    pub events_path: PathBuf,
    /// Snapshot of per-job [`JobState`], rewritten after every cycle.
    pub state_path: PathBuf,
    /// Pause between the end of one sweep and the start of the next.
    pub poll_interval: Duration,
    /// Inactivity after which a job is reported stuck.
    pub stuck_threshold: TimeDelta,
    pub terminal_policy: TerminalPolicy,
}

/// Result of one sweep over the jobs file.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Distinct jobs whose state was updated.
    pub polled: usize,
    /// Events appended to the log, in order.
    pub emitted: Vec<Event>,
}

/// Polls remote jobs and turns their state changes into events.
pub struct Monitor<A> {
    api: A,
    settings: MonitorSettings,
    state: MonitorState,
}

impl<A: JobApi> Monitor<A> {
    /// Creates a monitor, resuming from the persisted state file if there is one.
    pub fn new(api: A, settings: MonitorSettings) -> Result<Self> {
        let state = MonitorState::load(&settings.state_path)?;
        Ok(Self::with_state(api, settings, state))
    }

    /// Creates a monitor with an explicit starting state; nothing is read from disk.
    pub fn with_state(api: A, settings: MonitorSettings, state: MonitorState) -> Self {
        Self {
            api,
            settings,
            state,
        }
    }

    /// Per-job state as of the last sweep.
    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// The settings this monitor was created with.
    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Polls every listed job once and appends the resulting events.
    ///
    /// A job's updated state is only kept once its event is on disk, so an
    /// append failure leaves that job to be observed again next sweep. The
    /// remaining jobs are still polled; the first append error is returned
    /// once the sweep is over.
    pub async fn sweep(&mut self, now: DateTime<Utc>) -> Result<SweepReport> {
        let entries = jobs::load_jobs(&self.settings.jobs_path)?;
        let mut report = SweepReport::default();
        let mut seen = HashSet::new();
        let mut first_error = None;

        for entry in entries {
            if !seen.insert(entry.job_id.clone()) {
                continue;
            }
            let job_id = entry.job_id.as_str();
            let mut job_state = self.state.get(job_id).cloned().unwrap_or_default();

            let event = self.observe(job_id, &mut job_state, now).await;
            if let Some(event) = event {
                if let Err(e) = store::append_jsonl(&self.settings.events_path, &event) {
                    error!(job_id, kind = %event.kind(), "Failed to append event: {e}");
                    first_error.get_or_insert(e);
                    continue;
                }
                info!(job_id, kind = %event.kind(), "Emitted event");
                report.emitted.push(event);
            }
            self.state.insert(job_id, job_state);
            report.polled += 1;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Runs one sweep and persists state. Never fails: sweep-level errors
    /// become a job-less `error` event.
    pub async fn cycle(&mut self, now: DateTime<Utc>) {
        match self.sweep(now).await {
            Ok(report) => {
                debug!(
                    polled = report.polled,
                    emitted = report.emitted.len(),
                    "Sweep finished"
                );
            }
            Err(e) => {
                error!("Sweep failed: {e}");
                let event = Event::monitor_failure(e.to_string(), now);
                if let Err(e) = store::append_jsonl(&self.settings.events_path, &event) {
                    error!("Could not record sweep failure in event log: {e}");
                }
            }
        }

        if let Err(e) = self.state.save(&self.settings.state_path) {
            error!(path = %self.settings.state_path.display(), "Failed to persist monitor state: {e}");
        }
    }

    /// Sweeps forever at the configured interval, or once when `once` is set.
    pub async fn run(&mut self, once: bool) {
        info!(
            jobs = %self.settings.jobs_path.display(),
            events = %self.settings.events_path.display(),
            poll_secs = self.settings.poll_interval.as_secs(),
            terminal_policy = %self.settings.terminal_policy,
            "Monitor started"
        );
        loop {
            self.cycle(Utc::now()).await;
            if once {
                return;
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    /// Classifies one job for this sweep, updating `state` in place.
    async fn observe(&self, job_id: &str, state: &mut JobState, now: DateTime<Utc>) -> Option<Event> {
        let snapshot = match self.api.job_status(job_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(job_id, "Status fetch failed: {e}");
                return Some(Event::remote_failure(job_id, e.to_string(), now));
            }
        };

        let previous = state.last_status.clone();
        if let Some(status) = &snapshot.status
            && previous.as_ref() != Some(status)
        {
            debug!(job_id, from = ?previous, to = %status, "Status changed");
            state.last_status = Some(status.clone());
            state.last_activity = Some(now);
        }

        if snapshot.is_terminal() {
            let transitioned = previous != snapshot.status;
            return match self.settings.terminal_policy {
                TerminalPolicy::EveryCycle => Some(Event::terminal(job_id, &snapshot, now)),
                TerminalPolicy::OnTransition if transitioned => {
                    Some(Event::terminal(job_id, &snapshot, now))
                }
                TerminalPolicy::OnTransition => None,
            };
        }

        match self.api.job_messages(job_id, state.cursor.as_deref()).await {
            Ok(batch) => {
                if let Some(next) = batch.next_cursor.filter(|c| !c.is_empty()) {
                    state.cursor = Some(next);
                }
                if let Some(message) = first_question(&batch.messages) {
                    state.last_activity = Some(now);
                    return Some(Event::question(job_id, message.clone(), now));
                }
            }
            // Retried next sweep.
            Err(e) => debug!(job_id, "Message fetch failed: {e}"),
        }

        if stuck_due(state.last_activity, self.settings.stuck_threshold, now) {
            let event = Event::stuck(job_id, state.last_activity, now);
            state.last_activity = Some(now);
            return Some(event);
        }

        None
    }
}
