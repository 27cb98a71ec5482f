//! Durable event log tailer.
//!
//! Reads the event log from the persisted offset, hands each complete line to
//! an [`EventHandler`] in order, then persists the new offset. A crash between
//! handling and persisting re-delivers those events on restart, so delivery is
//! at-least-once across restarts and exactly-once within one run.

mod handler;
mod state;

pub use handler::{CommandHandler, Delivery, EVENT_ENV_VAR, EventHandler};
pub use state::WatcherState;

use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::event::EventKind;

/// One parsed line of the event log, as handed to handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedEvent {
    pub kind: EventKind,
    pub job_id: Option<String>,
    /// The full record exactly as written.
    pub payload: Value,
    /// Byte offset of the line in the log.
    pub offset: u64,
}

impl LoggedEvent {
    fn parse(line: &[u8], offset: u64) -> std::result::Result<Self, String> {
        let payload: Value = serde_json::from_slice(line).map_err(|e| e.to_string())?;
        if !payload.is_object() {
            return Err("record is not a JSON object".into());
        }
        let kind = payload
            .get("event")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or(EventKind::Unknown);
        let job_id = payload
            .get("job_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            kind,
            job_id,
            payload,
            offset,
        })
    }
}

/// Resolved watcher parameters.
#[derive(Debug, Clone)]
pub struct TailerSettings {
    /// Event log to tail.
    pub events_path: PathBuf,
    /// Where the consumed byte offset is persisted.
    pub state_path: PathBuf,
    /// Pause between passes once the log is drained.
    pub poll_interval: Duration,
}

/// What one pass over the log did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// The log did not exist yet.
    pub log_missing: bool,
    /// Events handed to the handler, whatever it reported.
    pub delivered: usize,
    /// Of those, the ones the handler reported as failed.
    pub failed: usize,
    /// Complete lines that were not a JSON object.
    pub skipped: usize,
}

/// Follows the event log and hands each new event to `H`.
pub struct EventTailer<H> {
    handler: H,
    settings: TailerSettings,
    state: WatcherState,
    /// Offset last written to the state file.
    committed: u64,
}

impl<H: EventHandler> EventTailer<H> {
    /// Creates a tailer resuming from the persisted offset.
    pub fn new(handler: H, settings: TailerSettings) -> Result<Self> {
        let state = WatcherState::load(&settings.state_path)?;
        Ok(Self {
            handler,
            settings,
            committed: state.offset,
            state,
        })
    }

    /// Byte offset of the first line not yet handed to the handler.
    pub fn offset(&self) -> u64 {
        self.state.offset
    }

    /// Offset as of the last successful [`commit`](Self::commit).
    pub fn committed_offset(&self) -> u64 {
        self.committed
    }

    /// The handler events are delivered to.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Delivers every complete line after the current offset, without persisting.
    ///
    /// An unterminated trailing line is left for a later pass. Complete lines
    /// that do not parse are skipped.
    pub async fn dispatch_pending(&mut self) -> Result<DrainReport> {
        let mut report = DrainReport::default();

        let mut file = match File::open(&self.settings.events_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                report.log_missing = true;
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata().await?.len();
        if len < self.state.offset {
            warn!(
                len,
                offset = self.state.offset,
                "Event log is shorter than the saved offset; delete the watcher state to replay it"
            );
            return Ok(report);
        }

        file.seek(SeekFrom::Start(self.state.offset)).await?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line).await?;
            if read == 0 || line.last() != Some(&b'\n') {
                break;
            }
            let line_start = self.state.offset;
            let body = line.trim_ascii();

            if !body.is_empty() {
                match LoggedEvent::parse(body, line_start) {
                    Ok(event) => {
                        self.deliver(&event, &mut report).await;
                    }
                    Err(reason) => {
                        warn!(offset = line_start, "Skipping malformed event line: {reason}");
                        report.skipped += 1;
                    }
                }
            }
            self.state.offset = line_start + read as u64;
        }

        Ok(report)
    }

    async fn deliver(&self, event: &LoggedEvent, report: &mut DrainReport) {
        info!(
            kind = %event.kind,
            job_id = event.job_id.as_deref().unwrap_or("unknown"),
            "Processing event"
        );
        match self.handler.handle(event).await {
            Delivery::Handled => report.delivered += 1,
            Delivery::Failed { exit_code, reason } => {
                warn!(?exit_code, offset = event.offset, "Handler failed: {reason}");
                report.delivered += 1;
                report.failed += 1;
            }
        }
    }

    /// Persists the current offset.
    pub fn commit(&mut self) -> Result<()> {
        self.state.save(&self.settings.state_path)?;
        self.committed = self.state.offset;
        Ok(())
    }

    /// One pass: deliver what is available, then persist the offset if it
    /// differs from the last committed one.
    ///
    /// Lines handled before a read error are committed before the error is
    /// returned.
    pub async fn drain(&mut self) -> Result<DrainReport> {
        let result = self.dispatch_pending().await;
        if self.state.offset != self.committed {
            self.commit()?;
        }
        result
    }

    /// Tails the log forever at the configured interval, or once when `once` is set.
    pub async fn run(&mut self, once: bool) {
        info!(
            events = %self.settings.events_path.display(),
            offset = self.state.offset,
            "Event watcher started"
        );
        loop {
            match self.drain().await {
                Ok(report) if report.log_missing => {
                    debug!("Event log does not exist yet, waiting");
                }
                Ok(report) => {
                    if report.delivered + report.skipped > 0 {
                        debug!(
                            delivered = report.delivered,
                            failed = report.failed,
                            skipped = report.skipped,
                            offset = self.state.offset,
                            "Drained event log"
                        );
                    }
                }
                Err(e) => error!("Error reading event log: {e}"),
            }
            if once {
                return;
            }
            sleep(self.settings.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<LoggedEvent>>,
        fail_kind: Option<EventKind>,
    }

    impl Recorder {
        fn job_ids(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.job_id.clone().unwrap_or_default())
                .collect()
        }
    }

    impl EventHandler for Recorder {
        async fn handle(&self, event: &LoggedEvent) -> Delivery {
            self.seen.lock().unwrap().push(event.clone());
            if Some(event.kind) == self.fail_kind {
                Delivery::Failed {
                    exit_code: Some(1),
                    reason: "boom".into(),
                }
            } else {
                Delivery::Handled
            }
        }
    }

    fn settings(dir: &TempDir) -> TailerSettings {
        TailerSettings {
            events_path: dir.path().join("events.jsonl"),
            state_path: dir.path().join("watcher_state.json"),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn append(dir: &TempDir, text: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.path().join("events.jsonl"))
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn line(kind: &str, job: &str) -> String {
        format!("{{\"event\":\"{kind}\",\"job_id\":\"{job}\"}}\n")
    }

    #[tokio::test]
    async fn missing_log_is_reported_and_offset_stays() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        let report = tailer.drain().await.unwrap();
        assert!(report.log_missing);
        assert_eq!(tailer.offset(), 0);
        assert!(!dir.path().join("watcher_state.json").exists());
    }

    #[tokio::test]
    async fn delivers_in_order_and_persists_offset() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!("{}{}", line("question", "A"), line("stuck", "B"));
        append(&dir, &text);

        let mut tailer = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        let report = tailer.drain().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(tailer.handler().job_ids(), vec!["A", "B"]);
        assert_eq!(tailer.offset(), text.len() as u64);

        let saved = WatcherState::load(&dir.path().join("watcher_state.json")).unwrap();
        assert_eq!(saved.offset, text.len() as u64);

        let seen = tailer.handler().seen.lock().unwrap().clone();
        assert_eq!(seen[0].kind, EventKind::Question);
        assert_eq!(seen[0].offset, 0);
        assert_eq!(seen[1].offset, line("question", "A").len() as u64);
    }

    #[tokio::test]
    async fn truncated_trailing_line_waits_for_completion() {
        let dir = tempfile::tempdir().unwrap();
        let valid = format!(
            "{}{}{}",
            line("completed", "J1"),
            line("stuck", "J2"),
            line("question", "J3")
        );
        append(&dir, &valid);
        append(&dir, "{\"event\":\"error\",\"job_");

        let mut tailer = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        tailer.drain().await.unwrap();
        assert_eq!(tailer.handler().job_ids(), vec!["J1", "J2", "J3"]);
        assert_eq!(tailer.offset(), valid.len() as u64);

        // Restart: nothing is re-delivered, the fragment is still incomplete.
        let mut restarted = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        let report = restarted.drain().await.unwrap();
        assert_eq!(report.delivered, 0);

        append(&dir, "id\":\"J4\"}\n");
        restarted.drain().await.unwrap();
        assert_eq!(restarted.handler().job_ids(), vec!["J4"]);
    }

    #[tokio::test]
    async fn malformed_and_blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!(
            "{}not json at all\n\n[1,2]\n{}",
            line("stuck", "A"),
            line("paused", "B")
        );
        append(&dir, &text);

        let mut tailer = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        let report = tailer.drain().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(tailer.offset(), text.len() as u64);

        let seen = tailer.handler().seen.lock().unwrap().clone();
        assert_eq!(seen[1].kind, EventKind::Unknown);
    }

    #[tokio::test]
    async fn handler_failure_does_not_block_later_events() {
        let dir = tempfile::tempdir().unwrap();
        append(&dir, &format!("{}{}", line("error", "A"), line("completed", "B")));

        let recorder = Recorder {
            fail_kind: Some(EventKind::Error),
            ..Default::default()
        };
        let mut tailer = EventTailer::new(recorder, settings(&dir)).unwrap();
        let report = tailer.drain().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(tailer.handler().job_ids(), vec!["A", "B"]);

        // Not retried on the next pass.
        let report = tailer.drain().await.unwrap();
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn crash_before_commit_redelivers_once() {
        let dir = tempfile::tempdir().unwrap();
        append(&dir, &line("stuck", "A"));
        let mut first = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        first.drain().await.unwrap();

        append(&dir, &line("question", "B"));
        let mut crashed = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        crashed.dispatch_pending().await.unwrap();
        assert_eq!(crashed.handler().job_ids(), vec!["B"]);
        drop(crashed);

        let mut recovered = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        recovered.drain().await.unwrap();
        assert_eq!(recovered.handler().job_ids(), vec!["B"]);

        let mut again = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        again.drain().await.unwrap();
        assert!(again.handler().job_ids().is_empty());
    }

    #[tokio::test]
    async fn drain_commits_offset_left_behind_by_an_earlier_pass() {
        let dir = tempfile::tempdir().unwrap();
        let text = line("stuck", "A");
        append(&dir, &text);

        let mut tailer = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        tailer.dispatch_pending().await.unwrap();
        assert_eq!(tailer.committed_offset(), 0);

        // No new lines, but the handled ones still get persisted.
        let report = tailer.drain().await.unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(tailer.committed_offset(), text.len() as u64);
        let saved = WatcherState::load(&dir.path().join("watcher_state.json")).unwrap();
        assert_eq!(saved.offset, text.len() as u64);
    }

    #[tokio::test]
    async fn shrunken_log_does_not_rewind_offset() {
        let dir = tempfile::tempdir().unwrap();
        append(&dir, &format!("{}{}", line("stuck", "A"), line("stuck", "B")));
        let mut tailer = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        tailer.drain().await.unwrap();
        let offset = tailer.offset();

        fs::write(dir.path().join("events.jsonl"), line("stuck", "C")).unwrap();
        let report = tailer.drain().await.unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(tailer.offset(), offset);
    }

    #[tokio::test]
    async fn run_once_drains_and_returns() {
        let dir = tempfile::tempdir().unwrap();
        append(&dir, &line("completed", "J1"));
        let mut tailer = EventTailer::new(Recorder::default(), settings(&dir)).unwrap();
        tailer.run(true).await;
        assert_eq!(tailer.handler().job_ids(), vec!["J1"]);
    }
}
