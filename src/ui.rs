//! Terminal rendering for `jobwatch status`.
//!
//! Uses `console` styles: green for jobs that completed, red for jobs that
//! ended in a failure status, yellow for everything still in flight.

use console::Style;

use crate::observer::MonitorState;
use crate::remote::types::{SUCCESS_STATUS, TERMINAL_STATUSES};
use crate::tailer::WatcherState;

/// Styled, column-aligned view of the persisted monitor and watcher state.
pub struct StatusView {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
    bold: Style,
}

impl Default for StatusView {
    fn default() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
            bold: Style::new().bold(),
        }
    }
}

impl StatusView {
    fn status_style(&self, status: Option<&str>) -> &Style {
        match status {
            Some(SUCCESS_STATUS) => &self.green,
            Some(s) if TERMINAL_STATUSES.contains(&s) => &self.red,
            Some(_) => &self.yellow,
            None => &self.dim,
        }
    }

    /// Renders the job table followed by the watcher offset.
    pub fn render(&self, monitor: &MonitorState, watcher: &WatcherState) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}\n",
            self.bold
                .apply_to(format!("Tracked jobs ({})", monitor.len()))
        ));

        if monitor.is_empty() {
            out.push_str(&format!("  {}\n", self.dim.apply_to("none yet")));
        }

        let width = monitor.iter().map(|(id, _)| id.len()).max().unwrap_or(0);
        for (job_id, state) in monitor.iter() {
            let status = state.last_status.as_deref();
            let activity = state
                .last_activity
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "  {job_id:<width$}  {:<12}  {activity}  cursor={}\n",
                self.status_style(status)
                    .apply_to(status.unwrap_or("unknown")),
                state.cursor.as_deref().unwrap_or("-"),
            ));
        }

        out.push_str(&format!(
            "{} {}\n",
            self.bold.apply_to("Watcher offset:"),
            watcher.offset
        ));
        out
    }

    pub fn print(&self, monitor: &MonitorState, watcher: &WatcherState) {
        print!("{}", self.render(monitor, watcher));
    }
}
