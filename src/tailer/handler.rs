//! Event handlers invoked by the watcher.
//!
//! Delivery is "the handler was invoked"; whatever a handler reports back is
//! logged by the watcher and never retried.

use tokio::process::Command;
use tracing::debug;

use super::LoggedEvent;

/// Environment variable carrying the event JSON to a handler command.
pub const EVENT_ENV_VAR: &str = "JULES_EVENT";

/// Outcome of handing one event to a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The handler ran to completion.
    Handled,
    Failed {
        /// Process exit code, when there was one.
        exit_code: Option<i32>,
        reason: String,
    },
}

/// Something that reacts to events read from the log.
#[allow(async_fn_in_trait)]
pub trait EventHandler {
    /// Reacts to one event. Called once per log line, in log order.
    async fn handle(&self, event: &LoggedEvent) -> Delivery;
}

/// Runs a shell command per event with the event JSON in [`EVENT_ENV_VAR`].
#[derive(Debug, Clone)]
pub struct CommandHandler {
    command: String,
}

impl CommandHandler {
    /// `command` is run through `sh -c` (`cmd /C` on Windows).
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The shell command run per event.
    pub fn command(&self) -> &str {
        &self.command
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.command);
            cmd
        }
    }
}

impl EventHandler for CommandHandler {
    async fn handle(&self, event: &LoggedEvent) -> Delivery {
        let mut cmd = self.shell();
        cmd.env(EVENT_ENV_VAR, event.payload.to_string());

        match cmd.status().await {
            Ok(status) if status.success() => {
                debug!(command = %self.command, "Handler finished");
                Delivery::Handled
            }
            Ok(status) => Delivery::Failed {
                exit_code: status.code(),
                reason: format!("handler exited with {status}"),
            },
            Err(e) => Delivery::Failed {
                exit_code: None,
                reason: format!("failed to spawn handler: {e}"),
            },
        }
    }
}
