//! Data types returned by the remote job API.
//!
//! The status endpoint is kept as a raw JSON payload because events carry it
//! verbatim; only the `status` field is interpreted. Messages are typed on the
//! fields the question heuristic reads and keep everything else in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Remote statuses after which a job makes no further progress.
pub const TERMINAL_STATUSES: &[&str] = &["COMPLETED", "FAILED", "ERROR", "CANCELLED"];

/// The single terminal status that counts as success.
pub const SUCCESS_STATUS: &str = "COMPLETED";

/// Response of `GET jobs/{job_id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    /// Value of the payload's `status` field, if it is a string.
    pub status: Option<String>,
    /// The full response body.
    pub payload: Value,
}

impl StatusSnapshot {
    /// Wraps a status response, picking out its `status` field.
    pub fn from_payload(payload: Value) -> Self {
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self { status, payload }
    }

    /// Whether the job has stopped for good (see [`TERMINAL_STATUSES`]).
    pub fn is_terminal(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| TERMINAL_STATUSES.contains(&s))
    }

    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(SUCCESS_STATUS)
    }
}

/// One message in a job's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    /// Author role: "assistant"/"agent" for the remote agent, "user" for the operator.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Any other fields the API sends (ids, timestamps, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `GET jobs/{job_id}/messages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch {
    #[serde(default)]
    pub messages: Vec<JobMessage>,
    /// Continuation token; absent when the server has nothing newer to page to.
    #[serde(default)]
    pub next_cursor: Option<String>,
}
