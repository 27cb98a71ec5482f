//! Records appended to the event log.
//!
//! On disk an event is one JSON object per line:
//!
//! ```json
//! {"event":"stuck","event_id":"…","job_id":"J2","observed_at":"…","last_activity":"…"}
//! ```
//!
//! The `event` tag selects the kind-specific fields carried by [`EventBody`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::remote::{JobMessage, StatusSnapshot};

/// The kind tag of an event line. Readers map unrecognised tags to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Question,
    Completed,
    Error,
    Stuck,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Question => write!(f, "question"),
            EventKind::Completed => write!(f, "completed"),
            EventKind::Error => write!(f, "error"),
            EventKind::Stuck => write!(f, "stuck"),
            EventKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Kind-specific part of an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum EventBody {
    /// The agent asked something and is waiting for input.
    Question { message: JobMessage },
    /// The job reached the successful terminal status.
    Completed { status: String, payload: Value },
    /// Terminal failure (`status` + `payload`) or a failed remote call (`message`).
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// No activity for longer than the stuck threshold.
    Stuck {
        last_activity: Option<DateTime<Utc>>,
    },
}

/// An immutable, actionable observation about a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique per emission; lets handlers drop redeliveries.
    pub event_id: Uuid,
    /// `None` only for monitor-level failures not tied to a job.
    pub job_id: Option<String>,
    pub observed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: EventBody,
}

impl Event {
    fn new(job_id: Option<&str>, observed_at: DateTime<Utc>, body: EventBody) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            job_id: job_id.map(str::to_string),
            observed_at,
            body,
        }
    }

    /// A job asked the operator something.
    pub fn question(job_id: &str, message: JobMessage, now: DateTime<Utc>) -> Self {
        Self::new(Some(job_id), now, EventBody::Question { message })
    }

    /// `completed` for the success status, `error` for every other terminal status.
    pub fn terminal(job_id: &str, snapshot: &StatusSnapshot, now: DateTime<Utc>) -> Self {
        let status = snapshot.status.clone().unwrap_or_default();
        let body = if snapshot.is_success() {
            EventBody::Completed {
                status,
                payload: snapshot.payload.clone(),
            }
        } else {
            EventBody::Error {
                status: Some(status),
                message: None,
                payload: Some(snapshot.payload.clone()),
            }
        };
        Self::new(Some(job_id), now, body)
    }

    /// The job's status could not be fetched this sweep.
    pub fn remote_failure(job_id: &str, message: String, now: DateTime<Utc>) -> Self {
        Self::new(
            Some(job_id),
            now,
            EventBody::Error {
                status: None,
                message: Some(message),
                payload: None,
            },
        )
    }

    /// The sweep itself failed; not tied to any job.
    pub fn monitor_failure(message: String, now: DateTime<Utc>) -> Self {
        Self::new(
            None,
            now,
            EventBody::Error {
                status: None,
                message: Some(format!("monitor error: {message}")),
                payload: None,
            },
        )
    }

    /// No activity for at least the stuck threshold.
    pub fn stuck(job_id: &str, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self::new(Some(job_id), now, EventBody::Stuck { last_activity })
    }

    pub fn kind(&self) -> EventKind {
        match self.body {
            EventBody::Question { .. } => EventKind::Question,
            EventBody::Completed { .. } => EventKind::Completed,
            EventBody::Error { .. } => EventKind::Error,
            EventBody::Stuck { .. } => EventKind::Stuck,
        }
    }
}
