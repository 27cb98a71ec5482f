//! The list of jobs the monitor tracks.
//!
//! The jobs file is either a JSON array or JSON Lines. Each entry is a bare
//! job id string or an object with `job_id` and optional `metadata`. Entries
//! without a usable id are skipped.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, WatchError};
use crate::store;

/// A tracked job as listed in the jobs file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntry {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl JobEntry {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(id) if !id.trim().is_empty() => Some(Self {
                job_id: id,
                metadata: None,
            }),
            Value::Object(mut map) => {
                let job_id = match map.remove("job_id") {
                    Some(Value::String(id)) if !id.trim().is_empty() => id,
                    _ => return None,
                };
                Some(Self {
                    job_id,
                    metadata: map.remove("metadata").filter(|m| !m.is_null()),
                })
            }
            _ => None,
        }
    }
}

/// Reads the jobs file. A missing or empty file means no jobs.
pub fn load_jobs(path: &Path) -> Result<Vec<JobEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)?;
    parse_jobs(&contents).map_err(|reason| WatchError::JobList {
        path: path.to_path_buf(),
        reason,
    })
}

fn parse_jobs(contents: &str) -> std::result::Result<Vec<JobEntry>, String> {
    let contents = contents.trim();
    if contents.is_empty() {
        return Ok(Vec::new());
    }

    let raw: Vec<Value> = if contents.starts_with('[') {
        serde_json::from_str(contents).map_err(|e| e.to_string())?
    } else {
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| format!("line {}: {e}", i + 1))
            })
            .collect::<std::result::Result<_, _>>()?
    };

    let total = raw.len();
    let entries: Vec<JobEntry> = raw.into_iter().filter_map(JobEntry::from_value).collect();
    if entries.len() < total {
        debug!(skipped = total - entries.len(), "Ignoring job entries without a job_id");
    }
    Ok(entries)
}

/// Adds a job to the jobs file so the monitor picks it up on its next sweep.
///
/// The file keeps its format: a JSON array is rewritten atomically with the
/// entry at the end, anything else gets one more JSON Lines record.
pub fn register_job(path: &Path, job_id: &str, metadata: Option<Value>) -> Result<JobEntry> {
    if job_id.trim().is_empty() {
        return Err(WatchError::Config("job_id must not be empty".into()));
    }
    let entry = JobEntry {
        job_id: job_id.to_string(),
        metadata: Some(metadata.unwrap_or_else(|| Value::Object(Default::default()))),
    };

    let existing = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };

    if existing.trim_start().starts_with('[') {
        let mut raw: Vec<Value> =
            serde_json::from_str(&existing).map_err(|e| WatchError::JobList {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        raw.push(serde_json::to_value(&entry)?);
        store::save_json(path, &raw)?;
    } else {
        // A hand-written file may lack the final newline.
        if !existing.is_empty() && !existing.ends_with('\n') {
            let mut file = OpenOptions::new().append(true).open(path)?;
            file.write_all(b"\n")?;
        }
        store::append_jsonl(path, &entry)?;
    }
    debug!(job_id, path = %path.display(), "Registered job");
    Ok(entry)
}
