use std::path::PathBuf;

use thiserror::Error;

pub use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Malformed job list {path}: {reason}")]
    JobList { path: PathBuf, reason: String },

    #[error("Remote API error: {0}")]
    Remote(#[from] RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T, E = WatchError> = std::result::Result<T, E>;
