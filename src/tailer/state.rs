use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store;

/// Persisted read position of the watcher.
///
/// `offset` is the first unread byte of the event log; it only ever moves
/// forward, and only past complete lines. Deleting the file replays the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherState {
    #[serde(default)]
    pub offset: u64,
}

impl WatcherState {
    /// Loads the offset; an absent file starts from the beginning of the log.
    pub fn load(path: &Path) -> Result<Self> {
        store::load_json_or_default(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        store::save_json(path, self)
    }
}
