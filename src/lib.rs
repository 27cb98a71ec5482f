//! Watches long-running remote agent jobs by polling and turns their state
//! changes into a durable, ordered event log that a separate watcher tails.

pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod jobs;
pub mod observer;
pub mod remote;
pub mod store;
pub mod tailer;
pub mod ui;

pub use error::{Result, WatchError};
pub use event::{Event, EventBody, EventKind};
