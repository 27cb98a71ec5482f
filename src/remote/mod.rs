pub mod client;
pub mod error;
pub mod types;

pub use client::{DEFAULT_API_BASE, JobApi, JulesClient};
pub use error::RemoteError;
pub use types::{JobMessage, MessageBatch, StatusSnapshot};
