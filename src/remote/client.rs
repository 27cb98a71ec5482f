use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::RemoteError;
use super::types::{MessageBatch, StatusSnapshot};

pub const DEFAULT_API_BASE: &str = "https://jules.googleapis.com/v1";

/// Read-only view of the remote job service used by the monitor.
#[allow(async_fn_in_trait)]
pub trait JobApi {
    /// `GET jobs/{job_id}`.
    async fn job_status(&self, job_id: &str) -> Result<StatusSnapshot, RemoteError>;

    /// `GET jobs/{job_id}/messages`, starting after `cursor` when one is given.
    async fn job_messages(
        &self,
        job_id: &str,
        cursor: Option<&str>,
    ) -> Result<MessageBatch, RemoteError>;
}

/// HTTP client for the Jules job API.
pub struct JulesClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl JulesClient {
    /// Create a client for the public API at [`DEFAULT_API_BASE`].
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self, RemoteError> {
        Self::with_base_url(DEFAULT_API_BASE.to_string(), token, timeout)
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        base_url: String,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let invalid = |reason: String| RemoteError::InvalidBaseUrl {
            url: base_url.clone(),
            reason,
        };
        let parsed = Url::parse(&base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path".into()));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: parsed,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// `{base}/jobs/{job_id}[/{tail}]`, with the job id escaped as one path segment.
    fn job_url(&self, job_id: &str, tail: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("jobs").push(job_id);
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: Option<(&str, &str)>,
    ) -> Result<T, RemoteError> {
        let mut request = self
            .client
            .get(url.clone())
            .header("accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(pair) = query {
            request = request.query(&[pair]);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RemoteError::ApiError {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::ParseError {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

impl JobApi for JulesClient {
    async fn job_status(&self, job_id: &str) -> Result<StatusSnapshot, RemoteError> {
        let payload: Value = self.get_json(self.job_url(job_id, None), None).await?;
        Ok(StatusSnapshot::from_payload(payload))
    }

    async fn job_messages(
        &self,
        job_id: &str,
        cursor: Option<&str>,
    ) -> Result<MessageBatch, RemoteError> {
        let url = self.job_url(job_id, Some("messages"));
        let query = cursor.filter(|c| !c.is_empty()).map(|c| ("cursor", c));
        self.get_json(url, query).await
    }
}
