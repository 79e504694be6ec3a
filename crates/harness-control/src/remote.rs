//! Client-side counterpart of the control-plane proxy.
//!
//! Implements the same lifecycle contract as the local supervisor, but
//! every operation is a single retried HTTP call against the proxy's
//! corresponding route. Holds no process handle and no log buffer of its
//! own.

use std::collections::HashMap;

use async_trait::async_trait;

use harness_common::{FlushStatus, Result, ServerLifecycle, DEFAULT_MAX_ATTEMPTS};
use harness_retry::{HttpOptions, RetryingClient};

use crate::types::{ConfigRequest, LogsResponse, PingResponse};

/// Remote driver for a supervisor living behind a control-plane proxy.
pub struct RemoteServer {
    base_url: String,
    client: RetryingClient,
    max_attempts: u32,
    http_api_version: Option<String>,
}

impl RemoteServer {
    /// Creates a client for the proxy at `base_url`
    /// (e.g. `http://127.0.0.1:8899`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: RetryingClient::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            http_api_version: None,
        }
    }

    /// Bounds the attempt budget for every call this client makes.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), route)
    }
}

#[async_trait]
impl ServerLifecycle for RemoteServer {
    async fn load_config(&mut self, path_to_config: &str) -> Result<()> {
        let options = HttpOptions::post_json(&ConfigRequest {
            path_to_config: path_to_config.to_string(),
        })?;
        self.client
            .request(&self.endpoint("/config"), &options, self.max_attempts)
            .await?;
        Ok(())
    }

    async fn start(&mut self, env: HashMap<String, String>) -> Result<String> {
        let options = HttpOptions::post_json(&env)?;
        self.client
            .request(&self.endpoint("/start"), &options, self.max_attempts)
            .await?;
        self.ping().await
    }

    async fn ping(&mut self) -> Result<String> {
        let response = self
            .client
            .request(&self.endpoint("/ping"), &HttpOptions::get(), self.max_attempts)
            .await?;
        let ping: PingResponse = response.json()?;
        self.http_api_version = Some(ping.http_api_version.clone());
        Ok(ping.http_api_version)
    }

    async fn flush(&mut self) -> Result<FlushStatus> {
        let response = self
            .client
            .request(&self.endpoint("/flush"), &HttpOptions::post(), self.max_attempts)
            .await?;
        Ok(FlushStatus {
            status: response.status.as_u16(),
        })
    }

    async fn stop(&mut self) -> Result<()> {
        self.client
            .request(&self.endpoint("/stop"), &HttpOptions::post(), self.max_attempts)
            .await?;
        Ok(())
    }

    async fn kill_all(&mut self) -> Result<()> {
        self.client
            .request(&self.endpoint("/killAll"), &HttpOptions::post(), self.max_attempts)
            .await?;
        Ok(())
    }

    async fn logs(&mut self) -> Result<String> {
        let response = self
            .client
            .request(&self.endpoint("/logs"), &HttpOptions::get(), self.max_attempts)
            .await?;
        let logs: LogsResponse = response.json()?;
        Ok(logs.logs)
    }

    fn http_api_version(&self) -> Option<&str> {
        self.http_api_version.as_deref()
    }
}
