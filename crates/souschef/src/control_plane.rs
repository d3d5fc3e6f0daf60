use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shared::protocol::{ControlRequest, TelemetrySnapshot};

/// Request/response access to the remote control service.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn latest_meta(&self) -> Result<TelemetrySnapshot>;
    async fn send_command(&self, request: &ControlRequest) -> Result<()>;
}

/// Talks to the control service over HTTP, posting form-encoded requests to
/// its base URL.
pub struct HttpControlPlane {
    http: Client,
    base_url: String,
}

impl HttpControlPlane {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build control service HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, request: &ControlRequest) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(&self.base_url)
            .form(request)
            .send()
            .await
            .with_context(|| format!("{} request to {} failed", request.name(), self.base_url))?
            .error_for_status()
            .with_context(|| format!("{} rejected by control service", request.name()))?;
        Ok(response)
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn latest_meta(&self) -> Result<TelemetrySnapshot> {
        let body: Value = self
            .post(&ControlRequest::GetLatestMeta)
            .await?
            .json()
            .await
            .context("latest meta response is not JSON")?;
        TelemetrySnapshot::from_json_value(body)
            .context("latest meta response has unexpected shape")
    }

    async fn send_command(&self, request: &ControlRequest) -> Result<()> {
        self.post(request).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/control_plane_tests.rs"]
mod tests;
