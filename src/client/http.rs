//! reqwest-based client for the analysis service.

use super::{AnalysisBackend, BackendError};
use crate::models::{HistoryPayload, RawAnalysis, ServerStats};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the analysis service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// `POST /analyze` request body.
#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

/// HTTP implementation of [`AnalysisBackend`].
pub struct HttpAnalysisClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl HttpAnalysisClient {
    pub fn new(config: ClientConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BackendError::Request(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                seconds: self.config.timeout_seconds,
            }
        } else if e.is_connect() {
            BackendError::Connect {
                url: self.config.base_url.clone(),
            }
        } else {
            BackendError::Request(e.to_string())
        }
    }

    /// Send a request and decode a 2xx JSON body.
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisClient {
    async fn analyze(&self, text: &str) -> Result<RawAnalysis, BackendError> {
        let url = self.endpoint("/analyze");
        debug!("POST {} ({} chars)", url, text.chars().count());

        let request = self.http_client.post(&url).json(&AnalyzeRequest { text });
        self.fetch(request).await
    }

    async fn stats(&self) -> Result<ServerStats, BackendError> {
        let url = self.endpoint("/stats");
        debug!("GET {}", url);
        self.fetch(self.http_client.get(&url)).await
    }

    async fn history(&self) -> Result<Vec<RawAnalysis>, BackendError> {
        let url = self.endpoint("/history");
        debug!("GET {}", url);
        let payload: HistoryPayload = self.fetch(self.http_client.get(&url)).await?;
        Ok(payload.into_entries())
    }
}
