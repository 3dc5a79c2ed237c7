//! Access to the remote analysis service.
//!
//! The session only talks to the service through [`AnalysisBackend`], so the
//! HTTP client can be swapped for an in-memory one in tests.

pub mod http;

pub use http::{ClientConfig, HttpAnalysisClient};

use crate::models::{RawAnalysis, ServerStats};
use async_trait::async_trait;
use thiserror::Error;

/// Failures talking to the analysis service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("cannot connect to analysis service at {url}")]
    Connect { url: String },

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("analysis service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("unreadable response body: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether the service answered but the body could not be understood.
    pub fn is_malformed(&self) -> bool {
        matches!(self, BackendError::Decode(_))
    }
}

/// The three endpoints the dashboard consumes.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// `POST /analyze` for a single text.
    async fn analyze(&self, text: &str) -> Result<RawAnalysis, BackendError>;

    /// `GET /stats`, server-side aggregate counters.
    async fn stats(&self) -> Result<ServerStats, BackendError>;

    /// `GET /history`, recent results oldest first.
    async fn history(&self) -> Result<Vec<RawAnalysis>, BackendError>;
}

#[async_trait]
impl<B: AnalysisBackend + ?Sized> AnalysisBackend for std::sync::Arc<B> {
    async fn analyze(&self, text: &str) -> Result<RawAnalysis, BackendError> {
        (**self).analyze(text).await
    }

    async fn stats(&self) -> Result<ServerStats, BackendError> {
        (**self).stats().await
    }

    async fn history(&self) -> Result<Vec<RawAnalysis>, BackendError> {
        (**self).history().await
    }
}
