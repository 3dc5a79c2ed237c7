//! Data models for the analysis dashboard.
//!
//! This module contains the normalized result envelope shared by the
//! session state model, plus the loosely-typed wire shapes returned by the
//! remote analysis service and the normalization that bridges the two.

use crate::present::{classify_risk, RiskLevel};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Lowest and highest risk score a result envelope can carry.
pub const RISK_MIN: f64 = 0.0;
pub const RISK_MAX: f64 = 100.0;

/// Severity level of a detected threat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Low severity - borderline or stylistic concerns
    Low,
    /// Medium severity - content worth a second look
    Medium,
    /// High severity - clearly harmful content
    High,
    /// Critical severity - content that must be blocked
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🟠",
            Severity::Critical => "🔴",
        }
    }

    /// Parse a severity label case-insensitively.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" | "moderate" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// All severities, lowest first.
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];
}

/// A single threat reported for an analyzed text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Threat {
    /// Threat category as reported by the service (e.g. "prompt_injection").
    pub category: String,
    /// Ordinal severity.
    pub severity: Severity,
    /// Detector confidence, clamped into [0, 1].
    pub confidence: f64,
    /// Human-readable description.
    pub description: String,
}

/// Normalized outcome of one analysis request.
///
/// Envelopes are built once and never mutated afterwards; the session shares
/// them behind `Arc` so presentation code only ever gets read access.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    /// Service-supplied id, or a locally generated UUID.
    pub id: String,
    /// The exact text that was sent for analysis.
    pub submitted_text: String,
    /// Overall verdict.
    pub is_safe: bool,
    /// Risk score clamped into [0, 100].
    pub risk_score: f64,
    /// Threats in the order the service reported them.
    pub threats: Vec<Threat>,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
    /// Server-side processing time, informational only.
    pub processing_time_ms: u64,
    /// Processing stage that produced the verdict, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl ResultEnvelope {
    /// Highest severity among the reported threats.
    pub fn max_severity(&self) -> Option<Severity> {
        self.threats.iter().map(|t| t.severity).max()
    }

    /// Display category for this result's risk score.
    pub fn risk_level(&self) -> RiskLevel {
        classify_risk(self.risk_score)
    }
}

/// Reasons a service payload cannot be turned into a [`ResultEnvelope`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("response is missing a risk score")]
    MissingRiskScore,

    #[error("risk score is not a finite number")]
    NonFiniteRisk,

    #[error("threat #{index} has unknown severity '{label}'")]
    UnknownSeverity { index: usize, label: String },
}

/// Threat record as sent over the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawThreat {
    #[serde(default, alias = "type", alias = "threat_type")]
    pub category: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, alias = "message", alias = "details")]
    pub description: Option<String>,
}

/// A scalar the service may send as either a JSON string or a number.
///
/// Anything else lands in `Other` so one odd field does not fail the whole
/// payload; normalization treats it as absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireScalar {
    Text(String),
    Number(serde_json::Number),
    Other(serde_json::Value),
}

impl WireScalar {
    fn into_text(self) -> Option<String> {
        match self {
            WireScalar::Text(text) => Some(text),
            WireScalar::Number(number) => Some(number.to_string()),
            WireScalar::Other(_) => None,
        }
    }

    fn into_timestamp(self) -> Option<DateTime<Utc>> {
        match self {
            WireScalar::Text(text) => parse_timestamp(&text),
            WireScalar::Number(number) => number.as_f64().and_then(epoch_to_timestamp),
            WireScalar::Other(_) => None,
        }
    }
}

impl From<&str> for WireScalar {
    fn from(value: &str) -> Self {
        WireScalar::Text(value.to_string())
    }
}

impl From<String> for WireScalar {
    fn from(value: String) -> Self {
        WireScalar::Text(value)
    }
}

/// Analysis response as sent over the wire.
///
/// Every field is optional here; [`RawAnalysis::normalize`] decides which
/// ones are required and how the rest are defaulted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAnalysis {
    #[serde(default, alias = "analysis_id", alias = "analysisId")]
    pub id: Option<WireScalar>,
    #[serde(default, alias = "submitted_text", alias = "submittedText")]
    pub text: Option<String>,
    #[serde(default, alias = "isSafe", alias = "safe")]
    pub is_safe: Option<bool>,
    #[serde(default, alias = "riskScore", alias = "risk")]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub threats: Option<Vec<RawThreat>>,
    #[serde(default, alias = "created_at", alias = "createdAt")]
    pub timestamp: Option<WireScalar>,
    #[serde(default, alias = "processingTimeMs", alias = "processing_time")]
    pub processing_time_ms: Option<f64>,
    #[serde(default, alias = "processing_tier", alias = "processingTier")]
    pub tier: Option<String>,
}

impl RawAnalysis {
    /// Build an envelope for `submitted_text` from this payload.
    pub fn normalize(self, submitted_text: String) -> Result<ResultEnvelope, NormalizeError> {
        let risk = self.risk_score.ok_or(NormalizeError::MissingRiskScore)?;
        if !risk.is_finite() {
            return Err(NormalizeError::NonFiniteRisk);
        }
        let risk_score = risk.clamp(RISK_MIN, RISK_MAX);

        let threats = self
            .threats
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, raw)| normalize_threat(index, raw))
            .collect::<Result<Vec<_>, _>>()?;

        // Without an explicit verdict, anything scored High or carrying a
        // high/critical threat counts as unsafe.
        let is_safe = self.is_safe.unwrap_or_else(|| {
            classify_risk(risk_score) != RiskLevel::High
                && threats.iter().all(|t| t.severity < Severity::High)
        });

        let id = self
            .id
            .and_then(WireScalar::into_text)
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let timestamp = self
            .timestamp
            .and_then(WireScalar::into_timestamp)
            .unwrap_or_else(Utc::now);

        let processing_time_ms = self
            .processing_time_ms
            .filter(|ms| ms.is_finite())
            .map(|ms| ms.max(0.0).round() as u64)
            .unwrap_or(0);

        Ok(ResultEnvelope {
            id,
            submitted_text,
            is_safe,
            risk_score,
            threats,
            timestamp,
            processing_time_ms,
            tier: self.tier.filter(|t| !t.trim().is_empty()),
        })
    }
}

fn normalize_threat(index: usize, raw: RawThreat) -> Result<Threat, NormalizeError> {
    let label = raw.severity.unwrap_or_else(|| "medium".to_string());
    let severity = Severity::parse(&label).ok_or(NormalizeError::UnknownSeverity {
        index,
        label: label.clone(),
    })?;

    Ok(Threat {
        category: raw.category.unwrap_or_else(|| "general".to_string()),
        severity,
        confidence: raw
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(0.0),
        description: raw.description.unwrap_or_default(),
    })
}

/// Accept RFC 3339 and the offset-less ISO form many backends emit.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Epoch seconds, or milliseconds when the value is too large to be seconds.
fn epoch_to_timestamp(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() >= 1e11 { value } else { value * 1000.0 };
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis.round() as i64)
}

/// Aggregate counters as reported by the service's `/stats` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerStats {
    #[serde(default, alias = "total", alias = "total_count", alias = "totalAnalyses")]
    pub total_analyses: Option<u64>,
    #[serde(default, alias = "threat_count", alias = "threatsDetected")]
    pub threats_detected: Option<u64>,
    #[serde(default, alias = "avg_risk_score", alias = "averageRisk", alias = "average_risk_score")]
    pub average_risk: Option<f64>,
    #[serde(default, alias = "safeCount")]
    pub safe_count: Option<u64>,
    #[serde(default, alias = "unsafeCount", alias = "blocked_count")]
    pub unsafe_count: Option<u64>,
    #[serde(default, alias = "automatedCount", alias = "tier1_count")]
    pub automated_count: Option<u64>,
}

/// Body of the `/history` endpoint: either a bare array or a wrapped one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HistoryPayload {
    Bare(Vec<RawAnalysis>),
    Wrapped {
        #[serde(alias = "items", alias = "results")]
        history: Vec<RawAnalysis>,
    },
}

impl HistoryPayload {
    pub fn into_entries(self) -> Vec<RawAnalysis> {
        match self {
            HistoryPayload::Bare(entries) => entries,
            HistoryPayload::Wrapped { history } => history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(risk: f64) -> RawAnalysis {
        RawAnalysis {
            risk_score: Some(risk),
            ..Default::default()
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::parse(" high "), Some(Severity::High));
        assert_eq!(Severity::parse("moderate"), Some(Severity::Medium));
        assert_eq!(Severity::parse("severe"), None);
    }

    #[test]
    fn test_normalize_synthesizes_missing_fields() {
        let before = Utc::now();
        let envelope = raw(12.0).normalize("hello".to_string()).unwrap();

        assert!(Uuid::parse_str(&envelope.id).is_ok());
        assert!(envelope.timestamp >= before);
        assert!(envelope.threats.is_empty());
        assert_eq!(envelope.processing_time_ms, 0);
        assert_eq!(envelope.submitted_text, "hello");
        assert!(envelope.is_safe);
    }

    #[test]
    fn test_normalize_keeps_service_fields() {
        let payload = r#"{
            "id": "abc-123",
            "isSafe": false,
            "riskScore": 72.5,
            "timestamp": "2024-03-01T10:00:00Z",
            "processingTimeMs": 41.6,
            "tier": "escalated",
            "threats": [
                {"type": "prompt_injection", "severity": "HIGH", "confidence": 0.9, "description": "Override attempt"}
            ]
        }"#;
        let raw: RawAnalysis = serde_json::from_str(payload).unwrap();
        let envelope = raw.normalize("ignore previous".to_string()).unwrap();

        assert_eq!(envelope.id, "abc-123");
        assert!(!envelope.is_safe);
        assert_eq!(envelope.risk_score, 72.5);
        assert_eq!(
            envelope.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(envelope.processing_time_ms, 42);
        assert_eq!(envelope.tier.as_deref(), Some("escalated"));
        assert_eq!(envelope.threats[0].category, "prompt_injection");
        assert_eq!(envelope.threats[0].severity, Severity::High);
        assert_eq!(envelope.max_severity(), Some(Severity::High));
    }

    #[test]
    fn test_normalize_clamps_out_of_range_values() {
        let mut payload = raw(250.0);
        payload.threats = Some(vec![RawThreat {
            severity: Some("low".to_string()),
            confidence: Some(3.0),
            ..Default::default()
        }]);
        let envelope = payload.normalize("x".to_string()).unwrap();
        assert_eq!(envelope.risk_score, RISK_MAX);
        assert_eq!(envelope.threats[0].confidence, 1.0);

        let envelope = raw(-5.0).normalize("x".to_string()).unwrap();
        assert_eq!(envelope.risk_score, RISK_MIN);
    }

    #[test]
    fn test_normalize_rejects_incomplete_payloads() {
        let err = RawAnalysis::default()
            .normalize("x".to_string())
            .unwrap_err();
        assert_eq!(err, NormalizeError::MissingRiskScore);

        let err = raw(f64::NAN).normalize("x".to_string()).unwrap_err();
        assert_eq!(err, NormalizeError::NonFiniteRisk);

        let mut payload = raw(10.0);
        payload.threats = Some(vec![RawThreat {
            severity: Some("apocalyptic".to_string()),
            ..Default::default()
        }]);
        assert!(matches!(
            payload.normalize("x".to_string()),
            Err(NormalizeError::UnknownSeverity { index: 0, .. })
        ));
    }

    #[test]
    fn test_derived_verdict() {
        assert!(raw(59.9).normalize(String::new()).unwrap().is_safe);
        assert!(!raw(60.0).normalize(String::new()).unwrap().is_safe);

        let mut payload = raw(5.0);
        payload.threats = Some(vec![RawThreat {
            severity: Some("critical".to_string()),
            ..Default::default()
        }]);
        assert!(!payload.normalize(String::new()).unwrap().is_safe);
    }

    #[test]
    fn test_naive_timestamp_is_read_as_utc() {
        let mut payload = raw(1.0);
        payload.timestamp = Some("2024-03-01T10:00:00.250".into());
        let envelope = payload.normalize(String::new()).unwrap();
        assert_eq!(envelope.timestamp.timestamp(), 1_709_287_200);
    }

    #[test]
    fn test_numeric_id_is_accepted() {
        let payload: RawAnalysis = serde_json::from_str(
            r#"{"id": 42, "is_safe": true, "risk_score": 10, "threats": []}"#,
        )
        .unwrap();
        let envelope = payload.normalize("hi".to_string()).unwrap();
        assert_eq!(envelope.id, "42");
        assert!(envelope.is_safe);
    }

    #[test]
    fn test_epoch_timestamps() {
        let seconds: RawAnalysis =
            serde_json::from_str(r#"{"risk_score": 1, "timestamp": 1709287200}"#).unwrap();
        let millis: RawAnalysis =
            serde_json::from_str(r#"{"risk_score": 1, "timestamp": 1709287200250}"#).unwrap();

        let seconds = seconds.normalize(String::new()).unwrap();
        let millis = millis.normalize(String::new()).unwrap();
        assert_eq!(seconds.timestamp.timestamp(), 1_709_287_200);
        assert_eq!(millis.timestamp.timestamp_millis(), 1_709_287_200_250);
    }

    #[test]
    fn test_unusable_id_and_timestamp_fall_back() {
        let before = Utc::now();
        let payload: RawAnalysis = serde_json::from_str(
            r#"{"id": {"nested": true}, "risk_score": 1, "timestamp": "yesterday-ish"}"#,
        )
        .unwrap();
        let envelope = payload.normalize(String::new()).unwrap();

        assert!(Uuid::parse_str(&envelope.id).is_ok());
        assert!(envelope.timestamp >= before);
    }

    #[test]
    fn test_history_payload_shapes() {
        let bare: HistoryPayload = serde_json::from_str(r#"[{"risk_score": 1}]"#).unwrap();
        assert_eq!(bare.into_entries().len(), 1);

        let wrapped: HistoryPayload =
            serde_json::from_str(r#"{"items": [{"risk": 1}, {"risk": 2}]}"#).unwrap();
        assert_eq!(wrapped.into_entries().len(), 2);
    }
}
