//! Pure display mappings for risk scores, tiers and long texts.

use serde::Serialize;
use std::fmt;

/// Scores strictly below this are [`RiskLevel::Low`].
pub const RISK_MEDIUM_THRESHOLD: f64 = 20.0;
/// Scores at or above this are [`RiskLevel::High`].
pub const RISK_HIGH_THRESHOLD: f64 = 60.0;

/// Marker appended to truncated text.
pub const ELLIPSIS: &str = "...";

/// Display bucket for a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() so column widths apply in table rows
        f.pad(match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        })
    }
}

impl RiskLevel {
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🔴",
        }
    }
}

/// Map a risk score to its display bucket.
///
/// Out-of-range scores fall into the nearest bucket; NaN is treated as high.
pub fn classify_risk(score: f64) -> RiskLevel {
    if score < RISK_MEDIUM_THRESHOLD {
        RiskLevel::Low
    } else if score < RISK_HIGH_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Broad grouping of processing tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierCategory {
    /// Decided by fast automated filters.
    Automated,
    /// Decided by a model-assisted review stage.
    Assisted,
    /// Escalated to human review.
    Escalated,
    /// Identifier not recognised by this client.
    Unknown,
}

/// Display label for a processing tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierLabel {
    pub category: TierCategory,
    pub label: String,
}

impl fmt::Display for TierLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Map a tier identifier reported by the service to a display label.
///
/// Unknown identifiers are echoed back verbatim.
pub fn classify_tier(tier: &str) -> TierLabel {
    let normalized = tier.trim().to_lowercase().replace(['-', ' '], "_");
    let (category, label) = match normalized.as_str() {
        "automated" | "auto" | "tier1" | "tier_1" | "rules" | "fast_path" => {
            (TierCategory::Automated, "Automated")
        }
        "assisted" | "tier2" | "tier_2" | "ai_review" | "llm" | "model_review" => {
            (TierCategory::Assisted, "AI Review")
        }
        "escalated" | "tier3" | "tier_3" | "human_review" | "human" => {
            (TierCategory::Escalated, "Human Escalation")
        }
        _ => {
            return TierLabel {
                category: TierCategory::Unknown,
                label: tier.to_string(),
            }
        }
    };

    TierLabel {
        category,
        label: label.to_string(),
    }
}

/// Shorten `text` to at most `max_len` characters, appending [`ELLIPSIS`]
/// when anything was cut.
pub fn truncate(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_risk_boundaries() {
        assert_eq!(classify_risk(19.9), RiskLevel::Low);
        assert_eq!(classify_risk(20.0), RiskLevel::Medium);
        assert_eq!(classify_risk(59.9), RiskLevel::Medium);
        assert_eq!(classify_risk(60.0), RiskLevel::High);
    }

    #[test]
    fn test_classify_risk_out_of_range() {
        assert_eq!(classify_risk(-10.0), RiskLevel::Low);
        assert_eq!(classify_risk(1000.0), RiskLevel::High);
        assert_eq!(classify_risk(f64::NAN), RiskLevel::High);
    }

    #[test]
    fn test_classify_risk_is_monotonic() {
        let mut previous = RiskLevel::Low;
        for step in 0..=1000 {
            let level = classify_risk(step as f64 / 10.0);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_classify_tier_known() {
        assert_eq!(classify_tier("tier1").category, TierCategory::Automated);
        assert_eq!(classify_tier("AI-Review").label, "AI Review");
        assert_eq!(classify_tier("human review").category, TierCategory::Escalated);
    }

    #[test]
    fn test_classify_tier_unknown_echoes_identifier() {
        let label = classify_tier("Quantum Oracle");
        assert_eq!(label.category, TierCategory::Unknown);
        assert_eq!(label.label, "Quantum Oracle");
        assert_eq!(label.to_string(), "Quantum Oracle");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("", 0), "");
        assert_eq!(truncate("abc", 0), "...");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(truncate(text, 2), "hé...");
        // The input is borrowed and left as it was.
        assert_eq!(text, "héllo wörld");
    }
}
