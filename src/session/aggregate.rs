//! Cumulative session statistics.
//!
//! Every completed result is folded in exactly once. Means are updated
//! incrementally, so nothing here ever needs the full result history.

use crate::models::{ResultEnvelope, ServerStats, Severity, RISK_MAX, RISK_MIN};
use crate::present::{classify_tier, TierCategory};
use serde::Serialize;
use tracing::{debug, warn};

/// Threat counts split by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl SeverityCounts {
    fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// Point-in-time view of the session counters.
///
/// Rates are methods rather than fields so they can never drift from the
/// counts they are derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub total_count: u64,
    pub threat_count: u64,
    pub running_mean_risk: f64,
    pub safe_count: u64,
    pub unsafe_count: u64,
    pub automated_count: u64,
    pub running_mean_processing_ms: f64,
    pub threats_by_severity: SeverityCounts,
}

impl AggregateStats {
    /// Share of safe results in percent; 100 before any result.
    pub fn safe_percentage(&self) -> f64 {
        if self.total_count == 0 {
            return 100.0;
        }
        self.safe_count as f64 / self.total_count as f64 * 100.0
    }

    /// Share of unsafe results in percent; 0 before any result.
    pub fn unsafe_percentage(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.unsafe_count as f64 / self.total_count as f64 * 100.0
    }

    /// Share of results decided by the automated tier, in percent.
    pub fn automation_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.automated_count as f64 / self.total_count as f64 * 100.0
    }

    /// Average number of threats per result.
    pub fn threats_per_result(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.threat_count as f64 / self.total_count as f64
    }
}

/// Incrementally maintained session statistics.
#[derive(Debug, Clone, Default)]
pub struct AggregateTracker {
    stats: AggregateStats,
    // Only locally observed results carry a processing time, so the
    // processing mean keeps its own sample count.
    processing_samples: u64,
}

/// Largest server-reported count accepted when seeding. Counts past 2^53
/// are no longer exact as `f64` in the mean and rate math.
const MAX_SEED_COUNT: u64 = 1 << 53;

impl AggregateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed result into the counters.
    ///
    /// Must be called exactly once per envelope.
    pub fn fold(&mut self, envelope: &ResultEnvelope) {
        let stats = &mut self.stats;

        stats.total_count += 1;
        if envelope.is_safe {
            stats.safe_count += 1;
        } else {
            stats.unsafe_count += 1;
        }

        stats.threat_count += envelope.threats.len() as u64;
        for threat in &envelope.threats {
            stats.threats_by_severity.bump(threat.severity);
        }

        if let Some(tier) = envelope.tier.as_deref() {
            if classify_tier(tier).category == TierCategory::Automated {
                stats.automated_count += 1;
            }
        }

        let risk = envelope.risk_score.clamp(RISK_MIN, RISK_MAX);
        stats.running_mean_risk = incremental_mean(stats.running_mean_risk, risk, stats.total_count);

        self.processing_samples += 1;
        stats.running_mean_processing_ms = incremental_mean(
            stats.running_mean_processing_ms,
            envelope.processing_time_ms as f64,
            self.processing_samples,
        );

        debug!(
            total = stats.total_count,
            mean_risk = stats.running_mean_risk,
            "Folded result {}",
            envelope.id
        );
    }

    /// Replace the counters with totals reported by the service.
    ///
    /// Returns `false` (leaving the tracker untouched) when the payload does
    /// not allow a consistent safe/unsafe split or its counts are out of range.
    pub fn seed(&mut self, server: &ServerStats) -> bool {
        let (total, safe, unsafe_count) =
            match (server.total_analyses, server.safe_count, server.unsafe_count) {
                (Some(total), Some(safe), Some(unsafe_count)) => {
                    let Some(sum) = safe.checked_add(unsafe_count) else {
                        warn!(safe, unsafe_count, "Server safe/unsafe counts overflow; not seeding counters");
                        return false;
                    };
                    if sum != total {
                        warn!(
                            total,
                            safe,
                            unsafe_count,
                            "Server totals disagree; using safe + unsafe as total"
                        );
                    }
                    (sum, safe, unsafe_count)
                }
                (Some(total), Some(safe), None) => {
                    let safe = safe.min(total);
                    (total, safe, total - safe)
                }
                (Some(total), None, Some(unsafe_count)) => {
                    let unsafe_count = unsafe_count.min(total);
                    (total, total - unsafe_count, unsafe_count)
                }
                (None, Some(safe), Some(unsafe_count)) => match safe.checked_add(unsafe_count) {
                    Some(sum) => (sum, safe, unsafe_count),
                    None => {
                        warn!(safe, unsafe_count, "Server safe/unsafe counts overflow; not seeding counters");
                        return false;
                    }
                },
                _ => {
                    warn!("Server stats lack a safe/unsafe split; not seeding counters");
                    return false;
                }
            };

        if total > MAX_SEED_COUNT {
            warn!(total, "Server total is out of range; not seeding counters");
            return false;
        }

        let mean = if total == 0 {
            0.0
        } else {
            server
                .average_risk
                .filter(|r| r.is_finite())
                .map(|r| r.clamp(RISK_MIN, RISK_MAX))
                .unwrap_or(0.0)
        };

        self.stats = AggregateStats {
            total_count: total,
            threat_count: server.threats_detected.unwrap_or(0).min(MAX_SEED_COUNT),
            running_mean_risk: mean,
            safe_count: safe,
            unsafe_count,
            automated_count: server.automated_count.unwrap_or(0).min(total),
            running_mean_processing_ms: 0.0,
            threats_by_severity: SeverityCounts::default(),
        };
        self.processing_samples = 0;

        debug!(total, "Seeded aggregate counters from server");
        true
    }

    /// Current counters. Pure read.
    pub fn snapshot(&self) -> AggregateStats {
        self.stats.clone()
    }
}

/// `mean' = mean + (value - mean) / n'`, where `n'` already counts `value`.
fn incremental_mean(mean: f64, value: f64, count: u64) -> f64 {
    mean + (value - mean) / count as f64
}
