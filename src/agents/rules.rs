//! Threshold rules for monitored metrics.
//!
//! A rule knows the polarity of its metric, so agents with inverted metrics
//! (where a higher raw value means lower risk) describe that here and emit
//! the same signal shape as every other agent.

use crate::models::{EvidenceItem, RiskLevel};

/// Which direction of a metric is bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Counts, backlogs, delays.
    HigherIsWorse,
    /// Completion rates, velocities.
    LowerIsWorse,
}

/// Ordinal thresholds for one metric.
///
/// `limit` is the edge of the acceptable range and doubles as the MEDIUM
/// threshold. All thresholds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRule {
    pub feature: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub polarity: Polarity,
    pub limit: f64,
    pub high: f64,
    pub critical: f64,
}

impl MetricRule {
    pub const fn higher_is_worse(
        feature: &'static str,
        label: &'static str,
        unit: &'static str,
        limit: f64,
        high: f64,
        critical: f64,
    ) -> Self {
        Self {
            feature,
            label,
            unit,
            polarity: Polarity::HigherIsWorse,
            limit,
            high,
            critical,
        }
    }

    pub const fn lower_is_worse(
        feature: &'static str,
        label: &'static str,
        unit: &'static str,
        limit: f64,
        high: f64,
        critical: f64,
    ) -> Self {
        Self {
            feature,
            label,
            unit,
            polarity: Polarity::LowerIsWorse,
            limit,
            high,
            critical,
        }
    }

    /// True if `value` is at or beyond `threshold` in the bad direction.
    fn reaches(&self, value: f64, threshold: f64) -> bool {
        match self.polarity {
            Polarity::HigherIsWorse => value >= threshold,
            Polarity::LowerIsWorse => value <= threshold,
        }
    }

    /// Ordinal risk for a single value.
    pub fn risk_level(&self, value: f64) -> RiskLevel {
        if self.reaches(value, self.critical) {
            RiskLevel::Critical
        } else if self.reaches(value, self.high) {
            RiskLevel::High
        } else if self.reaches(value, self.limit) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Distance past the acceptable limit, normalized by the limit-to-critical
    /// span and clamped to [0, 1].
    ///
    /// A value exactly at `limit` is already MEDIUM but has severity 0: the
    /// level says which band was reached, severity how far into it.
    pub fn severity(&self, value: f64) -> f64 {
        let deficit = match self.polarity {
            Polarity::HigherIsWorse => value - self.limit,
            Polarity::LowerIsWorse => self.limit - value,
        };
        if deficit <= 0.0 {
            return 0.0;
        }

        let max_deficit = (self.critical - self.limit).abs();
        if max_deficit <= f64::EPSILON {
            return 1.0;
        }
        (deficit / max_deficit).min(1.0)
    }

    /// Evidence for a value outside the acceptable range. The boundary value
    /// counts as outside and yields an item with severity 0.
    pub fn evidence(&self, value: f64) -> Option<EvidenceItem> {
        if !self.reaches(value, self.limit) {
            return None;
        }

        let relation = match self.polarity {
            Polarity::HigherIsWorse => "at or above",
            Polarity::LowerIsWorse => "at or below",
        };

        Some(EvidenceItem {
            feature_name: self.feature.to_string(),
            feature_value: value,
            threshold: self.limit,
            severity: self.severity(value),
            description: format!(
                "{} of {:.1}{} is {} the acceptable limit of {:.1}{} ({})",
                self.label,
                value,
                self.unit,
                relation,
                self.limit,
                self.unit,
                self.risk_level(value)
            ),
        })
    }
}
