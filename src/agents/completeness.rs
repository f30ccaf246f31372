//! Data completeness agent.
//!
//! Tracks missing CRF pages and missing visits.

use super::{Findings, MetricRule, SignalAgent, DEFAULT_ABSTENTION_THRESHOLD};
use crate::features::FeatureVector;
use crate::models::{AgentType, RiskLevel};

pub const MISSING_PAGES_PCT: &str = "missing_pages_pct";
pub const MISSING_VISITS_PCT: &str = "missing_visits_pct";
pub const EXPECTED_PAGES: &str = "expected_pages";
pub const SUBJECT_COUNT: &str = "subject_count";

const MISSING_PAGES: MetricRule = MetricRule::higher_is_worse(
    MISSING_PAGES_PCT,
    "Missing CRF pages",
    "%",
    5.0,
    15.0,
    30.0,
);

const MISSING_VISITS: MetricRule = MetricRule::higher_is_worse(
    MISSING_VISITS_PCT,
    "Missing visits",
    "%",
    3.0,
    10.0,
    20.0,
);

#[derive(Debug, Clone)]
pub struct DataCompletenessAgent {
    abstention_threshold: f64,
}

impl DataCompletenessAgent {
    pub fn new() -> Self {
        Self {
            abstention_threshold: DEFAULT_ABSTENTION_THRESHOLD,
        }
    }

    pub fn with_abstention_threshold(mut self, threshold: f64) -> Self {
        self.abstention_threshold = threshold;
        self
    }
}

impl Default for DataCompletenessAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalAgent for DataCompletenessAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::DataCompleteness
    }

    fn required_features(&self) -> &[&'static str] {
        &[MISSING_PAGES_PCT, MISSING_VISITS_PCT]
    }

    fn optional_features(&self) -> &[&'static str] {
        &[EXPECTED_PAGES, SUBJECT_COUNT]
    }

    fn abstention_threshold(&self) -> f64 {
        self.abstention_threshold
    }

    fn assess(&self, features: &FeatureVector) -> Findings {
        let mut findings = Findings::new();

        if let Some(level) = findings.check_feature(&MISSING_PAGES, features) {
            match level {
                RiskLevel::Critical => findings.recommend(
                    level,
                    "Launch a site-level data entry recovery plan for missing CRF pages",
                ),
                RiskLevel::High => findings.recommend(
                    level,
                    "Issue missing-page listings to sites with a resolution deadline",
                ),
                RiskLevel::Medium => {
                    findings.recommend(level, "Include missing pages in the next site newsletter")
                }
                _ => {}
            }
        }

        if let Some(level) = findings.check_feature(&MISSING_VISITS, features) {
            match level {
                RiskLevel::Critical | RiskLevel::High => findings.recommend(
                    level,
                    "Confirm subject status for missed visits and document protocol deviations",
                ),
                RiskLevel::Medium => findings.recommend(level, "Review the visit schedule with sites"),
                _ => {}
            }
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(pages: Option<f64>, visits: Option<f64>) -> FeatureVector {
        FeatureVector::from_pairs([(MISSING_PAGES_PCT, pages), (MISSING_VISITS_PCT, visits)]).unwrap()
    }

    #[test]
    fn test_worst_metric_wins() {
        let signal = DataCompletenessAgent::new().analyze(&features(Some(1.0), Some(25.0)), "SITE-7");
        assert_eq!(signal.risk_level, RiskLevel::Critical);
        assert_eq!(signal.evidence.len(), 1);
        assert_eq!(signal.evidence[0].severity, 1.0);
    }

    #[test]
    fn test_recommendations_ordered_by_urgency() {
        let signal = DataCompletenessAgent::new().analyze(&features(Some(6.0), Some(12.0)), "SITE-7");
        assert_eq!(signal.risk_level, RiskLevel::High);
        assert_eq!(signal.recommended_actions.len(), 2);
        assert!(signal.recommended_actions[0].starts_with("Confirm subject status"));
    }

    #[test]
    fn test_single_metric_is_enough() {
        let signal = DataCompletenessAgent::new().analyze(&features(None, Some(0.0)), "SITE-7");
        assert!(!signal.abstained);
        assert_eq!(signal.risk_level, RiskLevel::Low);
        assert!((signal.confidence - 0.4).abs() < 1e-9);
    }
}
