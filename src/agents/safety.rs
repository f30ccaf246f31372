//! Safety agent.
//!
//! Watches serious adverse event (SAE) handling: reports awaiting medical
//! review and reports past their expedited reporting window. Any overdue SAE
//! is at least HIGH risk.

use super::{ratio, Findings, MetricRule, SignalAgent, DEFAULT_ABSTENTION_THRESHOLD};
use crate::features::FeatureVector;
use crate::models::{AgentType, RiskLevel};

pub const SAE_PENDING_REVIEW: &str = "sae_pending_review";
pub const SAE_OVERDUE_DAYS: &str = "sae_overdue_days";
pub const SAE_TOTAL: &str = "sae_total";
pub const SUBJECT_COUNT: &str = "subject_count";

const PENDING: MetricRule = MetricRule::higher_is_worse(
    SAE_PENDING_REVIEW,
    "SAEs pending medical review",
    "",
    1.0,
    3.0,
    5.0,
);

const OVERDUE: MetricRule = MetricRule::higher_is_worse(
    SAE_OVERDUE_DAYS,
    "Oldest overdue SAE",
    " days",
    1.0,
    1.0,
    7.0,
);

const SAE_RATE: MetricRule = MetricRule::higher_is_worse(
    "sae_rate_per_subject",
    "SAE rate per subject",
    "",
    0.10,
    0.25,
    0.50,
);

#[derive(Debug, Clone)]
pub struct SafetyAgent {
    abstention_threshold: f64,
}

impl SafetyAgent {
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

impl Default for SafetyAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalAgent for SafetyAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Safety
    }

    fn required_features(&self) -> &[&'static str] {
        &[SAE_PENDING_REVIEW, SAE_OVERDUE_DAYS]
    }

    fn optional_features(&self) -> &[&'static str] {
        &[SAE_TOTAL, SUBJECT_COUNT]
    }

    fn abstention_threshold(&self) -> f64 {
        self.abstention_threshold
    }

    fn assess(&self, features: &FeatureVector) -> Findings {
        let mut findings = Findings::new();

        if let Some(level) = findings.check_feature(&OVERDUE, features) {
            match level {
                RiskLevel::Critical => findings.recommend(
                    level,
                    "Submit overdue SAE reports to regulators and ethics committees immediately",
                ),
                RiskLevel::High | RiskLevel::Medium => findings.recommend(
                    level,
                    "Complete overdue SAE reports before the expedited reporting window closes",
                ),
                _ => {}
            }
        }

        if let Some(level) = findings.check_feature(&PENDING, features) {
            match level {
                RiskLevel::Critical | RiskLevel::High => findings.recommend(
                    level,
                    "Expedite medical monitor review of the pending SAE backlog",
                ),
                RiskLevel::Medium => {
                    findings.recommend(level, "Schedule medical review of pending SAEs")
                }
                _ => {}
            }
        }

        let rate = ratio(features.get(SAE_TOTAL), features.get(SUBJECT_COUNT));
        if let Some(level) = findings.check(&SAE_RATE, rate) {
            if level >= RiskLevel::High {
                findings.recommend(
                    level,
                    "Review the SAE rate against the expected safety profile with the safety physician",
                );
            }
        }

        if findings.worst_level() == RiskLevel::Low {
            findings.recommend(RiskLevel::Low, "Continue routine safety surveillance");
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(pending: Option<f64>, overdue: Option<f64>) -> FeatureVector {
        FeatureVector::from_pairs([(SAE_PENDING_REVIEW, pending), (SAE_OVERDUE_DAYS, overdue)])
            .unwrap()
    }

    #[test]
    fn test_clean_safety_is_low() {
        let signal = SafetyAgent::new().analyze(&features(Some(0.0), Some(0.0)), "STUDY-1");
        assert!(!signal.abstained);
        assert_eq!(signal.risk_level, RiskLevel::Low);
        assert!(signal.evidence.is_empty());
        assert_eq!(
            signal.recommended_actions,
            vec!["Continue routine safety surveillance"]
        );
    }

    #[test]
    fn test_any_overdue_sae_is_high() {
        let signal = SafetyAgent::new().analyze(&features(Some(0.0), Some(1.0)), "STUDY-1");
        assert_eq!(signal.risk_level, RiskLevel::High);
        assert_eq!(signal.evidence[0].feature_name, SAE_OVERDUE_DAYS);
    }

    #[test]
    fn test_week_overdue_is_critical_regardless_of_pending() {
        let signal = SafetyAgent::new().analyze(&features(Some(0.0), Some(7.0)), "STUDY-1");
        assert_eq!(signal.risk_level, RiskLevel::Critical);
        assert!(signal.recommended_actions[0].contains("immediately"));
    }

    #[test]
    fn test_sae_rate_uses_optional_features() {
        let fv = FeatureVector::from_pairs([
            (SAE_PENDING_REVIEW, Some(0.0)),
            (SAE_OVERDUE_DAYS, Some(0.0)),
            (SAE_TOTAL, Some(30.0)),
            (SUBJECT_COUNT, Some(100.0)),
        ])
        .unwrap();
        let signal = SafetyAgent::new().analyze(&fv, "STUDY-1");
        assert_eq!(signal.risk_level, RiskLevel::High);
        assert_eq!(signal.confidence, 1.0);
        assert_eq!(signal.features_analyzed, 4);
    }

    #[test]
    fn test_abstains_when_all_required_missing() {
        let signal = SafetyAgent::new().analyze(&features(None, None), "STUDY-1");
        assert!(signal.abstained);
        assert!(signal
            .abstention_reason
            .unwrap()
            .contains("sae_pending_review, sae_overdue_days"));
    }

    #[test]
    fn test_stricter_threshold_abstains_on_half_coverage() {
        let agent = SafetyAgent::new().with_abstention_threshold(1.0);
        let signal = agent.analyze(&features(Some(2.0), None), "STUDY-1");
        assert!(signal.abstained);

        let signal = SafetyAgent::new().analyze(&features(Some(2.0), None), "STUDY-1");
        assert!(!signal.abstained);
        assert_eq!(signal.risk_level, RiskLevel::Medium);
        assert!((signal.confidence - 0.4).abs() < 1e-9);
    }
}
