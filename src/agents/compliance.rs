//! Protocol compliance agent.
//!
//! Protocol deviations per subject and the count of major deviations. A
//! single major deviation already puts the entity at MEDIUM; a major
//! deviation rate above 10% of subjects escalates to HIGH.

use super::{ratio, Findings, MetricRule, SignalAgent, DEFAULT_ABSTENTION_THRESHOLD};
use crate::features::FeatureVector;
use crate::models::{AgentType, EvidenceItem, RiskLevel};

pub const DEVIATIONS_PER_SUBJECT: &str = "deviations_per_subject";
pub const MAJOR_DEVIATIONS: &str = "major_deviations";
pub const SUBJECT_COUNT: &str = "subject_count";

const MAJOR_RATE_LIMIT: f64 = 0.10;

const DEVIATIONS: MetricRule = MetricRule::higher_is_worse(
    DEVIATIONS_PER_SUBJECT,
    "Protocol deviations per subject",
    "",
    0.5,
    1.0,
    2.0,
);

const MAJOR: MetricRule = MetricRule::higher_is_worse(
    MAJOR_DEVIATIONS,
    "Major protocol deviations",
    "",
    1.0,
    3.0,
    5.0,
);

#[derive(Debug, Clone)]
pub struct ComplianceAgent {
    abstention_threshold: f64,
}

impl ComplianceAgent {
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

impl Default for ComplianceAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalAgent for ComplianceAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Compliance
    }

    fn required_features(&self) -> &[&'static str] {
        &[DEVIATIONS_PER_SUBJECT, MAJOR_DEVIATIONS]
    }

    fn optional_features(&self) -> &[&'static str] {
        &[SUBJECT_COUNT]
    }

    fn abstention_threshold(&self) -> f64 {
        self.abstention_threshold
    }

    fn assess(&self, features: &FeatureVector) -> Findings {
        let mut findings = Findings::new();

        if let Some(level) = findings.check_feature(&MAJOR, features) {
            match level {
                RiskLevel::Critical => findings.recommend(
                    level,
                    "Open a CAPA for repeated major deviations and notify the sponsor QA lead",
                ),
                RiskLevel::High => findings.recommend(
                    level,
                    "Perform root-cause analysis of major deviations with the site",
                ),
                RiskLevel::Medium => findings.recommend(
                    level,
                    "Assess the major deviation for impact on subject safety and data integrity",
                ),
                _ => {}
            }
        }

        if let Some(level) = findings.check_feature(&DEVIATIONS, features) {
            if level >= RiskLevel::Medium {
                findings.recommend(level, "Retrain site staff on the protocol sections most often deviated");
            }
        }

        let major_rate = ratio(features.get(MAJOR_DEVIATIONS), features.get(SUBJECT_COUNT));
        if let Some(rate) = major_rate.filter(|r| *r > MAJOR_RATE_LIMIT) {
            findings.escalate(
                RiskLevel::High,
                Some(EvidenceItem {
                    feature_name: "major_deviation_rate".to_string(),
                    feature_value: rate,
                    threshold: MAJOR_RATE_LIMIT,
                    severity: ((rate - MAJOR_RATE_LIMIT) / (1.0 - MAJOR_RATE_LIMIT)).clamp(0.0, 1.0),
                    description: format!(
                        "Major deviations affect {:.0}% of subjects (limit {:.0}%)",
                        rate * 100.0,
                        MAJOR_RATE_LIMIT * 100.0
                    ),
                }),
            );
            findings.recommend(RiskLevel::High, "Consider a for-cause audit of the site");
        }

        findings
    }
}
