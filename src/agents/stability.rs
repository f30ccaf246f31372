//! Enrollment stability agent.
//!
//! Inverted polarity: a higher enrollment velocity or site activation rate
//! means lower risk. The inversion lives in the metric rules, so the signal
//! looks like any other agent's.

use super::{Findings, MetricRule, SignalAgent, DEFAULT_ABSTENTION_THRESHOLD};
use crate::features::FeatureVector;
use crate::models::{AgentType, RiskLevel};

pub const ENROLLMENT_VELOCITY: &str = "enrollment_velocity";
pub const SITE_ACTIVATION_RATE: &str = "site_activation_rate";
pub const ENROLLMENT_TARGET_PCT: &str = "enrollment_target_pct";

/// Subjects enrolled per active site per month.
const VELOCITY: MetricRule = MetricRule::lower_is_worse(
    ENROLLMENT_VELOCITY,
    "Enrollment velocity",
    " subjects/site/month",
    1.0,
    0.5,
    0.1,
);

const ACTIVATION: MetricRule = MetricRule::lower_is_worse(
    SITE_ACTIVATION_RATE,
    "Site activation rate",
    "%",
    80.0,
    60.0,
    40.0,
);

const TARGET: MetricRule = MetricRule::lower_is_worse(
    ENROLLMENT_TARGET_PCT,
    "Enrollment against plan",
    "%",
    75.0,
    50.0,
    25.0,
);

#[derive(Debug, Clone)]
pub struct StabilityAgent {
    abstention_threshold: f64,
}

impl StabilityAgent {
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

impl Default for StabilityAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalAgent for StabilityAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Stability
    }

    fn required_features(&self) -> &[&'static str] {
        &[ENROLLMENT_VELOCITY, SITE_ACTIVATION_RATE]
    }

    fn optional_features(&self) -> &[&'static str] {
        &[ENROLLMENT_TARGET_PCT]
    }

    fn abstention_threshold(&self) -> f64 {
        self.abstention_threshold
    }

    fn assess(&self, features: &FeatureVector) -> Findings {
        let mut findings = Findings::new();

        if let Some(level) = findings.check_feature(&VELOCITY, features) {
            if level >= RiskLevel::High {
                findings.recommend(level, "Review recruitment strategy and add backup sites");
            } else if level == RiskLevel::Medium {
                findings.recommend(level, "Share recruitment best practices across sites");
            }
        }

        if let Some(level) = findings.check_feature(&ACTIVATION, features) {
            if level >= RiskLevel::Medium {
                findings.recommend(level, "Unblock pending site activations (contracts, IRB, training)");
            }
        }

        if let Some(level) = findings.check_feature(&TARGET, features) {
            if level >= RiskLevel::High {
                findings.recommend(level, "Reforecast enrollment and inform the steering committee");
            }
        }

        findings
    }
}
