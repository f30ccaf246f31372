//! Source data verification agent.
//!
//! SDV completion and investigator signature completion. Both are
//! lower-is-worse percentages.

use super::{Findings, MetricRule, SignalAgent, DEFAULT_ABSTENTION_THRESHOLD};
use crate::features::FeatureVector;
use crate::models::{AgentType, RiskLevel};

pub const SDV_COMPLETION_PCT: &str = "sdv_completion_pct";
pub const SIGNATURE_COMPLETION_PCT: &str = "signature_completion_pct";
pub const CRF_TOTAL: &str = "crf_total";

const SDV: MetricRule = MetricRule::lower_is_worse(
    SDV_COMPLETION_PCT,
    "SDV completion",
    "%",
    90.0,
    75.0,
    50.0,
);

const SIGNATURES: MetricRule = MetricRule::lower_is_worse(
    SIGNATURE_COMPLETION_PCT,
    "Investigator signature completion",
    "%",
    95.0,
    80.0,
    60.0,
);

#[derive(Debug, Clone)]
pub struct VerificationAgent {
    abstention_threshold: f64,
}

impl VerificationAgent {
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

impl Default for VerificationAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalAgent for VerificationAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Verification
    }

    fn required_features(&self) -> &[&'static str] {
        &[SDV_COMPLETION_PCT, SIGNATURE_COMPLETION_PCT]
    }

    fn optional_features(&self) -> &[&'static str] {
        &[CRF_TOTAL]
    }

    fn abstention_threshold(&self) -> f64 {
        self.abstention_threshold
    }

    fn assess(&self, features: &FeatureVector) -> Findings {
        let mut findings = Findings::new();

        if let Some(level) = findings.check_feature(&SDV, features) {
            match level {
                RiskLevel::Critical | RiskLevel::High => findings.recommend(
                    level,
                    "Schedule an additional monitoring visit to catch up on SDV",
                ),
                RiskLevel::Medium => {
                    findings.recommend(level, "Prioritize SDV of critical data points at the next visit")
                }
                _ => {}
            }
        }

        if let Some(level) = findings.check_feature(&SIGNATURES, features) {
            if level >= RiskLevel::Medium {
                findings.recommend(level, "Request outstanding investigator signatures on CRFs");
            }
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(sdv: f64, sig: f64) -> FeatureVector {
        FeatureVector::from_pairs([
            (SDV_COMPLETION_PCT, Some(sdv)),
            (SIGNATURE_COMPLETION_PCT, Some(sig)),
        ])
        .unwrap()
    }

    #[test]
    fn test_complete_verification_is_low() {
        let signal = VerificationAgent::new().analyze(&features(100.0, 100.0), "SITE-1");
        assert_eq!(signal.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_low_sdv_is_critical() {
        let signal = VerificationAgent::new().analyze(&features(40.0, 99.0), "SITE-1");
        assert_eq!(signal.risk_level, RiskLevel::Critical);
        assert_eq!(signal.evidence.len(), 1);
        assert_eq!(signal.evidence[0].threshold, 90.0);
    }

    #[test]
    fn test_zero_sdv_is_a_value_not_missing() {
        let signal = VerificationAgent::new().analyze(&features(0.0, 0.0), "SITE-1");
        assert!(!signal.abstained);
        assert_eq!(signal.risk_level, RiskLevel::Critical);
    }
}
