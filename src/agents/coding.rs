//! Medical coding agent.
//!
//! Uncoded adverse event and medication terms, and the age of the coding
//! backlog.

use super::{Findings, MetricRule, SignalAgent, DEFAULT_ABSTENTION_THRESHOLD};
use crate::features::FeatureVector;
use crate::models::{AgentType, RiskLevel};

pub const UNCODED_TERMS_PCT: &str = "uncoded_terms_pct";
pub const CODING_BACKLOG_DAYS: &str = "coding_backlog_days";
pub const TOTAL_TERMS: &str = "total_terms";

const UNCODED: MetricRule = MetricRule::higher_is_worse(
    UNCODED_TERMS_PCT,
    "Uncoded terms",
    "%",
    5.0,
    15.0,
    30.0,
);

const BACKLOG: MetricRule = MetricRule::higher_is_worse(
    CODING_BACKLOG_DAYS,
    "Coding backlog age",
    " days",
    7.0,
    21.0,
    45.0,
);

#[derive(Debug, Clone)]
pub struct CodingAgent {
    abstention_threshold: f64,
}

impl CodingAgent {
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

impl Default for CodingAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalAgent for CodingAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Coding
    }

    fn required_features(&self) -> &[&'static str] {
        &[UNCODED_TERMS_PCT, CODING_BACKLOG_DAYS]
    }

    fn optional_features(&self) -> &[&'static str] {
        &[TOTAL_TERMS]
    }

    fn abstention_threshold(&self) -> f64 {
        self.abstention_threshold
    }

    fn assess(&self, features: &FeatureVector) -> Findings {
        let mut findings = Findings::new();

        let uncoded = findings.check_feature(&UNCODED, features);
        let backlog = findings.check_feature(&BACKLOG, features);

        if let Some(level) = uncoded.filter(|l| *l >= RiskLevel::Medium) {
            findings.recommend(level, "Prioritize coding of uncoded adverse event terms");
        }
        if let Some(level) = backlog.filter(|l| *l >= RiskLevel::High) {
            findings.recommend(level, "Add coder capacity to clear the coding backlog");
        }

        // A large uncoded share that is also old points at a stalled process.
        if uncoded >= Some(RiskLevel::High) && backlog >= Some(RiskLevel::High) {
            findings.recommend(
                RiskLevel::Critical,
                "Audit the coding workflow and dictionary version alignment",
            );
        }

        findings
    }
}
