//! Query burden agent.
//!
//! Open data clarification queries per subject and how long they have
//! been open. The answered share, when supplied, is a lower-is-worse metric.

use super::{Findings, MetricRule, SignalAgent, DEFAULT_ABSTENTION_THRESHOLD};
use crate::features::FeatureVector;
use crate::models::{AgentType, RiskLevel};

pub const OPEN_QUERIES_PER_SUBJECT: &str = "open_queries_per_subject";
pub const QUERY_AGING_DAYS: &str = "query_aging_days";
pub const TOTAL_QUERIES: &str = "total_queries";
pub const ANSWERED_QUERIES_PCT: &str = "answered_queries_pct";

const OPEN_QUERIES: MetricRule = MetricRule::higher_is_worse(
    OPEN_QUERIES_PER_SUBJECT,
    "Open queries per subject",
    "",
    2.0,
    5.0,
    10.0,
);

const QUERY_AGING: MetricRule = MetricRule::higher_is_worse(
    QUERY_AGING_DAYS,
    "Average open query age",
    " days",
    14.0,
    30.0,
    60.0,
);

const ANSWERED: MetricRule = MetricRule::lower_is_worse(
    ANSWERED_QUERIES_PCT,
    "Answered queries",
    "%",
    80.0,
    60.0,
    40.0,
);

#[derive(Debug, Clone)]
pub struct QueryBurdenAgent {
    abstention_threshold: f64,
}

impl QueryBurdenAgent {
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

impl Default for QueryBurdenAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalAgent for QueryBurdenAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::QueryBurden
    }

    fn required_features(&self) -> &[&'static str] {
        &[OPEN_QUERIES_PER_SUBJECT, QUERY_AGING_DAYS]
    }

    fn optional_features(&self) -> &[&'static str] {
        &[TOTAL_QUERIES, ANSWERED_QUERIES_PCT]
    }

    fn abstention_threshold(&self) -> f64 {
        self.abstention_threshold
    }

    fn assess(&self, features: &FeatureVector) -> Findings {
        let mut findings = Findings::new();

        if let Some(level) = findings.check_feature(&QUERY_AGING, features) {
            if level >= RiskLevel::High {
                findings.recommend(level, "Escalate aged queries to site principal investigators");
            } else if level == RiskLevel::Medium {
                findings.recommend(level, "Send query aging reminders to site coordinators");
            }
        }

        if let Some(level) = findings.check_feature(&OPEN_QUERIES, features) {
            if level >= RiskLevel::High {
                findings.recommend(
                    level,
                    "Schedule a query resolution call with high-burden sites",
                );
            } else if level == RiskLevel::Medium {
                findings.recommend(level, "Review edit checks that generate most queries");
            }
        }

        if let Some(level) = findings.check_feature(&ANSWERED, features) {
            if level >= RiskLevel::Medium {
                findings.recommend(level, "Follow up on unanswered queries with site staff");
            }
        }

        findings
    }
}
