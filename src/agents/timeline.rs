//! Timeline agent.
//!
//! Data entry lag after visits and the gap to database lock readiness.

use super::{Findings, MetricRule, SignalAgent, DEFAULT_ABSTENTION_THRESHOLD};
use crate::features::FeatureVector;
use crate::models::{AgentType, RiskLevel};

pub const DATA_ENTRY_LAG_DAYS: &str = "data_entry_lag_days";
pub const LOCK_READINESS_GAP_DAYS: &str = "lock_readiness_gap_days";
pub const VISITS_OVERDUE: &str = "visits_overdue";

const ENTRY_LAG: MetricRule = MetricRule::higher_is_worse(
    DATA_ENTRY_LAG_DAYS,
    "Data entry lag",
    " days",
    5.0,
    10.0,
    20.0,
);

const LOCK_GAP: MetricRule = MetricRule::higher_is_worse(
    LOCK_READINESS_GAP_DAYS,
    "Gap to lock readiness",
    " days",
    14.0,
    30.0,
    60.0,
);

const OVERDUE_VISITS: MetricRule = MetricRule::higher_is_worse(
    VISITS_OVERDUE,
    "Overdue visits",
    "",
    5.0,
    15.0,
    30.0,
);

#[derive(Debug, Clone)]
pub struct TimelineAgent {
    abstention_threshold: f64,
}

impl TimelineAgent {
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

impl Default for TimelineAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalAgent for TimelineAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Timeline
    }

    fn required_features(&self) -> &[&'static str] {
        &[DATA_ENTRY_LAG_DAYS, LOCK_READINESS_GAP_DAYS]
    }

    fn optional_features(&self) -> &[&'static str] {
        &[VISITS_OVERDUE]
    }

    fn abstention_threshold(&self) -> f64 {
        self.abstention_threshold
    }

    fn assess(&self, features: &FeatureVector) -> Findings {
        let mut findings = Findings::new();

        if let Some(level) = findings.check_feature(&LOCK_GAP, features) {
            if level >= RiskLevel::High {
                findings.recommend(level, "Re-baseline the database lock plan with the study team");
            } else if level == RiskLevel::Medium {
                findings.recommend(level, "Track lock-readiness tasks weekly");
            }
        }

        if let Some(level) = findings.check_feature(&ENTRY_LAG, features) {
            if level >= RiskLevel::High {
                findings.recommend(level, "Agree data entry timelines with lagging sites");
            } else if level == RiskLevel::Medium {
                findings.recommend(level, "Remind sites of the data entry window");
            }
        }

        if let Some(level) = findings.check_feature(&OVERDUE_VISITS, features) {
            if level >= RiskLevel::Medium {
                findings.recommend(level, "Reconcile overdue visits with site schedules");
            }
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_gap_drives_level() {
        let fv = FeatureVector::from_pairs([
            (DATA_ENTRY_LAG_DAYS, Some(2.0)),
            (LOCK_READINESS_GAP_DAYS, Some(61.0)),
        ])
        .unwrap();
        let signal = TimelineAgent::new().analyze(&fv, "STUDY-4");
        assert_eq!(signal.risk_level, RiskLevel::Critical);
        assert_eq!(signal.recommended_actions.len(), 1);
    }

    #[test]
    fn test_overdue_visits_optional() {
        let fv = FeatureVector::from_pairs([
            (DATA_ENTRY_LAG_DAYS, Some(2.0)),
            (LOCK_READINESS_GAP_DAYS, Some(3.0)),
            (VISITS_OVERDUE, Some(16.0)),
        ])
        .unwrap();
        let signal = TimelineAgent::new().analyze(&fv, "STUDY-4");
        assert_eq!(signal.risk_level, RiskLevel::High);
        assert!((signal.confidence - 0.9).abs() < 1e-9);
    }
}
