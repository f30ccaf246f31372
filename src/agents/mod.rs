//! Signal agents.
//!
//! Each agent looks at one risk dimension of a feature vector and either
//! abstains or produces an [`AgentSignal`]. The abstention policy, the
//! confidence formula and the worst-case level rule are shared here; agents
//! only describe their metrics and recommendations.

pub mod coding;
pub mod compliance;
pub mod completeness;
pub mod query;
pub mod registry;
pub mod rules;
pub mod safety;
pub mod stability;
pub mod timeline;
pub mod verification;

pub use registry::{evaluate_signals, AgentRegistry};
pub use rules::{MetricRule, Polarity};

use crate::features::FeatureVector;
use crate::models::{AgentSignal, AgentType, EvidenceItem, RiskLevel};
use tracing::debug;

/// Minimum share of required features an agent needs before judging.
pub const DEFAULT_ABSTENTION_THRESHOLD: f64 = 0.5;

/// Confidence contributed by full required-feature coverage.
pub const REQUIRED_COVERAGE_WEIGHT: f64 = 0.8;

/// Confidence bonus per available optional feature.
pub const OPTIONAL_FEATURE_BONUS: f64 = 0.1;

/// The contract every risk agent satisfies.
pub trait SignalAgent: Send + Sync {
    fn agent_type(&self) -> AgentType;

    /// Features the agent needs; availability is measured against these.
    fn required_features(&self) -> &[&'static str];

    /// Features that raise confidence but are never required.
    fn optional_features(&self) -> &[&'static str] {
        &[]
    }

    fn abstention_threshold(&self) -> f64 {
        DEFAULT_ABSTENTION_THRESHOLD
    }

    /// Agent-specific evaluation, only called once abstention is ruled out.
    fn assess(&self, features: &FeatureVector) -> Findings;

    /// Abstain or judge.
    fn analyze(&self, features: &FeatureVector, entity_id: &str) -> AgentSignal {
        let agent_type = self.agent_type();
        let required = self.required_features();
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|f| !features.is_available(f))
            .collect();
        let availability = availability(required.len(), missing.len());

        let optional_present = self
            .optional_features()
            .iter()
            .filter(|f| features.is_available(f))
            .count();
        let features_analyzed = required.len() - missing.len() + optional_present;

        let threshold = self.abstention_threshold();
        if availability < threshold {
            let reason = format!(
                "missing required features: {} (availability {:.2} below threshold {:.2})",
                missing.join(", "),
                availability,
                threshold
            );
            debug!("{} abstained on {}: {}", agent_type, entity_id, reason);
            return AgentSignal::abstain(agent_type, reason, features_analyzed);
        }

        let findings = self.assess(features);
        if findings.metrics_evaluated() == 0 {
            let reason = if missing.is_empty() {
                "no monitored metric could be evaluated".to_string()
            } else {
                format!(
                    "no monitored metric could be evaluated; missing required features: {}",
                    missing.join(", ")
                )
            };
            debug!("{} abstained on {}: {}", agent_type, entity_id, reason);
            return AgentSignal::abstain(agent_type, reason, features_analyzed);
        }

        let confidence = signal_confidence(availability, optional_present);
        let (risk_level, evidence, actions) = findings.into_parts();

        debug!(
            "{} judged {} as {} (confidence {:.2}, {} evidence)",
            agent_type,
            entity_id,
            risk_level,
            confidence,
            evidence.len()
        );

        AgentSignal::judged(
            agent_type,
            risk_level,
            confidence,
            evidence,
            actions,
            features_analyzed,
        )
    }
}

/// Share of required features present. An agent with no required features
/// is fully available.
pub fn availability(required: usize, missing: usize) -> f64 {
    if required == 0 {
        return 1.0;
    }
    (required - missing.min(required)) as f64 / required as f64
}

/// Required coverage plus optional bonus, capped at 1.
pub fn signal_confidence(availability: f64, optional_present: usize) -> f64 {
    (REQUIRED_COVERAGE_WEIGHT * availability + OPTIONAL_FEATURE_BONUS * optional_present as f64)
        .min(1.0)
}

/// What an agent found while assessing one entity.
///
/// The agent's level is the worst level of any evaluated metric, so one
/// badly degraded metric is never diluted by healthy ones.
#[derive(Debug, Default)]
pub struct Findings {
    levels: Vec<RiskLevel>,
    evidence: Vec<EvidenceItem>,
    actions: Vec<(RiskLevel, String)>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates one metric if its value is present and returns its level.
    pub fn check(&mut self, rule: &MetricRule, value: Option<f64>) -> Option<RiskLevel> {
        let value = value?;
        let level = rule.risk_level(value);
        self.levels.push(level);
        if let Some(item) = rule.evidence(value) {
            self.evidence.push(item);
        }
        Some(level)
    }

    /// Shortcut for a rule whose feature is read straight from the vector.
    pub fn check_feature(&mut self, rule: &MetricRule, features: &FeatureVector) -> Option<RiskLevel> {
        self.check(rule, features.get(rule.feature))
    }

    /// Raises the floor of the agent's level, with optional supporting evidence.
    pub fn escalate(&mut self, level: RiskLevel, evidence: Option<EvidenceItem>) {
        self.levels.push(level);
        if let Some(item) = evidence {
            self.evidence.push(item);
        }
    }

    /// Adds a recommendation tied to the level that triggered it.
    pub fn recommend(&mut self, level: RiskLevel, action: impl Into<String>) {
        self.actions.push((level, action.into()));
    }

    pub fn metrics_evaluated(&self) -> usize {
        self.levels.len()
    }

    pub fn worst_level(&self) -> RiskLevel {
        self.levels.iter().copied().max().unwrap_or(RiskLevel::Unknown)
    }

    /// Worst level, evidence, and recommendations ordered most urgent first.
    pub fn into_parts(self) -> (RiskLevel, Vec<EvidenceItem>, Vec<String>) {
        let level = self.worst_level();
        let mut actions = self.actions;
        actions.sort_by(|a, b| b.0.cmp(&a.0));

        let mut seen = std::collections::HashSet::new();
        let actions = actions
            .into_iter()
            .map(|(_, text)| text)
            .filter(|text| seen.insert(text.clone()))
            .collect();

        (level, self.evidence, actions)
    }
}

/// Value of `numerator / denominator` when both are present and the
/// denominator is positive.
pub(crate) fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}
