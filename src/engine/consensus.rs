//! Weighted consensus voting.
//!
//! Combines agent signals into one verdict. Each contributing signal votes
//! with `anchor(level) × weight(agent) × confidence`; the score is the
//! weighted mean of anchors, clamped to [0, 100], then classified with the
//! configured thresholds.

use crate::config::{ConsensusConfig, DEFAULT_WEIGHT};
use crate::models::{clamp_score, clamp_unit, AgentSignal, AgentType, ConsensusResult, RiskLevel};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

const COVERAGE_SHARE: f64 = 0.3;
const AGREEMENT_SHARE: f64 = 0.4;
const AVG_CONFIDENCE_SHARE: f64 = 0.3;

/// A weight lookup result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWeight {
    pub value: f64,
    /// True if the agent had no configured weight and got [`DEFAULT_WEIGHT`].
    pub defaulted: bool,
}

pub struct ConsensusEngine {
    config: ConsensusConfig,
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::new(ConsensusConfig::default())
    }
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Weight for an agent type; missing entries fall back to 1.0.
    pub fn resolve_weight(&self, agent_type: &AgentType) -> ResolvedWeight {
        match self.config.configured_weight(agent_type) {
            Some(value) => ResolvedWeight {
                value,
                defaulted: false,
            },
            None => ResolvedWeight {
                value: DEFAULT_WEIGHT,
                defaulted: true,
            },
        }
    }

    /// Maps a risk score onto the ordinal scale.
    pub fn classify(&self, risk_score: f64) -> RiskLevel {
        let t = &self.config.thresholds;
        if risk_score >= t.critical {
            RiskLevel::Critical
        } else if risk_score >= t.high {
            RiskLevel::High
        } else if risk_score >= t.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Combines signals, stamped with the current time.
    pub fn combine(&self, signals: &[AgentSignal], entity_id: &str) -> ConsensusResult {
        self.combine_at(signals, entity_id, Utc::now())
    }

    /// Combines signals with an explicit timestamp. Identical inputs give
    /// identical results.
    pub fn combine_at(
        &self,
        signals: &[AgentSignal],
        entity_id: &str,
        timestamp: DateTime<Utc>,
    ) -> ConsensusResult {
        let (contributing, abstained): (Vec<&AgentSignal>, Vec<&AgentSignal>) =
            signals.iter().partition(|s| s.is_contributing());

        let contributing_agents: Vec<String> =
            contributing.iter().map(|s| s.agent_type.to_string()).collect();
        let abstained_agents: Vec<String> =
            abstained.iter().map(|s| s.agent_type.to_string()).collect();

        if contributing.is_empty() {
            debug!(
                "No contributing agents for {} ({} abstained)",
                entity_id,
                abstained_agents.len()
            );
            return ConsensusResult {
                entity_id: entity_id.to_string(),
                risk_level: RiskLevel::Unknown,
                risk_score: 0.0,
                confidence: 0.0,
                contributing_agents,
                abstained_agents,
                agent_signals: signals.to_vec(),
                weighted_scores: BTreeMap::new(),
                agreement_ratio: 0.0,
                timestamp,
                defaulted_weights: Vec::new(),
                unclamped_risk_score: None,
            };
        }

        let mut weighted_scores: BTreeMap<String, f64> = BTreeMap::new();
        let mut defaulted: BTreeSet<String> = BTreeSet::new();
        let mut numerator = 0.0;
        let mut denominator = 0.0;

        for signal in &contributing {
            let weight = self.resolve_weight(&signal.agent_type);
            if weight.defaulted && defaulted.insert(signal.agent_type.to_string()) {
                warn!(
                    "No weight configured for agent type '{}', using default {}",
                    signal.agent_type, DEFAULT_WEIGHT
                );
            }

            let score = signal.risk_level.anchor() * weight.value * signal.confidence;
            *weighted_scores
                .entry(signal.agent_type.to_string())
                .or_insert(0.0) += score;
            numerator += score;
            denominator += weight.value.abs() * signal.confidence;
        }

        let raw_score = if denominator > 0.0 {
            numerator / denominator
        } else {
            0.0
        };
        let risk_score = clamp_score(raw_score);
        let unclamped_risk_score = (risk_score != raw_score).then(|| {
            debug!(
                "Clamped consensus score for {} from {:.2} to {:.1}",
                entity_id, raw_score, risk_score
            );
            raw_score
        });
        let risk_level = self.classify(risk_score);

        let n = contributing.len() as f64;
        let agreeing = contributing
            .iter()
            .filter(|s| s.risk_level.agrees_with(risk_level))
            .count() as f64;
        let agreement = agreeing / n;
        let coverage = if self.config.full_coverage_agents == 0 {
            1.0
        } else {
            (n / self.config.full_coverage_agents as f64).min(1.0)
        };
        let avg_confidence = contributing.iter().map(|s| s.confidence).sum::<f64>() / n;
        let confidence = clamp_unit(
            COVERAGE_SHARE * coverage + AGREEMENT_SHARE * agreement + AVG_CONFIDENCE_SHARE * avg_confidence,
        );

        let agreement_ratio = agreement_ratio(&contributing);

        debug!(
            "Consensus for {}: {} (score {:.1}, confidence {:.2}, agreement ratio {:.2})",
            entity_id, risk_level, risk_score, confidence, agreement_ratio
        );

        ConsensusResult {
            entity_id: entity_id.to_string(),
            risk_level,
            risk_score,
            confidence,
            contributing_agents,
            abstained_agents,
            agent_signals: signals.to_vec(),
            weighted_scores,
            agreement_ratio,
            timestamp,
            defaulted_weights: defaulted.into_iter().collect(),
            unclamped_risk_score,
        }
    }
}

/// Frequency of the most common level among contributing signals.
fn agreement_ratio(contributing: &[&AgentSignal]) -> f64 {
    if contributing.is_empty() {
        return 0.0;
    }
    let mut counts: BTreeMap<RiskLevel, usize> = BTreeMap::new();
    for signal in contributing {
        *counts.entry(signal.risk_level).or_default() += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    max as f64 / contributing.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskThresholds;
    use chrono::TimeZone;

    fn signal(agent_type: AgentType, level: RiskLevel, confidence: f64) -> AgentSignal {
        AgentSignal::judged(agent_type, level, confidence, Vec::new(), Vec::new(), 2)
    }

    fn abstained(agent_type: AgentType) -> AgentSignal {
        AgentSignal::abstain(agent_type, "missing".to_string(), 0)
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap()
    }

    fn equal_engine() -> ConsensusEngine {
        ConsensusEngine::new(ConsensusConfig::equal_weights(&AgentType::BUILT_IN))
    }

    #[test]
    fn test_all_abstained_is_unknown() {
        let result = equal_engine().combine(
            &[abstained(AgentType::Safety), abstained(AgentType::Coding)],
            "STUDY-1",
        );
        assert_eq!(result.risk_level, RiskLevel::Unknown);
        assert_eq!(result.risk_score, 0.0);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.agreement_ratio, 0.0);
        assert_eq!(result.abstained_agents, vec!["safety", "coding"]);
        assert!(result.contributing_agents.is_empty());
    }

    #[test]
    fn test_empty_signal_list_is_unknown() {
        let result = equal_engine().combine(&[], "STUDY-1");
        assert_eq!(result.risk_level, RiskLevel::Unknown);
        assert!(result.agent_signals.is_empty());
    }

    #[test]
    fn test_high_high_low_scenario() {
        let signals = vec![
            signal(AgentType::Safety, RiskLevel::High, 0.8),
            signal(AgentType::Compliance, RiskLevel::High, 0.7),
            signal(AgentType::Timeline, RiskLevel::Low, 0.9),
        ];
        let result = equal_engine().combine(&signals, "STUDY-1");

        // (75×0.8 + 75×0.7 + 25×0.9) / (0.8 + 0.7 + 0.9)
        assert!((result.risk_score - 56.25).abs() < 1e-9);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert!((result.agreement_ratio - 2.0 / 3.0).abs() < 1e-9);

        // coverage 3/5, everything adjacent to MEDIUM, mean confidence 0.8
        let expected = 0.3 * 0.6 + 0.4 * 1.0 + 0.3 * 0.8;
        assert!((result.confidence - expected).abs() < 1e-9);

        let high_cut = ConsensusEngine::new(ConsensusConfig {
            thresholds: RiskThresholds {
                critical: 85.0,
                high: 55.0,
                medium: 40.0,
            },
            ..ConsensusConfig::equal_weights(&AgentType::BUILT_IN)
        });
        assert_eq!(high_cut.combine(&signals, "STUDY-1").risk_level, RiskLevel::High);
    }

    #[test]
    fn test_classification_boundaries() {
        let engine = ConsensusEngine::default();
        assert_eq!(engine.classify(85.0), RiskLevel::Critical);
        assert_eq!(engine.classify(84.99), RiskLevel::High);
        assert_eq!(engine.classify(65.0), RiskLevel::High);
        assert_eq!(engine.classify(40.0), RiskLevel::Medium);
        assert_eq!(engine.classify(39.99), RiskLevel::Low);
        assert_eq!(engine.classify(0.0), RiskLevel::Low);
    }

    #[test]
    fn test_unanimous_critical() {
        let signals: Vec<AgentSignal> = AgentType::BUILT_IN
            .iter()
            .map(|t| signal(t.clone(), RiskLevel::Critical, 1.0))
            .collect();
        let result = ConsensusEngine::default().combine(&signals, "STUDY-1");
        assert_eq!(result.risk_score, 100.0);
        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.agreement_ratio, 1.0);
    }

    #[test]
    fn test_missing_weight_defaults_and_is_reported() {
        let mut config = ConsensusConfig::equal_weights(&AgentType::BUILT_IN);
        config.weights.remove("timeline");
        let engine = ConsensusEngine::new(config);

        assert_eq!(
            engine.resolve_weight(&AgentType::Timeline),
            ResolvedWeight {
                value: 1.0,
                defaulted: true
            }
        );

        let custom = AgentType::Other("lab_ranges".to_string());
        let result = engine.combine(
            &[
                signal(AgentType::Timeline, RiskLevel::High, 1.0),
                signal(custom.clone(), RiskLevel::High, 1.0),
                signal(AgentType::Safety, RiskLevel::High, 1.0),
            ],
            "STUDY-1",
        );
        assert_eq!(result.defaulted_weights, vec!["lab_ranges", "timeline"]);
        assert_eq!(result.risk_score, 75.0);
    }

    #[test]
    fn test_negative_weight_counters_agent() {
        let mut config = ConsensusConfig::equal_weights(&AgentType::BUILT_IN);
        config.weights.insert("stability".to_string(), -1.0);
        let engine = ConsensusEngine::new(config);

        let result = engine.combine(
            &[
                signal(AgentType::Safety, RiskLevel::High, 1.0),
                signal(AgentType::Stability, RiskLevel::High, 1.0),
            ],
            "STUDY-1",
        );
        // (75 − 75) / 2
        assert_eq!(result.risk_score, 0.0);
        assert_eq!(result.weighted_scores.get("stability"), Some(&-75.0));
        assert_eq!(result.unclamped_risk_score, None);
    }

    #[test]
    fn test_clamped_score_keeps_raw_value() {
        let mut config = ConsensusConfig::equal_weights(&AgentType::BUILT_IN);
        config.weights.insert("stability".to_string(), -2.0);
        let result = ConsensusEngine::new(config).combine(
            &[
                signal(AgentType::Safety, RiskLevel::Low, 1.0),
                signal(AgentType::Stability, RiskLevel::Critical, 1.0),
            ],
            "SITE-4",
        );
        // (25 − 200) / 3
        assert_eq!(result.risk_score, 0.0);
        let raw = result.unclamped_risk_score.unwrap();
        assert!((raw - (-175.0 / 3.0)).abs() < 1e-9);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json["unclamped_risk_score"].as_f64().unwrap() < -58.0);

        let in_range = ConsensusEngine::default()
            .combine(&[signal(AgentType::Safety, RiskLevel::High, 0.9)], "SITE-4");
        assert_eq!(in_range.unclamped_risk_score, None);
        let json = serde_json::to_value(&in_range).unwrap();
        assert!(json.get("unclamped_risk_score").is_none());
    }

    #[test]
    fn test_zero_weights_give_zero_score() {
        let mut config = ConsensusConfig::equal_weights(&AgentType::BUILT_IN);
        config.weights.insert("safety".to_string(), 0.0);
        let result = ConsensusEngine::new(config).combine(
            &[signal(AgentType::Safety, RiskLevel::Critical, 1.0)],
            "STUDY-1",
        );
        assert_eq!(result.risk_score, 0.0);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_zero_confidence_signals() {
        let result = equal_engine().combine(
            &[signal(AgentType::Safety, RiskLevel::Critical, 0.0)],
            "STUDY-1",
        );
        assert_eq!(result.risk_score, 0.0);
        assert_eq!(result.contributing_agents, vec!["safety"]);
    }

    #[test]
    fn test_combine_is_deterministic() {
        let signals = vec![
            signal(AgentType::Coding, RiskLevel::Medium, 0.6),
            abstained(AgentType::Safety),
            signal(AgentType::Verification, RiskLevel::Critical, 0.9),
        ];
        let engine = ConsensusEngine::default();
        let a = engine.combine_at(&signals, "SITE-2", fixed_time());
        let b = engine.combine_at(&signals, "SITE-2", fixed_time());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        let keys: Vec<&String> = a.weighted_scores.keys().collect();
        assert_eq!(keys, vec!["coding", "verification"]);
    }
}
