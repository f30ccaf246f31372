//! Data Quality Index aggregation.
//!
//! A weighted mean over whichever configured dimensions have data, with the
//! weights renormalized over the present set.

use crate::config::DqiConfig;
use crate::error::ConfigError;
use crate::models::{clamp_score, AgentSignal, AgentType, DqiBand, DqiResult, RiskLevel, Trend};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Dimension an agent type feeds by default.
pub fn default_dimension(agent_type: &AgentType) -> Option<&'static str> {
    match agent_type {
        AgentType::Safety => Some("safety"),
        AgentType::Compliance | AgentType::Verification => Some("compliance"),
        AgentType::DataCompleteness | AgentType::QueryBurden | AgentType::Coding => {
            Some("completeness")
        }
        AgentType::Timeline | AgentType::Stability => Some("operations"),
        AgentType::Other(_) => None,
    }
}

/// Quality score (0-100, higher is better) implied by a risk level.
pub fn signal_quality(level: RiskLevel) -> Option<f64> {
    match level {
        RiskLevel::Low => Some(100.0),
        RiskLevel::Medium => Some(200.0 / 3.0),
        RiskLevel::High => Some(100.0 / 3.0),
        RiskLevel::Critical => Some(0.0),
        RiskLevel::Unknown => None,
    }
}

/// Builds dimension scores from judged agent signals.
///
/// Each dimension gets the confidence-weighted mean quality of the signals
/// mapped to it. Dimensions whose agents all abstained are left out, as are
/// agents `dimension_of` maps to `None`.
pub fn dimensions_from_signals<F, S>(signals: &[AgentSignal], dimension_of: F) -> BTreeMap<String, f64>
where
    F: Fn(&AgentType) -> Option<S>,
    S: AsRef<str>,
{
    let mut sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();

    for signal in signals.iter().filter(|s| s.is_contributing()) {
        let Some(dimension) = dimension_of(&signal.agent_type) else {
            continue;
        };
        let Some(quality) = signal_quality(signal.risk_level) else {
            continue;
        };
        let entry = sums.entry(dimension.as_ref().to_string()).or_insert((0.0, 0.0));
        entry.0 += quality * signal.confidence;
        entry.1 += signal.confidence;
    }

    sums.into_iter()
        .filter(|(_, (_, weight))| *weight > 0.0)
        .map(|(dimension, (total, weight))| (dimension, total / weight))
        .collect()
}

pub struct DqiEngine {
    config: DqiConfig,
}

impl Default for DqiEngine {
    fn default() -> Self {
        Self {
            config: DqiConfig::default(),
        }
    }
}

impl DqiEngine {
    pub fn new(config: DqiConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DqiConfig {
        &self.config
    }

    pub fn band_for(&self, score: f64) -> DqiBand {
        let bands = &self.config.bands;
        if score >= bands.green {
            DqiBand::Green
        } else if score >= bands.amber {
            DqiBand::Amber
        } else if score >= bands.orange {
            DqiBand::Orange
        } else {
            DqiBand::Red
        }
    }

    pub fn trend(&self, current: f64, previous: Option<f64>) -> Trend {
        match previous {
            Some(previous) if previous.is_finite() => {
                let delta = current - previous;
                if delta > self.config.trend_tolerance {
                    Trend::Improving
                } else if delta < -self.config.trend_tolerance {
                    Trend::Declining
                } else {
                    Trend::Stable
                }
            }
            _ => Trend::Unknown,
        }
    }

    /// Scores one entity with no history, stamped with the current time.
    pub fn calculate(&self, entity_id: &str, dimension_scores: &BTreeMap<String, f64>) -> DqiResult {
        self.calculate_with_previous(entity_id, dimension_scores, None, Utc::now())
    }

    pub fn calculate_with_previous(
        &self,
        entity_id: &str,
        dimension_scores: &BTreeMap<String, f64>,
        previous_overall: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> DqiResult {
        for name in dimension_scores.keys() {
            if !self.config.weights.contains_key(name) {
                warn!("Ignoring unconfigured DQI dimension '{}' for {}", name, entity_id);
            }
        }

        let mut present: BTreeMap<String, f64> = BTreeMap::new();
        let mut clamped_inputs = BTreeMap::new();
        let mut missing_dimensions = Vec::new();

        for name in self.config.weights.keys() {
            match dimension_scores.get(name) {
                Some(raw) if raw.is_finite() => {
                    let score = clamp_score(*raw);
                    if score != *raw {
                        debug!("Clamped DQI dimension {} of {} from {}", name, entity_id, raw);
                        clamped_inputs.insert(name.clone(), *raw);
                    }
                    present.insert(name.clone(), score);
                }
                _ => missing_dimensions.push(name.clone()),
            }
        }

        let total_weight: f64 = present.keys().map(|name| self.config.weights[name]).sum();
        let overall_score = if total_weight > 0.0 {
            let mean: f64 = present
                .iter()
                .map(|(name, score)| score * (self.config.weights[name] / total_weight))
                .sum();
            clamp_score(mean)
        } else {
            0.0
        };

        let partial_calculation = !missing_dimensions.is_empty();
        let band = self.band_for(overall_score);

        debug!(
            "DQI for {}: {:.1} {} ({} of {} dimensions)",
            entity_id,
            overall_score,
            band,
            present.len(),
            self.config.weights.len()
        );

        DqiResult {
            entity_id: entity_id.to_string(),
            overall_score,
            dimension_scores: present,
            band,
            partial_calculation,
            trend: self.trend(overall_score, previous_overall),
            timestamp,
            missing_dimensions,
            clamped_inputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BandThresholds;

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_single_dimension_renormalizes() {
        let result = DqiEngine::default().calculate("STUDY-1", &scores(&[("safety", 90.0)]));
        assert_eq!(result.overall_score, 90.0);
        assert!(result.partial_calculation);
        assert_eq!(result.band, DqiBand::Green);
        assert_eq!(result.missing_dimensions.len(), 3);
        assert_eq!(result.trend, Trend::Unknown);
    }

    #[test]
    fn test_full_dimension_set_is_not_partial() {
        let result = DqiEngine::default().calculate(
            "STUDY-1",
            &scores(&[
                ("safety", 100.0),
                ("compliance", 80.0),
                ("completeness", 60.0),
                ("operations", 40.0),
            ]),
        );
        // (35 + 20 + 12 + 6) / 0.95
        assert!((result.overall_score - 73.0 / 0.95).abs() < 1e-9);
        assert!(!result.partial_calculation);
        assert!(result.missing_dimensions.is_empty());
        assert_eq!(result.band, DqiBand::Amber);
    }

    #[test]
    fn test_band_boundaries() {
        let engine = DqiEngine::default();
        let at = |score: f64| engine.calculate("S", &scores(&[("compliance", score)]));
        assert_eq!(at(85.0).band, DqiBand::Green);
        assert_eq!(at(84.999).band, DqiBand::Amber);
        assert_eq!(at(65.0).band, DqiBand::Amber);
        assert_eq!(at(40.0).band, DqiBand::Orange);
        assert_eq!(at(39.9).band, DqiBand::Red);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let result = DqiEngine::default().calculate(
            "SITE-3",
            &scores(&[("safety", 140.0), ("compliance", -20.0)]),
        );
        assert_eq!(result.dimension_scores["safety"], 100.0);
        assert_eq!(result.dimension_scores["compliance"], 0.0);
        assert_eq!(result.clamped_inputs["safety"], 140.0);
        assert_eq!(result.clamped_inputs["compliance"], -20.0);
        assert!((0.0..=100.0).contains(&result.overall_score));
    }

    #[test]
    fn test_no_dimensions_is_red_and_partial() {
        let result = DqiEngine::default().calculate("SITE-3", &BTreeMap::new());
        assert_eq!(result.overall_score, 0.0);
        assert_eq!(result.band, DqiBand::Red);
        assert!(result.partial_calculation);
    }

    #[test]
    fn test_non_finite_and_unknown_dimensions_are_ignored() {
        let result = DqiEngine::default().calculate(
            "SITE-3",
            &scores(&[("safety", 70.0), ("operations", f64::NAN), ("morale", 5.0)]),
        );
        assert_eq!(result.overall_score, 70.0);
        assert!(result.missing_dimensions.contains(&"operations".to_string()));
        assert!(!result.dimension_scores.contains_key("morale"));
    }

    #[test]
    fn test_trend_against_previous() {
        let engine = DqiEngine::default();
        let now = Utc::now();
        let input = scores(&[("safety", 80.0)]);
        let trend = |prev| engine.calculate_with_previous("S", &input, prev, now).trend;
        assert_eq!(trend(Some(70.0)), Trend::Improving);
        assert_eq!(trend(Some(79.0)), Trend::Stable);
        assert_eq!(trend(Some(82.0)), Trend::Stable);
        assert_eq!(trend(Some(90.0)), Trend::Declining);
        assert_eq!(trend(None), Trend::Unknown);
    }

    #[test]
    fn test_new_rejects_bad_configuration() {
        let mut config = DqiConfig::default();
        config.weights.insert("safety".to_string(), -0.5);
        assert!(matches!(
            DqiEngine::new(config),
            Err(ConfigError::NegativeDimensionWeight { .. })
        ));

        let config = DqiConfig {
            bands: BandThresholds {
                green: 60.0,
                amber: 70.0,
                orange: 40.0,
            },
            ..DqiConfig::default()
        };
        assert!(DqiEngine::new(config).is_err());
    }

    #[test]
    fn test_dimensions_from_signals() {
        let signals = vec![
            AgentSignal::judged(AgentType::Safety, RiskLevel::Low, 0.9, vec![], vec![], 2),
            AgentSignal::judged(AgentType::Compliance, RiskLevel::Critical, 1.0, vec![], vec![], 2),
            AgentSignal::judged(AgentType::Verification, RiskLevel::Low, 1.0, vec![], vec![], 2),
            AgentSignal::abstain(AgentType::Coding, "missing".to_string(), 0),
        ];
        let dims = dimensions_from_signals(&signals, default_dimension);

        assert_eq!(dims["safety"], 100.0);
        assert_eq!(dims["compliance"], 50.0);
        assert!(!dims.contains_key("completeness"));
        assert!(!dims.contains_key("operations"));
    }

    #[test]
    fn test_coding_feeds_completeness() {
        let signals = vec![
            AgentSignal::judged(AgentType::DataCompleteness, RiskLevel::Low, 1.0, vec![], vec![], 2),
            AgentSignal::judged(AgentType::Coding, RiskLevel::Critical, 1.0, vec![], vec![], 2),
        ];
        let dims = dimensions_from_signals(&signals, default_dimension);
        assert_eq!(dims.len(), 1);
        assert_eq!(dims["completeness"], 50.0);
    }

    #[test]
    fn test_four_dimension_table_scores_without_partial() {
        let config = DqiConfig {
            weights: scores(&[
                ("safety", 0.35),
                ("compliance", 0.25),
                ("completeness", 0.20),
                ("operations", 0.15),
            ]),
            ..DqiConfig::default()
        };
        let engine = DqiEngine::new(config).unwrap();
        let result = engine.calculate(
            "STUDY-1",
            &scores(&[
                ("safety", 80.0),
                ("compliance", 80.0),
                ("completeness", 80.0),
                ("operations", 80.0),
            ]),
        );
        assert!((result.overall_score - 80.0).abs() < 1e-9);
        assert!(!result.partial_calculation);
    }
}
