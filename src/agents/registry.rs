//! Agent registration.
//!
//! Agents are selected through an ordered list rather than a type
//! hierarchy. Registry order is the order signals come out in.

use super::coding::CodingAgent;
use super::compliance::ComplianceAgent;
use super::completeness::DataCompletenessAgent;
use super::query::QueryBurdenAgent;
use super::safety::SafetyAgent;
use super::stability::StabilityAgent;
use super::timeline::TimelineAgent;
use super::verification::VerificationAgent;
use super::SignalAgent;
use crate::config::AgentsConfig;
use crate::error::ConfigError;
use crate::features::FeatureVector;
use crate::models::{AgentSignal, AgentType};
use tracing::debug;

/// Runs every agent once against the same feature vector.
pub fn evaluate_signals(
    features: &FeatureVector,
    entity_id: &str,
    agents: &[Box<dyn SignalAgent>],
) -> Vec<AgentSignal> {
    agents
        .iter()
        .map(|agent| agent.analyze(features, entity_id))
        .collect()
}

/// Ordered set of agents applied to every entity.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Box<dyn SignalAgent>>,
}

impl AgentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in agents with default abstention thresholds.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for agent_type in AgentType::BUILT_IN.iter() {
            if let Some(agent) = built_in(agent_type, super::DEFAULT_ABSTENTION_THRESHOLD) {
                registry.register(agent);
            }
        }
        registry
    }

    /// Built-in agents with thresholds and exclusions from configuration.
    pub fn from_config(config: &AgentsConfig) -> Result<Self, ConfigError> {
        check_threshold("default", config.abstention_threshold)?;

        for (name, threshold) in &config.abstention_overrides {
            if matches!(AgentType::from(name.as_str()), AgentType::Other(_)) {
                return Err(ConfigError::UnknownAgentType(name.clone()));
            }
            check_threshold(name, *threshold)?;
        }

        let disabled: Vec<AgentType> = config
            .disabled
            .iter()
            .map(|name| match AgentType::from(name.as_str()) {
                AgentType::Other(unknown) => Err(ConfigError::UnknownAgentType(unknown)),
                known => Ok(known),
            })
            .collect::<Result<_, _>>()?;

        let mut registry = Self::new();
        for agent_type in AgentType::BUILT_IN.iter() {
            if disabled.contains(agent_type) {
                debug!("Agent {} disabled by configuration", agent_type);
                continue;
            }
            let threshold = config
                .abstention_overrides
                .iter()
                .find(|(name, _)| AgentType::from(name.as_str()) == *agent_type)
                .map(|(_, t)| *t)
                .unwrap_or(config.abstention_threshold);

            if let Some(agent) = built_in(agent_type, threshold) {
                registry.register(agent);
            }
        }

        Ok(registry)
    }

    /// Appends an agent, e.g. a third-party one.
    pub fn register(&mut self, agent: Box<dyn SignalAgent>) {
        self.agents.push(agent);
    }

    pub fn agents(&self) -> &[Box<dyn SignalAgent>] {
        &self.agents
    }

    pub fn agent_types(&self) -> Vec<AgentType> {
        self.agents.iter().map(|a| a.agent_type()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Runs all registered agents against one entity.
    pub fn evaluate(&self, features: &FeatureVector, entity_id: &str) -> Vec<AgentSignal> {
        evaluate_signals(features, entity_id, &self.agents)
    }
}

fn check_threshold(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::AbstentionThreshold {
            name: name.to_string(),
            value,
        })
    }
}

fn built_in(agent_type: &AgentType, threshold: f64) -> Option<Box<dyn SignalAgent>> {
    let agent: Box<dyn SignalAgent> = match agent_type {
        AgentType::Safety => Box::new(SafetyAgent::new().with_abstention_threshold(threshold)),
        AgentType::DataCompleteness => {
            Box::new(DataCompletenessAgent::new().with_abstention_threshold(threshold))
        }
        AgentType::QueryBurden => Box::new(QueryBurdenAgent::new().with_abstention_threshold(threshold)),
        AgentType::Coding => Box::new(CodingAgent::new().with_abstention_threshold(threshold)),
        AgentType::Compliance => Box::new(ComplianceAgent::new().with_abstention_threshold(threshold)),
        AgentType::Verification => {
            Box::new(VerificationAgent::new().with_abstention_threshold(threshold))
        }
        AgentType::Timeline => Box::new(TimelineAgent::new().with_abstention_threshold(threshold)),
        AgentType::Stability => Box::new(StabilityAgent::new().with_abstention_threshold(threshold)),
        AgentType::Other(_) => return None,
    };
    Some(agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Findings, SignalAgent};
    use crate::models::RiskLevel;
    use std::collections::BTreeMap;

    #[test]
    fn test_standard_registry_has_all_built_ins() {
        let registry = AgentRegistry::standard();
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.agent_types(), AgentType::BUILT_IN.to_vec());
    }

    #[test]
    fn test_empty_features_abstain_everywhere() {
        let registry = AgentRegistry::standard();
        let signals = registry.evaluate(&FeatureVector::new(), "STUDY-1");
        assert_eq!(signals.len(), 8);
        assert!(signals.iter().all(|s| s.abstained && s.confidence == 0.0));
    }

    #[test]
    fn test_from_config_disables_and_overrides() {
        let config = AgentsConfig {
            abstention_threshold: 0.5,
            abstention_overrides: BTreeMap::from([("safety".to_string(), 1.0)]),
            disabled: vec!["stability".to_string()],
        };
        let registry = AgentRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 7);
        assert!(!registry.agent_types().contains(&AgentType::Stability));

        let fv = FeatureVector::from_pairs([("sae_pending_review", Some(0.0))]).unwrap();
        let signals = registry.evaluate(&fv, "STUDY-1");
        assert!(signals[0].abstained);
    }

    #[test]
    fn test_from_config_rejects_unknown_and_out_of_range() {
        let config = AgentsConfig {
            disabled: vec!["astrology".to_string()],
            ..AgentsConfig::default()
        };
        assert_eq!(
            AgentRegistry::from_config(&config).err(),
            Some(ConfigError::UnknownAgentType("astrology".to_string()))
        );

        let config = AgentsConfig {
            abstention_threshold: 1.5,
            ..AgentsConfig::default()
        };
        assert!(AgentRegistry::from_config(&config).is_err());
    }

    struct LabAgent;

    impl SignalAgent for LabAgent {
        fn agent_type(&self) -> AgentType {
            AgentType::Other("lab_ranges".to_string())
        }

        fn required_features(&self) -> &[&'static str] {
            &["out_of_range_labs_pct"]
        }

        fn assess(&self, _features: &FeatureVector) -> Findings {
            let mut findings = Findings::new();
            findings.escalate(RiskLevel::Medium, None);
            findings
        }
    }

    #[test]
    fn test_third_party_agent_registration() {
        let mut registry = AgentRegistry::new();
        registry.register(Box::new(LabAgent));
        let fv = FeatureVector::from_pairs([("out_of_range_labs_pct", Some(4.0))]).unwrap();
        let signals = registry.evaluate(&fv, "SUBJ-1");
        assert_eq!(signals[0].risk_level, RiskLevel::Medium);
        assert_eq!(signals[0].agent_type.as_str(), "lab_ranges");
    }
}
