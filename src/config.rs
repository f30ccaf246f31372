//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.trialrisk.toml` files. Engine weights and thresholds live here as
//! explicit values that are passed into the engines at construction time.

use crate::error::ConfigError;
use crate::models::AgentType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".trialrisk.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Consensus weights and classification thresholds.
    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// DQI dimension weights and bands.
    #[serde(default)]
    pub dqi: DqiConfig,

    /// Agent selection and abstention thresholds.
    #[serde(default)]
    pub agents: AgentsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of entities assessed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Fail at startup on incomplete or unknown weight configuration.
    #[serde(default)]
    pub strict: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            concurrency: default_concurrency(),
            strict: false,
        }
    }
}

fn default_output() -> String {
    "trialrisk_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// Weight applied to an agent type with no configured weight.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Consensus engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Number of contributing agents that counts as full coverage.
    #[serde(default = "default_full_coverage_agents")]
    pub full_coverage_agents: usize,

    /// Per-agent-type voting weight. Zero mutes an agent, a negative weight
    /// counters it.
    #[serde(default = "default_agent_weights")]
    pub weights: BTreeMap<String, f64>,

    /// Risk score cut-offs for classification.
    #[serde(default)]
    pub thresholds: RiskThresholds,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            full_coverage_agents: default_full_coverage_agents(),
            weights: default_agent_weights(),
            thresholds: RiskThresholds::default(),
        }
    }
}

fn default_agent_weights() -> BTreeMap<String, f64> {
    AgentType::BUILT_IN
        .iter()
        .map(|agent_type| {
            let weight = match agent_type {
                AgentType::Safety => 1.5,
                AgentType::Compliance => 1.2,
                _ => 1.0,
            };
            (agent_type.to_string(), weight)
        })
        .collect()
}

fn default_full_coverage_agents() -> usize {
    5
}

impl ConsensusConfig {
    /// Same defaults with every listed agent weighted 1.0.
    pub fn equal_weights(agent_types: &[AgentType]) -> Self {
        Self {
            weights: agent_types
                .iter()
                .map(|t| (t.to_string(), DEFAULT_WEIGHT))
                .collect(),
            ..Self::default()
        }
    }

    /// Configured weight for an agent type, or `None` if absent.
    pub fn configured_weight(&self, agent_type: &AgentType) -> Option<f64> {
        self.weights
            .iter()
            .find(|(name, _)| AgentType::from(name.as_str()) == *agent_type)
            .map(|(_, w)| *w)
    }

    /// Checks the configuration against the agents that will vote.
    ///
    /// Every agent needs an explicit, finite weight and every weight key must
    /// name one of the agents.
    pub fn validate(&self, agent_types: &[AgentType]) -> Result<(), ConfigError> {
        for (name, weight) in &self.weights {
            if !weight.is_finite() {
                return Err(ConfigError::InvalidWeight {
                    name: name.clone(),
                    value: *weight,
                });
            }
            let parsed = AgentType::from(name.as_str());
            if !agent_types.contains(&parsed) {
                return Err(ConfigError::UnknownAgentType(name.clone()));
            }
        }

        for agent_type in agent_types {
            if self.configured_weight(agent_type).is_none() {
                return Err(ConfigError::MissingWeight(agent_type.to_string()));
            }
        }

        self.thresholds.validate()
    }
}

/// Risk score cut-offs. A score at or above a cut-off gets that level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    #[serde(default = "default_critical")]
    pub critical: f64,
    #[serde(default = "default_high")]
    pub high: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: default_critical(),
            high: default_high(),
            medium: default_medium(),
        }
    }
}

fn default_critical() -> f64 {
    85.0
}

fn default_high() -> f64 {
    65.0
}

fn default_medium() -> f64 {
    40.0
}

impl RiskThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_descending("risk", &[self.critical, self.high, self.medium])
    }
}

/// DQI engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqiConfig {
    /// Minimum score change counted as a trend.
    #[serde(default = "default_trend_tolerance")]
    pub trend_tolerance: f64,

    /// Dimension weights. The key set is the full dimension set used for
    /// partial-calculation detection. Weights are renormalized over the
    /// dimensions present, so they need not sum to 1.0.
    #[serde(default = "default_dimension_weights")]
    pub weights: BTreeMap<String, f64>,

    /// Band cut-offs.
    #[serde(default)]
    pub bands: BandThresholds,
}

impl Default for DqiConfig {
    fn default() -> Self {
        Self {
            trend_tolerance: default_trend_tolerance(),
            weights: default_dimension_weights(),
            bands: BandThresholds::default(),
        }
    }
}

fn default_dimension_weights() -> BTreeMap<String, f64> {
    [
        ("safety", 0.35),
        ("compliance", 0.25),
        ("completeness", 0.20),
        ("operations", 0.15),
    ]
    .into_iter()
    .map(|(name, weight)| (name.to_string(), weight))
    .collect()
}

fn default_trend_tolerance() -> f64 {
    2.0
}

impl DqiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ConfigError::NegativeDimensionWeight {
                    name: name.clone(),
                    value: *weight,
                });
            }
        }

        let sum: f64 = self.weights.values().sum();
        if sum <= 0.0 {
            return Err(ConfigError::WeightSum(sum));
        }
        if (sum - 1.0).abs() > 1e-6 {
            debug!("DQI dimension weights sum to {:.4}; scores are renormalized", sum);
        }

        self.bands.validate()
    }
}

/// DQI band cut-offs. RED is everything below `orange`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandThresholds {
    #[serde(default = "default_green")]
    pub green: f64,
    #[serde(default = "default_amber")]
    pub amber: f64,
    #[serde(default = "default_orange")]
    pub orange: f64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            green: default_green(),
            amber: default_amber(),
            orange: default_orange(),
        }
    }
}

fn default_green() -> f64 {
    85.0
}

fn default_amber() -> f64 {
    65.0
}

fn default_orange() -> f64 {
    40.0
}

impl BandThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_descending("band", &[self.green, self.amber, self.orange])
    }
}

fn check_descending(what: &'static str, values: &[f64]) -> Result<(), ConfigError> {
    let in_range = values.iter().all(|v| (0.0..=100.0).contains(v));
    let descending = values.windows(2).all(|w| w[0] > w[1]);
    if in_range && descending {
        Ok(())
    } else {
        Err(ConfigError::Thresholds {
            what,
            detail: format!("{:?}", values),
        })
    }
}

/// Agent selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Default minimum share of required features.
    #[serde(default = "default_abstention_threshold")]
    pub abstention_threshold: f64,

    /// Built-in agents to leave out.
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Per-agent abstention thresholds.
    #[serde(default)]
    pub abstention_overrides: BTreeMap<String, f64>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            abstention_threshold: default_abstention_threshold(),
            disabled: Vec::new(),
            abstention_overrides: BTreeMap::new(),
        }
    }
}

fn default_abstention_threshold() -> f64 {
    crate::agents::DEFAULT_ABSTENTION_THRESHOLD
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        if args.strict {
            self.general.strict = true;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Validates engine settings against the agents that will run.
    ///
    /// Band and weight-sum problems are always fatal. Weight-table problems
    /// are fatal in strict mode and otherwise logged, since the consensus
    /// engine falls back to the default weight.
    pub fn validate(&self, agent_types: &[AgentType]) -> Result<()> {
        self.dqi.validate().context("Invalid [dqi] configuration")?;
        self.consensus
            .thresholds
            .validate()
            .context("Invalid [consensus.thresholds] configuration")?;

        if let Err(e) = self.consensus.validate(agent_types) {
            if self.general.strict {
                return Err(e).context("Invalid [consensus] configuration (strict mode)");
            }
            warn!("Consensus configuration: {} (default weight {} applies)", e, DEFAULT_WEIGHT);
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.concurrency, 4);
        assert_eq!(config.consensus.thresholds.critical, 85.0);
        assert_eq!(config.consensus.weights.len(), 8);
        assert_eq!(config.consensus.weights.get("safety"), Some(&1.5));
        assert_eq!(config.dqi.weights.get("safety"), Some(&0.35));
        assert!(config.dqi.validate().is_ok());
        assert!(config.consensus.validate(&AgentType::BUILT_IN).is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
concurrency = 8
strict = true

[consensus.weights]
safety = 2.0
stability = -0.5

[consensus.thresholds]
high = 50.0

[dqi.weights]
safety = 0.5
completeness = 0.5

[agents]
disabled = ["coding"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.concurrency, 8);
        assert!(config.general.strict);
        assert_eq!(config.consensus.weights.len(), 2);
        assert_eq!(config.consensus.weights.get("stability"), Some(&-0.5));
        assert_eq!(config.consensus.thresholds.high, 50.0);
        assert_eq!(config.consensus.thresholds.critical, 85.0);
        assert!(config.dqi.validate().is_ok());
        assert_eq!(config.agents.disabled, vec!["coding"]);
    }

    #[test]
    fn test_missing_weight_is_configuration_error() {
        let mut config = ConsensusConfig::default();
        config.weights.remove("stability");
        assert_eq!(
            config.validate(&AgentType::BUILT_IN),
            Err(ConfigError::MissingWeight("stability".to_string()))
        );
    }

    #[test]
    fn test_unknown_weight_key_is_configuration_error() {
        let mut config = ConsensusConfig::default();
        config.weights.insert("horoscope".to_string(), 1.0);
        assert_eq!(
            config.validate(&AgentType::BUILT_IN),
            Err(ConfigError::UnknownAgentType("horoscope".to_string()))
        );
    }

    #[test]
    fn test_dimension_weights_need_not_sum_to_one() {
        let mut config = DqiConfig::default();
        assert_eq!(config.weights.len(), 4);
        assert!((config.weights.values().sum::<f64>() - 0.95).abs() < 1e-9);
        assert!(config.validate().is_ok());

        config.weights.insert("operations".to_string(), 0.65);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dimension_weights_must_be_positive_in_total() {
        let mut config = DqiConfig::default();
        for weight in config.weights.values_mut() {
            *weight = 0.0;
        }
        assert!(matches!(config.validate(), Err(ConfigError::WeightSum(_))));

        config.weights.clear();
        assert!(matches!(config.validate(), Err(ConfigError::WeightSum(_))));
    }

    #[test]
    fn test_thresholds_must_descend() {
        let thresholds = RiskThresholds {
            critical: 60.0,
            high: 65.0,
            medium: 40.0,
        };
        assert!(thresholds.validate().is_err());

        let bands = BandThresholds {
            green: 85.0,
            amber: 65.0,
            orange: 140.0,
        };
        assert!(bands.validate().is_err());
    }

    #[test]
    fn test_strict_mode_rejects_incomplete_weights() {
        let mut config = Config::default();
        config.consensus.weights.remove("timeline");
        assert!(config.validate(&AgentType::BUILT_IN).is_ok());

        config.general.strict = true;
        assert!(config.validate(&AgentType::BUILT_IN).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nconcurrency = 2\n").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.general.concurrency, 2);
        assert_eq!(config.consensus.full_coverage_agents, 5);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[consensus.weights]"));
        assert!(toml_str.contains("[dqi.weights]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.dqi.weights, Config::default().dqi.weights);
    }
}
