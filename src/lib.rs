//! TrialRisk - signal-to-decision risk assessment for clinical trials.
//!
//! Independent signal agents judge one entity (study, site or subject)
//! from a feature vector. Their signals are reconciled by weighted
//! consensus into one verdict, summarized as a Data Quality Index and
//! turned into a prioritized, role-targeted action plan.
//!
//! ```no_run
//! use trialrisk::agents::AgentRegistry;
//! use trialrisk::config::ConsensusConfig;
//! use trialrisk::features::FeatureVector;
//!
//! let features = FeatureVector::from_pairs([
//!     ("sae_pending_review", Some(4.0)),
//!     ("sae_overdue_days", Some(2.0)),
//! ])?;
//! let registry = AgentRegistry::standard();
//! let signals = trialrisk::evaluate_signals(&features, "STUDY-1", registry.agents());
//! let verdict = trialrisk::consensus(&signals, "STUDY-1", &ConsensusConfig::default());
//! let decision = trialrisk::decide(&verdict);
//! println!("{}: {}", decision.risk_level, decision.decision_rationale);
//! # Ok::<(), trialrisk::error::InputError>(())
//! ```

pub mod agents;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod report;

pub use agents::{evaluate_signals, AgentRegistry, SignalAgent};
pub use engine::{ConsensusEngine, DecisionEngine, DqiEngine};
pub use error::{ConfigError, InputError};
pub use features::FeatureVector;
pub use pipeline::{EntityAssessment, EntityInput, Pipeline};

use config::{ConsensusConfig, DqiConfig};
use models::{AgentSignal, ConsensusResult, DqiResult, RiskDecision};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Combines signals under the given weights and thresholds, stamped with
/// the current time. Use [`consensus_at`] for byte-identical output.
pub fn consensus(signals: &[AgentSignal], entity_id: &str, config: &ConsensusConfig) -> ConsensusResult {
    consensus_at(signals, entity_id, config, Utc::now())
}

/// Deterministic form of [`consensus`]: equal inputs give equal results.
pub fn consensus_at(
    signals: &[AgentSignal],
    entity_id: &str,
    config: &ConsensusConfig,
    timestamp: DateTime<Utc>,
) -> ConsensusResult {
    ConsensusEngine::new(config.clone()).combine_at(signals, entity_id, timestamp)
}

/// Computes a DQI; fails only if `config` itself is invalid.
pub fn calculate_dqi(
    entity_id: &str,
    dimension_scores: &BTreeMap<String, f64>,
    config: &DqiConfig,
) -> Result<DqiResult, ConfigError> {
    Ok(DqiEngine::new(config.clone())?.calculate(entity_id, dimension_scores))
}

/// Plans actions for a consensus verdict.
pub fn decide(consensus: &ConsensusResult) -> RiskDecision {
    DecisionEngine::new().decide(consensus)
}
