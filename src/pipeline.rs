//! Per-entity assessment and bounded batch execution.
//!
//! One entity runs through agents, consensus, DQI and decision in order.
//! A batch fans entities out over blocking worker tasks and collects the
//! results sorted by entity id.

use crate::agents::AgentRegistry;
use crate::config::Config;
use crate::engine::{default_dimension, dimensions_from_signals, ConsensusEngine, DecisionEngine, DqiEngine};
use crate::error::{ConfigError, InputError};
use crate::features::FeatureVector;
use crate::models::{ConsensusResult, DqiResult, EntityType, RiskDecision};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// One entity of an input batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInput {
    pub entity_id: String,
    #[serde(default)]
    pub entity_type: EntityType,
    pub features: FeatureVector,
    /// Overall DQI from the previous snapshot, for the trend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_dqi: Option<f64>,
}

/// Parses a JSON array of entities.
pub fn parse_batch(json: &str) -> Result<Vec<EntityInput>, InputError> {
    serde_json::from_str(json).map_err(|e| InputError::MalformedBatch(e.to_string()))
}

/// Everything produced for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAssessment {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub consensus: ConsensusResult,
    pub dqi: DqiResult,
    pub decision: RiskDecision,
}

pub struct Pipeline {
    registry: AgentRegistry,
    consensus: ConsensusEngine,
    dqi: DqiEngine,
    decision: DecisionEngine,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(
            AgentRegistry::standard(),
            ConsensusEngine::default(),
            DqiEngine::default(),
        )
    }
}

impl Pipeline {
    pub fn new(registry: AgentRegistry, consensus: ConsensusEngine, dqi: DqiEngine) -> Self {
        Self {
            registry,
            consensus,
            dqi,
            decision: DecisionEngine::new(),
        }
    }

    /// Builds the agents and engines described by a configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            AgentRegistry::from_config(&config.agents)?,
            ConsensusEngine::new(config.consensus.clone()),
            DqiEngine::new(config.dqi.clone())?,
        ))
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn assess(&self, entity: &EntityInput) -> EntityAssessment {
        self.assess_at(entity, Utc::now())
    }

    /// Assesses one entity with every result stamped `timestamp`.
    pub fn assess_at(&self, entity: &EntityInput, timestamp: DateTime<Utc>) -> EntityAssessment {
        let id = entity.entity_id.as_str();

        let signals = self.registry.evaluate(&entity.features, id);
        let dimensions = dimensions_from_signals(&signals, default_dimension);
        let consensus = self.consensus.combine_at(&signals, id, timestamp);
        let dqi = self
            .dqi
            .calculate_with_previous(id, &dimensions, entity.previous_dqi, timestamp);
        let decision = self.decision.decide_for(&consensus, entity.entity_type);

        debug!(
            "Assessed {} {}: risk {} / DQI {:.1} {}",
            entity.entity_type, id, consensus.risk_level, dqi.overall_score, dqi.band
        );

        EntityAssessment {
            entity_id: entity.entity_id.clone(),
            entity_type: entity.entity_type,
            consensus,
            dqi,
            decision,
        }
    }

    /// Assesses a batch with at most `concurrency` entities in flight.
    ///
    /// Must run inside a tokio runtime. Output is sorted by entity id. A
    /// worker that panics is logged and its entity left out.
    pub async fn assess_batch(
        self: Arc<Self>,
        entities: Vec<EntityInput>,
        concurrency: usize,
    ) -> Vec<EntityAssessment> {
        let total = entities.len();
        let concurrency = concurrency.max(1);
        info!("Assessing {} entities ({} at a time)", total, concurrency);

        let tasks = entities.into_iter().map(|entity| {
            let pipeline = Arc::clone(&self);
            let id = entity.entity_id.clone();
            async move {
                let joined = tokio::task::spawn_blocking(move || pipeline.assess(&entity)).await;
                (id, joined)
            }
        });

        let mut results: Vec<EntityAssessment> = stream::iter(tasks)
            .buffer_unordered(concurrency)
            .filter_map(|(id, joined)| async move {
                match joined {
                    Ok(assessment) => Some(assessment),
                    Err(e) => {
                        error!("Assessment of {} failed: {}", id, e);
                        None
                    }
                }
            })
            .collect()
            .await;

        results.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        info!("Assessed {}/{} entities", results.len(), total);
        results
    }
}
