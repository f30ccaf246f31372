//! Portfolio aggregation and statistics.
//!
//! This module summarizes a batch of entity assessments: counts per risk
//! level and DQI band, riskiest entities, and how often each agent had to
//! abstain.

use crate::models::{DqiBand, EntityType, RiskLevel};
use crate::pipeline::EntityAssessment;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Summary statistics over a batch of assessments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Number of entities assessed.
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Entities no agent could judge.
    pub unknown: usize,
    /// Entity count per DQI band.
    pub by_band: BTreeMap<DqiBand, usize>,
    /// DQI results computed from an incomplete dimension set.
    pub partial_dqi: usize,
    /// Mean overall DQI, 0 for an empty batch.
    pub average_dqi: f64,
    /// Entity count per entity type.
    #[serde(default)]
    pub by_entity_type: BTreeMap<EntityType, usize>,
}

impl PortfolioSummary {
    /// Creates a summary from a list of assessments.
    pub fn from_assessments(assessments: &[EntityAssessment]) -> Self {
        let mut summary = Self {
            total: assessments.len(),
            by_entity_type: entity_type_distribution(assessments),
            ..Self::default()
        };

        for assessment in assessments {
            match assessment.consensus.risk_level {
                RiskLevel::Critical => summary.critical += 1,
                RiskLevel::High => summary.high += 1,
                RiskLevel::Medium => summary.medium += 1,
                RiskLevel::Low => summary.low += 1,
                RiskLevel::Unknown => summary.unknown += 1,
            }
            *summary.by_band.entry(assessment.dqi.band).or_insert(0) += 1;
            if assessment.dqi.partial_calculation {
                summary.partial_dqi += 1;
            }
        }

        if !assessments.is_empty() {
            summary.average_dqi = assessments.iter().map(|a| a.dqi.overall_score).sum::<f64>()
                / assessments.len() as f64;
        }

        summary
    }

    /// Number of entities at or above a risk level.
    pub fn at_or_above(&self, level: RiskLevel) -> usize {
        [
            (RiskLevel::Low, self.low),
            (RiskLevel::Medium, self.medium),
            (RiskLevel::High, self.high),
            (RiskLevel::Critical, self.critical),
        ]
        .iter()
        .filter(|(l, _)| *l >= level)
        .map(|(_, n)| n)
        .sum()
    }
}

fn riskier(a: &EntityAssessment, b: &EntityAssessment) -> Ordering {
    b.consensus
        .risk_level
        .cmp(&a.consensus.risk_level)
        .then_with(|| {
            b.consensus
                .risk_score
                .partial_cmp(&a.consensus.risk_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.entity_id.cmp(&b.entity_id))
}

/// Sort assessments by risk (critical first, then score, then id).
pub fn sort_by_risk(assessments: &mut [EntityAssessment]) {
    assessments.sort_by(riskier);
}

/// Get the top N assessments by risk.
pub fn top_risks(assessments: &[EntityAssessment], n: usize) -> Vec<&EntityAssessment> {
    let mut sorted: Vec<&EntityAssessment> = assessments.iter().collect();
    sorted.sort_by(|a, b| riskier(a, b));
    sorted.truncate(n);
    sorted
}

/// Drop assessments below a risk level. `Unknown` entities are kept, since
/// they still need a data follow-up.
pub fn retain_at_or_above(assessments: &mut Vec<EntityAssessment>, level: RiskLevel) {
    assessments.retain(|a| {
        a.consensus.risk_level >= level || a.consensus.risk_level == RiskLevel::Unknown
    });
}

/// Group assessments by entity type.
pub fn group_by_entity_type(
    assessments: &[EntityAssessment],
) -> BTreeMap<EntityType, Vec<&EntityAssessment>> {
    let mut grouped: BTreeMap<EntityType, Vec<&EntityAssessment>> = BTreeMap::new();
    for assessment in assessments {
        grouped.entry(assessment.entity_type).or_default().push(assessment);
    }
    grouped
}

/// Count entities per type.
pub fn entity_type_distribution(assessments: &[EntityAssessment]) -> BTreeMap<EntityType, usize> {
    let mut dist = BTreeMap::new();
    for assessment in assessments {
        *dist.entry(assessment.entity_type).or_insert(0) += 1;
    }
    dist
}

/// Share of entities each agent abstained on, highest first.
pub fn abstention_rates(assessments: &[EntityAssessment]) -> Vec<(String, f64)> {
    if assessments.is_empty() {
        return Vec::new();
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for assessment in assessments {
        for signal in &assessment.consensus.agent_signals {
            let entry = counts.entry(signal.agent_type.to_string()).or_insert(0);
            if signal.abstained {
                *entry += 1;
            }
        }
    }

    let total = assessments.len() as f64;
    let mut rates: Vec<(String, f64)> = counts
        .into_iter()
        .map(|(agent, n)| (agent, n as f64 / total))
        .collect();
    rates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    rates
}

/// Generate a text summary of portfolio statistics.
pub fn generate_summary_text(summary: &PortfolioSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Entities Assessed: {}", summary.total));
    for (level, count) in [
        (RiskLevel::Critical, summary.critical),
        (RiskLevel::High, summary.high),
        (RiskLevel::Medium, summary.medium),
        (RiskLevel::Low, summary.low),
        (RiskLevel::Unknown, summary.unknown),
    ] {
        lines.push(format!("- {} {}: {}", level.emoji(), level, count));
    }
    lines.push(format!(
        "At HIGH or above: {}",
        summary.at_or_above(RiskLevel::High)
    ));

    if !summary.by_entity_type.is_empty() {
        let types: Vec<String> = summary
            .by_entity_type
            .iter()
            .map(|(entity_type, count)| format!("{} {}", entity_type, count))
            .collect();
        lines.push(format!("By type: {}", types.join(", ")));
    }

    if summary.total > 0 {
        lines.push(String::new());
        lines.push(format!(
            "Average DQI: {:.1} ({} partial)",
            summary.average_dqi, summary.partial_dqi
        ));
        for (band, count) in summary.by_band.iter().rev() {
            lines.push(format!("- {}: {}", band, count));
        }
    }

    lines.join("\n")
}
