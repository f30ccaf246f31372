//! Markdown and JSON report generation.
//!
//! This module renders a batch of assessments as a Markdown portfolio
//! report or as a JSON document carrying the full result objects.

use crate::analysis::{
    abstention_rates, generate_summary_text, group_by_entity_type, top_risks, PortfolioSummary,
};
use crate::models::{DqiBand, RecommendedAction, RiskLevel};
use crate::pipeline::EntityAssessment;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata about an assessment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Input batch the report was produced from.
    pub input: String,
    pub generated_at: DateTime<Utc>,
    pub entities_assessed: usize,
    /// Entities whose worker failed.
    pub entities_failed: usize,
    /// Entities left out by the minimum-risk filter.
    pub entities_filtered: usize,
    pub duration_seconds: f64,
    pub version: String,
}

/// The complete portfolio report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: PortfolioSummary,
    /// Assessments sorted by entity id.
    pub assessments: Vec<EntityAssessment>,
}

impl Report {
    pub fn new(metadata: ReportMetadata, assessments: Vec<EntityAssessment>) -> Self {
        Self {
            summary: PortfolioSummary::from_assessments(&assessments),
            metadata,
            assessments,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# TrialRisk Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_summary_section(report));
    output.push_str(&generate_entities_section(&report.assessments));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Entities Assessed:** {}\n",
        metadata.entities_assessed
    ));
    if metadata.entities_failed > 0 {
        section.push_str(&format!(
            "- **Entities Failed:** {}\n",
            metadata.entities_failed
        ));
    }
    if metadata.entities_filtered > 0 {
        section.push_str(&format!(
            "- **Below Minimum Risk (omitted):** {}\n",
            metadata.entities_filtered
        ));
    }
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push_str(&format!("- **Version:** {}\n\n", metadata.version));

    section
}

fn anchor(entity_id: &str) -> String {
    entity_id.replace(['/', '.', ' ', '_'], "-").to_lowercase()
}

fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");
    toc.push_str("- [Entities](#entities)\n");
    for assessment in &report.assessments {
        toc.push_str(&format!(
            "  - [{}](#{})\n",
            assessment.entity_id,
            anchor(&assessment.entity_id)
        ));
    }
    toc.push('\n');

    toc
}

fn band_badge(band: DqiBand) -> &'static str {
    match band {
        DqiBand::Green => "🟢 GREEN",
        DqiBand::Amber => "🟡 AMBER",
        DqiBand::Orange => "🟠 ORANGE",
        DqiBand::Red => "🔴 RED",
    }
}

fn generate_summary_section(report: &Report) -> String {
    let summary = &report.summary;
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    section.push_str("### Consensus Risk Breakdown\n\n");
    section.push_str(&format!(
        "| {} Critical | {} High | {} Medium | {} Low | {} Unknown | **Total** |\n",
        RiskLevel::Critical.emoji(),
        RiskLevel::High.emoji(),
        RiskLevel::Medium.emoji(),
        RiskLevel::Low.emoji(),
        RiskLevel::Unknown.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} | **{}** |\n\n",
        summary.critical, summary.high, summary.medium, summary.low, summary.unknown, summary.total
    ));
    section.push_str(&format!(
        "**{}** of {} entities at HIGH risk or above.\n\n",
        summary.at_or_above(RiskLevel::High),
        summary.total
    ));

    let by_type = group_by_entity_type(&report.assessments);
    if !by_type.is_empty() {
        section.push_str("### By Entity Type\n\n");
        section.push_str("| Type | Entities | HIGH+ | Unknown | Avg DQI |\n");
        section.push_str("|:---|:---:|:---:|:---:|:---:|\n");
        for (entity_type, group) in &by_type {
            let elevated = group
                .iter()
                .filter(|a| a.consensus.risk_level >= RiskLevel::High)
                .count();
            let unknown = group
                .iter()
                .filter(|a| a.consensus.risk_level == RiskLevel::Unknown)
                .count();
            let avg_dqi =
                group.iter().map(|a| a.dqi.overall_score).sum::<f64>() / group.len() as f64;
            section.push_str(&format!(
                "| {} | {} | {} | {} | {:.1} |\n",
                entity_type,
                group.len(),
                elevated,
                unknown,
                avg_dqi
            ));
        }
        section.push('\n');
    }

    if !summary.by_band.is_empty() {
        section.push_str("### Data Quality Index\n\n");
        section.push_str(&format!(
            "Average DQI **{:.1}** across {} entities ({} partial).\n\n",
            summary.average_dqi, summary.total, summary.partial_dqi
        ));
        section.push_str("| Band | Entities |\n");
        section.push_str("|:---|:---:|\n");
        for (band, count) in summary.by_band.iter().rev() {
            section.push_str(&format!("| {} | {} |\n", band_badge(*band), count));
        }
        section.push('\n');
    }

    let top = top_risks(&report.assessments, 5);
    let top: Vec<_> = top
        .into_iter()
        .filter(|a| a.consensus.risk_level >= RiskLevel::Medium)
        .collect();
    if !top.is_empty() {
        section.push_str("### Highest-Risk Entities\n\n");
        section.push_str("| Entity | Risk | Score | DQI | Primary Action |\n");
        section.push_str("|:---|:---:|:---:|:---:|:---|\n");
        for assessment in top {
            let primary = assessment
                .decision
                .primary_action()
                .map(|a| a.action_type.to_string())
                .unwrap_or_default();
            section.push_str(&format!(
                "| {} | {} {} | {:.1} | {:.1} | {} |\n",
                assessment.entity_id,
                assessment.consensus.risk_level.emoji(),
                assessment.consensus.risk_level,
                assessment.consensus.risk_score,
                assessment.dqi.overall_score,
                primary
            ));
        }
        section.push('\n');
    }

    let rates: Vec<_> = abstention_rates(&report.assessments)
        .into_iter()
        .filter(|(_, rate)| *rate > 0.0)
        .collect();
    if !rates.is_empty() {
        section.push_str("### Agent Abstention\n\n");
        section.push_str("| Agent | Abstained |\n");
        section.push_str("|:---|:---:|\n");
        for (agent, rate) in rates {
            section.push_str(&format!("| {} | {:.0}% |\n", agent, rate * 100.0));
        }
        section.push('\n');
    }

    section
}

fn generate_entities_section(assessments: &[EntityAssessment]) -> String {
    let mut section = String::new();

    section.push_str("## Entities\n\n");

    if assessments.is_empty() {
        section.push_str("No entities matched the report filter.\n\n");
        return section;
    }

    for assessment in assessments {
        section.push_str(&generate_entity_block(assessment));
    }

    section
}

fn generate_entity_block(assessment: &EntityAssessment) -> String {
    let consensus = &assessment.consensus;
    let dqi = &assessment.dqi;
    let decision = &assessment.decision;
    let mut block = String::new();

    block.push_str(&format!(
        "### {} {{#{}}}\n\n",
        assessment.entity_id,
        anchor(&assessment.entity_id)
    ));
    block.push_str(&format!(
        "*{} | Risk: {} **{}** ({:.1}) | Confidence: {:.2} | DQI: {:.1} {} | Trend: {}*\n\n",
        assessment.entity_type,
        consensus.risk_level.emoji(),
        consensus.risk_level,
        consensus.risk_score,
        consensus.confidence,
        dqi.overall_score,
        band_badge(dqi.band),
        dqi.trend
    ));

    block.push_str(&format!("{}\n\n", decision.decision_rationale));

    if !decision.recommended_actions.is_empty() {
        block.push_str("| Priority | Action | Role | Due | Evidence |\n");
        block.push_str("|:---|:---|:---|:---:|:---|\n");
        for action in &decision.recommended_actions {
            block.push_str(&action_row(action));
        }
        block.push('\n');
    }

    if !decision.contributing_factors.is_empty() {
        block.push_str("**Contributing factors:**\n\n");
        for factor in &decision.contributing_factors {
            block.push_str(&format!("- {}\n", factor));
        }
        block.push('\n');
    }

    if !dqi.dimension_scores.is_empty() {
        let dims: Vec<String> = dqi
            .dimension_scores
            .iter()
            .map(|(name, score)| format!("{} {:.1}", name, score))
            .collect();
        block.push_str(&format!("**DQI dimensions:** {}", dims.join(", ")));
        if dqi.partial_calculation {
            block.push_str(&format!(
                " (partial, missing: {})",
                dqi.missing_dimensions.join(", ")
            ));
        }
        block.push_str("\n\n");
    }

    if !consensus.abstained_agents.is_empty() {
        block.push_str(&format!(
            "> Abstained: {}\n\n",
            consensus.abstained_agents.join(", ")
        ));
    }

    block.push_str("---\n\n");

    block
}

fn action_row(action: &RecommendedAction) -> String {
    let due = action
        .due_within_hours
        .map(|h| format!("{}h", h))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "| {} | {}: {} | {} | {} | {} |\n",
        action.priority,
        action.action_type,
        action.description.replace('|', "/"),
        action.target_role,
        due,
        action.evidence_summary.replace('|', "/")
    )
}

fn generate_footer() -> String {
    "---\n\n*Report generated by TrialRisk*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Plain-text summary printed to the terminal after a run.
pub fn console_summary(report: &Report) -> String {
    generate_summary_text(&report.summary)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{parse_batch, Pipeline};

    fn create_test_report() -> Report {
        let batch = parse_batch(
            r#"[
                {"entity_id": "SITE-2", "entity_type": "SITE",
                 "features": {"sae_pending_review": 6, "sae_overdue_days": 10,
                              "sdv_completion_pct": 45, "signature_completion_pct": 70}},
                {"entity_id": "SITE-1", "entity_type": "SITE",
                 "features": {"sae_pending_review": 0, "sae_overdue_days": 0}}
            ]"#,
        )
        .unwrap();
        let pipeline = Pipeline::default();
        let assessments: Vec<EntityAssessment> = batch.iter().map(|e| pipeline.assess(e)).collect();

        let metadata = ReportMetadata {
            input: "batch.json".to_string(),
            generated_at: Utc::now(),
            entities_assessed: 2,
            entities_failed: 1,
            entities_filtered: 0,
            duration_seconds: 0.25,
            version: "1.0.0".to_string(),
        };
        Report::new(metadata, assessments)
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# TrialRisk Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("## Entities"));
        assert!(markdown.contains("### SITE-2 {#site-2}"));
        assert!(markdown.contains("Highest-Risk Entities"));
        assert!(markdown.contains("Medical Monitor"));
        assert!(markdown.contains("Agent Abstention"));
        assert!(markdown.contains("**1** of 2 entities at HIGH risk or above."));
        assert!(markdown.contains("### By Entity Type"));
        assert!(markdown.contains("| SITE | 2 | 1 | 0 |"));
    }

    #[test]
    fn test_generate_metadata_section() {
        let section = generate_metadata_section(&create_test_report().metadata);
        assert!(section.contains("`batch.json`"));
        assert!(section.contains("Entities Failed:"));
        assert!(!section.contains("omitted"));
    }

    #[test]
    fn test_action_row_formats_missing_sla() {
        let report = create_test_report();
        let follow_up = report.assessments[0]
            .decision
            .recommended_actions
            .iter()
            .find(|a| a.due_within_hours.is_none())
            .unwrap();
        let row = action_row(follow_up);
        assert!(row.starts_with("| INFORMATIONAL |"));
        assert!(row.contains("| - |"));
    }

    #[test]
    fn test_empty_report() {
        let metadata = create_test_report().metadata;
        let markdown = generate_markdown_report(&Report::new(metadata, Vec::new()));
        assert!(markdown.contains("No entities matched"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"assessments\""));
        assert!(json.contains("\"risk_level\": \"CRITICAL\""));
        assert!(json.contains("\"band\""));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        write_report("# TrialRisk Report\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# TrialRisk Report\n");
    }
}
