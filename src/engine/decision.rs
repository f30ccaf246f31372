//! Confidence-gated action planning.
//!
//! A fixed table maps `(risk level, confidence bucket)` to a base action.
//! Every HIGH or CRITICAL agent signal then adds an action routed to the
//! role that owns that risk area.

use crate::models::{
    ActionPriority, ActionType, AgentSignal, AgentType, ConsensusResult, EntityType,
    RecommendedAction, RiskDecision, RiskLevel, TargetRole,
};
use std::fmt;
use tracing::debug;

pub const HIGH_CONFIDENCE: f64 = 0.7;
pub const MODERATE_CONFIDENCE: f64 = 0.4;

/// Coarse confidence band used by the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBucket {
    High,
    Moderate,
    Low,
}

impl ConfidenceBucket {
    pub fn of(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            ConfidenceBucket::High
        } else if confidence >= MODERATE_CONFIDENCE {
            ConfidenceBucket::Moderate
        } else {
            ConfidenceBucket::Low
        }
    }
}

impl fmt::Display for ConfidenceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceBucket::High => write!(f, "high"),
            ConfidenceBucket::Moderate => write!(f, "moderate"),
            ConfidenceBucket::Low => write!(f, "low"),
        }
    }
}

/// Routing for agent-specific follow-up actions.
struct Routing {
    action_type: ActionType,
    role: TargetRole,
    critical_sla: u32,
    high_sla: u32,
}

fn routing(agent_type: &AgentType) -> Routing {
    let (action_type, role, critical_sla, high_sla) = match agent_type {
        AgentType::Safety => (ActionType::SafetyEscalation, TargetRole::SafetyPhysician, 4, 24),
        AgentType::DataCompleteness => (ActionType::DataRemediation, TargetRole::DataManager, 24, 72),
        AgentType::QueryBurden => (ActionType::QueryResolution, TargetRole::DataManager, 48, 72),
        AgentType::Coding => (ActionType::CodingReview, TargetRole::MedicalCoder, 48, 120),
        AgentType::Compliance => (ActionType::ComplianceReview, TargetRole::StudyLead, 24, 72),
        AgentType::Verification => (ActionType::SourceVerification, TargetRole::Cra, 48, 120),
        AgentType::Timeline => (ActionType::TimelineRecovery, TargetRole::StudyLead, 48, 120),
        AgentType::Stability => (ActionType::EnrollmentReview, TargetRole::SiteManager, 72, 168),
        AgentType::Other(_) => (ActionType::Investigate, TargetRole::DataManager, 24, 72),
    };
    Routing {
        action_type,
        role,
        critical_sla,
        high_sla,
    }
}

/// Turns consensus verdicts into action plans.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Plans actions for a study-level verdict.
    pub fn decide(&self, consensus: &ConsensusResult) -> RiskDecision {
        self.decide_for(consensus, EntityType::default())
    }

    pub fn decide_for(&self, consensus: &ConsensusResult, entity_type: EntityType) -> RiskDecision {
        let bucket = ConfidenceBucket::of(consensus.confidence);

        let mut actions = vec![base_action(consensus, bucket)];
        actions.extend(
            consensus
                .agent_signals
                .iter()
                .filter(|s| s.is_contributing() && s.risk_level >= RiskLevel::High)
                .map(agent_action),
        );
        if !consensus.abstained_agents.is_empty() {
            actions.push(follow_up_action(consensus));
        }

        actions.sort_by_key(|a| (a.priority, a.due_within_hours.unwrap_or(u32::MAX)));

        debug!(
            "Decision for {}: {} action(s), primary {}",
            consensus.entity_id,
            actions.len(),
            actions[0].action_type
        );

        RiskDecision {
            entity_id: consensus.entity_id.clone(),
            entity_type,
            risk_level: consensus.risk_level,
            risk_score: consensus.risk_score,
            confidence: consensus.confidence,
            recommended_actions: actions,
            decision_rationale: rationale(consensus, bucket),
            contributing_factors: contributing_factors(consensus),
        }
    }
}

fn base_action(consensus: &ConsensusResult, bucket: ConfidenceBucket) -> RecommendedAction {
    use ActionType::*;
    let high = bucket == ConfidenceBucket::High;

    let (action_type, priority, hours, role, description) = match consensus.risk_level {
        RiskLevel::Critical if high => (
            Escalate,
            ActionPriority::Immediate,
            4,
            TargetRole::StudyLead,
            "Escalate to study leadership for immediate intervention",
        ),
        RiskLevel::Critical => (
            UrgentHumanReview,
            ActionPriority::Immediate,
            4,
            TargetRole::StudyLead,
            "Critical risk with limited confidence: review the underlying data urgently",
        ),
        RiskLevel::High if high => (
            Investigate,
            ActionPriority::High,
            24,
            TargetRole::DataManager,
            "Investigate the drivers of high risk and agree a mitigation plan",
        ),
        RiskLevel::High => (
            HumanReview,
            ActionPriority::High,
            24,
            TargetRole::DataManager,
            "High risk with limited confidence: confirm the signals by human review",
        ),
        RiskLevel::Medium if high => (
            Investigate,
            ActionPriority::Medium,
            72,
            TargetRole::DataManager,
            "Investigate emerging risk before it escalates",
        ),
        RiskLevel::Medium => (
            Monitor,
            ActionPriority::Medium,
            72,
            TargetRole::Cra,
            "Monitor closely and re-assess at the next data snapshot",
        ),
        RiskLevel::Low => (
            Monitor,
            ActionPriority::Low,
            168,
            TargetRole::Cra,
            "Continue routine monitoring",
        ),
        RiskLevel::Unknown => (
            ReviewDataAvailability,
            ActionPriority::Medium,
            72,
            TargetRole::DataManager,
            "No agent could assess risk: review data availability",
        ),
    };

    RecommendedAction {
        action_type,
        priority,
        description: description.to_string(),
        target_role: role,
        due_within_hours: Some(hours),
        evidence_summary: format!(
            "Consensus {} (score {:.1}, {} confidence {:.2}) from {} agent(s)",
            consensus.risk_level,
            consensus.risk_score,
            bucket,
            consensus.confidence,
            consensus.contributing_agents.len()
        ),
    }
}

fn agent_action(signal: &AgentSignal) -> RecommendedAction {
    let route = routing(&signal.agent_type);
    let critical = signal.risk_level == RiskLevel::Critical;

    let (priority, role, hours) = match (&signal.agent_type, critical) {
        (AgentType::Safety, true) => (ActionPriority::Immediate, TargetRole::MOST_SENIOR, 4),
        (AgentType::Safety, false) => (ActionPriority::High, route.role, route.high_sla),
        (_, true) => (ActionPriority::High, route.role, route.critical_sla),
        (_, false) => (ActionPriority::Medium, route.role, route.high_sla),
    };

    let description = signal
        .recommended_actions
        .first()
        .cloned()
        .unwrap_or_else(|| format!("{} for {} signal", route.action_type, signal.risk_level));

    let evidence_summary = match signal.strongest_evidence() {
        Some(item) => format!("{}: {}", signal.agent_type, item.description),
        None => format!(
            "{}: {} signal (confidence {:.2})",
            signal.agent_type, signal.risk_level, signal.confidence
        ),
    };

    RecommendedAction {
        action_type: route.action_type,
        priority,
        description,
        target_role: role,
        due_within_hours: Some(hours),
        evidence_summary,
    }
}

fn follow_up_action(consensus: &ConsensusResult) -> RecommendedAction {
    let total = consensus.abstained_agents.len() + consensus.contributing_agents.len();
    RecommendedAction {
        action_type: ActionType::AgentFollowUp,
        priority: ActionPriority::Informational,
        description: format!(
            "Restore missing inputs for abstained agents: {}",
            consensus.abstained_agents.join(", ")
        ),
        target_role: TargetRole::DataManager,
        due_within_hours: None,
        evidence_summary: format!(
            "{} of {} agent(s) abstained",
            consensus.abstained_agents.len(),
            total
        ),
    }
}

fn rationale(consensus: &ConsensusResult, bucket: ConfidenceBucket) -> String {
    let contributing = consensus.contributing_agents.len();
    let abstained = consensus.abstained_agents.len();

    if consensus.risk_level == RiskLevel::Unknown {
        return format!(
            "Risk could not be assessed: no agent contributed and {} abstained for lack of data.",
            abstained
        );
    }

    format!(
        "Consensus risk {} (score {:.1}) with {} confidence ({:.2}). \
         {} agent(s) contributed and {} abstained; agreement ratio {:.2}.",
        consensus.risk_level,
        consensus.risk_score,
        bucket,
        consensus.confidence,
        contributing,
        abstained,
        consensus.agreement_ratio
    )
}

fn contributing_factors(consensus: &ConsensusResult) -> Vec<String> {
    let mut signals: Vec<&AgentSignal> = consensus
        .agent_signals
        .iter()
        .filter(|s| s.is_contributing() && s.risk_level >= RiskLevel::Medium)
        .collect();
    signals.sort_by(|a, b| {
        b.risk_level
            .cmp(&a.risk_level)
            .then_with(|| a.agent_type.as_str().cmp(b.agent_type.as_str()))
    });

    signals
        .into_iter()
        .map(|s| match s.strongest_evidence() {
            Some(item) => format!("{}: {} ({})", s.agent_type, s.risk_level, item.description),
            None => format!("{}: {}", s.agent_type, s.risk_level),
        })
        .collect()
}
