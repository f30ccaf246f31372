//! Data models for the assessment core.
//!
//! These are the value objects exchanged between agents, the consensus,
//! DQI and decision engines, and the collaborators that consume them.
//! Field names and value ranges are the wire contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordinal risk level.
///
/// `Unknown` sorts below every judged level so that taking the maximum over
/// a set of levels yields the worst judged one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// No judgement could be made.
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

/// The consensus verdict uses the same ordinal scale as agent signals.
pub type ConsensusRiskLevel = RiskLevel;

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Unknown => write!(f, "UNKNOWN"),
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl RiskLevel {
    /// Judged levels in ascending order.
    pub const ORDINAL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Position on the `LOW < MEDIUM < HIGH < CRITICAL` scale.
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            RiskLevel::Unknown => None,
            RiskLevel::Low => Some(0),
            RiskLevel::Medium => Some(1),
            RiskLevel::High => Some(2),
            RiskLevel::Critical => Some(3),
        }
    }

    /// Numeric anchor used for weighted voting.
    pub fn anchor(&self) -> f64 {
        match self {
            RiskLevel::Critical => 100.0,
            RiskLevel::High => 75.0,
            RiskLevel::Medium => 50.0,
            RiskLevel::Low => 25.0,
            RiskLevel::Unknown => 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != RiskLevel::Unknown
    }

    /// Exact match or one ordinal step apart. `Unknown` agrees with nothing.
    pub fn agrees_with(&self, other: RiskLevel) -> bool {
        match (self.ordinal(), other.ordinal()) {
            (Some(a), Some(b)) => a.abs_diff(b) <= 1,
            _ => false,
        }
    }

    /// Returns an emoji representation of the level.
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Unknown => "⚪",
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🟠",
            RiskLevel::Critical => "🔴",
        }
    }
}

/// Kind of signal agent.
///
/// The eight built-in kinds are named variants; third-party agents use
/// `Other`. Serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentType {
    Safety,
    DataCompleteness,
    QueryBurden,
    Coding,
    Compliance,
    Verification,
    Timeline,
    Stability,
    Other(String),
}

impl AgentType {
    /// All built-in agent kinds in registry order.
    pub const BUILT_IN: [AgentType; 8] = [
        AgentType::Safety,
        AgentType::DataCompleteness,
        AgentType::QueryBurden,
        AgentType::Coding,
        AgentType::Compliance,
        AgentType::Verification,
        AgentType::Timeline,
        AgentType::Stability,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            AgentType::Safety => "safety",
            AgentType::DataCompleteness => "data_completeness",
            AgentType::QueryBurden => "query_burden",
            AgentType::Coding => "coding",
            AgentType::Compliance => "compliance",
            AgentType::Verification => "verification",
            AgentType::Timeline => "timeline",
            AgentType::Stability => "stability",
            AgentType::Other(name) => name,
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for AgentType {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "safety" => AgentType::Safety,
            "data_completeness" | "completeness" => AgentType::DataCompleteness,
            "query_burden" | "query" => AgentType::QueryBurden,
            "coding" => AgentType::Coding,
            "compliance" | "protocol_deviation" => AgentType::Compliance,
            "verification" | "sdv" => AgentType::Verification,
            "timeline" => AgentType::Timeline,
            "stability" => AgentType::Stability,
            _ => AgentType::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for AgentType {
    fn from(s: String) -> Self {
        AgentType::from(s.as_str())
    }
}

impl From<AgentType> for String {
    fn from(agent_type: AgentType) -> Self {
        agent_type.as_str().to_string()
    }
}

/// One concrete, data-backed observation supporting an agent's judgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Feature the observation is about.
    pub feature_name: String,
    /// Observed value.
    pub feature_value: f64,
    /// Acceptable limit that was breached.
    pub threshold: f64,
    /// Distance from the limit, normalized to [0, 1].
    pub severity: f64,
    /// Human-readable statement of the observation.
    pub description: String,
}

/// The output of one agent for one entity.
///
/// Construct with [`AgentSignal::judged`] or [`AgentSignal::abstain`]; an
/// abstained signal always carries `UNKNOWN` and zero confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSignal {
    pub agent_type: AgentType,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub evidence: Vec<EvidenceItem>,
    pub recommended_actions: Vec<String>,
    pub abstained: bool,
    pub abstention_reason: Option<String>,
    pub features_analyzed: usize,
}

impl AgentSignal {
    /// A signal carrying a risk judgement.
    ///
    /// An `Unknown` level is not a judgement and is turned into an abstention.
    pub fn judged(
        agent_type: AgentType,
        risk_level: RiskLevel,
        confidence: f64,
        evidence: Vec<EvidenceItem>,
        recommended_actions: Vec<String>,
        features_analyzed: usize,
    ) -> Self {
        if !risk_level.is_known() {
            return Self::abstain(
                agent_type,
                "no risk level could be determined".to_string(),
                features_analyzed,
            );
        }

        Self {
            agent_type,
            risk_level,
            confidence: clamp_unit(confidence),
            evidence,
            recommended_actions,
            abstained: false,
            abstention_reason: None,
            features_analyzed,
        }
    }

    /// A refusal to judge, with the reason.
    pub fn abstain(agent_type: AgentType, reason: String, features_analyzed: usize) -> Self {
        Self {
            agent_type,
            risk_level: RiskLevel::Unknown,
            confidence: 0.0,
            evidence: Vec::new(),
            recommended_actions: Vec::new(),
            abstained: true,
            abstention_reason: Some(reason),
            features_analyzed,
        }
    }

    /// True if this signal takes part in consensus weighting.
    pub fn is_contributing(&self) -> bool {
        !self.abstained && self.risk_level.is_known()
    }

    /// The evidence item with the highest severity, if any.
    pub fn strongest_evidence(&self) -> Option<&EvidenceItem> {
        self.evidence.iter().fold(None, |best, item| match best {
            Some(b) if b.severity >= item.severity => Some(b),
            _ => Some(item),
        })
    }
}

/// The combined verdict for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub entity_id: String,
    pub risk_level: ConsensusRiskLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub contributing_agents: Vec<String>,
    pub abstained_agents: Vec<String>,
    pub agent_signals: Vec<AgentSignal>,
    /// Per-agent weighted score, sorted by agent name.
    pub weighted_scores: BTreeMap<String, f64>,
    pub agreement_ratio: f64,
    pub timestamp: DateTime<Utc>,
    /// Agents whose weight fell back to the default.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted_weights: Vec<String>,
    /// Raw weighted mean when clamping to [0, 100] changed it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unclamped_risk_score: Option<f64>,
}

/// Data Quality Index band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DqiBand {
    Red,
    Orange,
    Amber,
    Green,
}

impl fmt::Display for DqiBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DqiBand::Green => write!(f, "GREEN"),
            DqiBand::Amber => write!(f, "AMBER"),
            DqiBand::Orange => write!(f, "ORANGE"),
            DqiBand::Red => write!(f, "RED"),
        }
    }
}

/// Direction of the DQI relative to the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    Unknown,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "IMPROVING"),
            Trend::Stable => write!(f, "STABLE"),
            Trend::Declining => write!(f, "DECLINING"),
            Trend::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Data Quality Index for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqiResult {
    pub entity_id: String,
    pub overall_score: f64,
    /// Clamped dimension scores that entered the aggregation.
    pub dimension_scores: BTreeMap<String, f64>,
    pub band: DqiBand,
    pub partial_calculation: bool,
    pub trend: Trend,
    pub timestamp: DateTime<Utc>,
    /// Configured dimensions with no usable data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_dimensions: Vec<String>,
    /// Pre-clamp values of out-of-range inputs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub clamped_inputs: BTreeMap<String, f64>,
}

/// Urgency of a recommended action. Sorts most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionPriority {
    Immediate,
    High,
    Medium,
    Low,
    Informational,
}

impl fmt::Display for ActionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionPriority::Immediate => write!(f, "IMMEDIATE"),
            ActionPriority::High => write!(f, "HIGH"),
            ActionPriority::Medium => write!(f, "MEDIUM"),
            ActionPriority::Low => write!(f, "LOW"),
            ActionPriority::Informational => write!(f, "INFORMATIONAL"),
        }
    }
}

/// What the recipient of an action is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Escalate,
    UrgentHumanReview,
    Investigate,
    HumanReview,
    Monitor,
    ReviewDataAvailability,
    SafetyEscalation,
    DataRemediation,
    QueryResolution,
    CodingReview,
    ComplianceReview,
    SourceVerification,
    TimelineRecovery,
    EnrollmentReview,
    AgentFollowUp,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionType::Escalate => "Escalate",
            ActionType::UrgentHumanReview => "Urgent human review",
            ActionType::Investigate => "Investigate",
            ActionType::HumanReview => "Human review",
            ActionType::Monitor => "Monitor",
            ActionType::ReviewDataAvailability => "Review data availability",
            ActionType::SafetyEscalation => "Safety escalation",
            ActionType::DataRemediation => "Data remediation",
            ActionType::QueryResolution => "Query resolution",
            ActionType::CodingReview => "Coding review",
            ActionType::ComplianceReview => "Compliance review",
            ActionType::SourceVerification => "Source verification",
            ActionType::TimelineRecovery => "Timeline recovery",
            ActionType::EnrollmentReview => "Enrollment review",
            ActionType::AgentFollowUp => "Agent follow-up",
        };
        f.write_str(label)
    }
}

/// Role an action is routed to, in ascending seniority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetRole {
    Cra,
    MedicalCoder,
    DataManager,
    SiteManager,
    StudyLead,
    SafetyPhysician,
    MedicalMonitor,
}

impl TargetRole {
    /// The most senior role actions can be routed to.
    pub const MOST_SENIOR: TargetRole = TargetRole::MedicalMonitor;
}

impl fmt::Display for TargetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TargetRole::Cra => "CRA",
            TargetRole::MedicalCoder => "Medical Coder",
            TargetRole::DataManager => "Data Manager",
            TargetRole::SiteManager => "Site Manager",
            TargetRole::StudyLead => "Study Lead",
            TargetRole::SafetyPhysician => "Safety Physician",
            TargetRole::MedicalMonitor => "Medical Monitor",
        };
        f.write_str(label)
    }
}

/// One prioritized, role-targeted step of an action plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub action_type: ActionType,
    pub priority: ActionPriority,
    pub description: String,
    pub target_role: TargetRole,
    pub due_within_hours: Option<u32>,
    pub evidence_summary: String,
}

/// Kind of entity being assessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    #[default]
    Study,
    Site,
    Subject,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Study => write!(f, "STUDY"),
            EntityType::Site => write!(f, "SITE"),
            EntityType::Subject => write!(f, "SUBJECT"),
        }
    }
}

/// The action plan derived from one consensus verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub recommended_actions: Vec<RecommendedAction>,
    pub decision_rationale: String,
    pub contributing_factors: Vec<String>,
}

impl RiskDecision {
    /// The most urgent action, if any.
    pub fn primary_action(&self) -> Option<&RecommendedAction> {
        self.recommended_actions.first()
    }
}

/// Clamps to [0, 1]; NaN becomes 0.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Clamps to [0, 100]; NaN becomes 0.
pub(crate) fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
