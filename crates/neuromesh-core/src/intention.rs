//! Intentions: proposed, approval-gated units of work.

use crate::message::{MessagePriority, NeuronId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle status of an intention.
///
/// Legal transitions:
/// `Pending -> {Approved, Rejected, Expired, Cancelled}`,
/// `Approved -> Executing`, `Executing -> {Completed, Failed}`.
/// Everything else is rejected by the governance layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentionStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
    Executing,
    Completed,
    Failed,
}

impl IntentionStatus {
    /// Whether `next` is reachable from `self` in one step.
    pub fn can_advance_to(self, next: IntentionStatus) -> bool {
        use IntentionStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Expired)
                | (Pending, Cancelled)
                | (Approved, Executing)
                | (Approved, Expired)
                | (Executing, Completed)
                | (Executing, Failed)
        )
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        use IntentionStatus::*;
        matches!(self, Rejected | Expired | Cancelled | Completed | Failed)
    }
}

impl std::fmt::Display for IntentionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Expired => write!(f, "expired"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Executing => write!(f, "executing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Category of work an intention proposes.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentionCategory {
    SelfReflection,
    CodeModification,
    GoalPursuit,
    Communication,
    Exploration,
    MemoryManagement,
    Learning,
    SafetyCheck,
    NeuronCommunication,
    General,
}

impl std::fmt::Display for IntentionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfReflection => write!(f, "self_reflection"),
            Self::CodeModification => write!(f, "code_modification"),
            Self::GoalPursuit => write!(f, "goal_pursuit"),
            Self::Communication => write!(f, "communication"),
            Self::Exploration => write!(f, "exploration"),
            Self::MemoryManagement => write!(f, "memory_management"),
            Self::Learning => write!(f, "learning"),
            Self::SafetyCheck => write!(f, "safety_check"),
            Self::NeuronCommunication => write!(f, "neuron_communication"),
            Self::General => write!(f, "general"),
        }
    }
}

/// Structured action attached to an intention. Dispatch is an exhaustive
/// match on this union; intentions without an action dispatch by category.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntentionAction {
    Tool {
        name: String,
        args: Value,
    },
    Message {
        topic: String,
        payload: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<NeuronId>,
    },
    CodeChange {
        path: String,
        description: String,
    },
    Goal {
        goal: String,
    },
    TaskExecution {
        task: String,
    },
    Other {
        detail: Value,
    },
}

/// A proposed, possibly approval-gated unit of work.
///
/// Created by the governance layer from an [`IntentionDraft`]; mutated only
/// through governance operations; never physically deleted, only
/// status-terminated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Intention {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub category: IntentionCategory,
    pub priority: MessagePriority,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub source: NeuronId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<IntentionAction>,
    pub requires_approval: bool,
    pub status: IntentionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<String>,
}

impl Intention {
    /// Whether the intention has expired at `now` without being acted on.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            IntentionStatus::Pending | IntentionStatus::Approved
        ) && self.expires_at.is_some_and(|at| at <= now)
    }

    /// Short id prefix for operator-facing listings.
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}

/// Everything a proposer supplies; the board stamps id, timestamp and status.
#[derive(Clone, Debug)]
pub struct IntentionDraft {
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub category: IntentionCategory,
    pub priority: MessagePriority,
    pub source: NeuronId,
    pub target: Option<String>,
    pub action: Option<IntentionAction>,
    pub requires_approval: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl IntentionDraft {
    pub fn new(
        title: impl Into<String>,
        category: IntentionCategory,
        source: impl Into<NeuronId>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            rationale: String::new(),
            category,
            priority: MessagePriority::Normal,
            source: source.into(),
            target: None,
            action: None,
            requires_approval: true,
            expires_at: None,
        }
    }

    pub fn description(mut self, s: impl Into<String>) -> Self {
        self.description = s.into();
        self
    }

    pub fn rationale(mut self, s: impl Into<String>) -> Self {
        self.rationale = s.into();
        self
    }

    pub fn priority(mut self, p: MessagePriority) -> Self {
        self.priority = p;
        self
    }

    pub fn target(mut self, t: impl Into<String>) -> Self {
        self.target = Some(t.into());
        self
    }

    pub fn action(mut self, a: IntentionAction) -> Self {
        self.action = Some(a);
        self
    }

    pub fn requires_approval(mut self, required: bool) -> Self {
        self.requires_approval = required;
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Materialize the draft as a fresh Pending intention.
    pub fn build(self) -> Intention {
        Intention {
            id: Uuid::new_v4(),
            title: self.title,
            description: self.description,
            rationale: self.rationale,
            category: self.category,
            priority: self.priority,
            created_at: Utc::now(),
            expires_at: self.expires_at,
            source: self.source,
            target: self.target,
            action: self.action,
            requires_approval: self.requires_approval,
            status: IntentionStatus::Pending,
            user_comment: None,
            acted_at: None,
            execution_result: None,
        }
    }
}
