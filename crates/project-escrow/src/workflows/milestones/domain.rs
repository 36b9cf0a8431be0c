use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::directory::{ProjectId, UserId};

/// Identifier wrapper for milestones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MilestoneId(pub String);

/// Lifecycle of a milestone from proposal to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneStatus {
    Proposed,
    Draft,
    Accepted,
    Finalized,
    Funded,
    InProgress,
    Submitted,
    SupervisorReview,
    PartnerReview,
    ChangesRequested,
    Released,
    Completed,
}

impl MilestoneStatus {
    pub const ALL: &'static [MilestoneStatus] = &[
        MilestoneStatus::Proposed,
        MilestoneStatus::Draft,
        MilestoneStatus::Accepted,
        MilestoneStatus::Finalized,
        MilestoneStatus::Funded,
        MilestoneStatus::InProgress,
        MilestoneStatus::Submitted,
        MilestoneStatus::SupervisorReview,
        MilestoneStatus::PartnerReview,
        MilestoneStatus::ChangesRequested,
        MilestoneStatus::Released,
        MilestoneStatus::Completed,
    ];

    /// States before work begins, where the owner may still edit or delete.
    pub const EDITABLE: &'static [MilestoneStatus] = &[
        MilestoneStatus::Proposed,
        MilestoneStatus::Draft,
        MilestoneStatus::Accepted,
        MilestoneStatus::Finalized,
        MilestoneStatus::Funded,
    ];

    /// Review-window states in which the owner may raise a dispute.
    pub const DISPUTABLE: &'static [MilestoneStatus] = &[
        MilestoneStatus::Submitted,
        MilestoneStatus::SupervisorReview,
        MilestoneStatus::PartnerReview,
        MilestoneStatus::ChangesRequested,
        MilestoneStatus::Released,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            MilestoneStatus::Proposed => "PROPOSED",
            MilestoneStatus::Draft => "DRAFT",
            MilestoneStatus::Accepted => "ACCEPTED",
            MilestoneStatus::Finalized => "FINALIZED",
            MilestoneStatus::Funded => "FUNDED",
            MilestoneStatus::InProgress => "IN_PROGRESS",
            MilestoneStatus::Submitted => "SUBMITTED",
            MilestoneStatus::SupervisorReview => "SUPERVISOR_REVIEW",
            MilestoneStatus::PartnerReview => "PARTNER_REVIEW",
            MilestoneStatus::ChangesRequested => "CHANGES_REQUESTED",
            MilestoneStatus::Released => "RELEASED",
            MilestoneStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_editable(self) -> bool {
        Self::EDITABLE.contains(&self)
    }

    /// The only escrow status consistent with this milestone status.
    pub const fn escrow(self) -> EscrowStatus {
        match self {
            MilestoneStatus::Proposed
            | MilestoneStatus::Draft
            | MilestoneStatus::Accepted
            | MilestoneStatus::Finalized => EscrowStatus::Unfunded,
            MilestoneStatus::Funded
            | MilestoneStatus::InProgress
            | MilestoneStatus::Submitted
            | MilestoneStatus::SupervisorReview
            | MilestoneStatus::PartnerReview
            | MilestoneStatus::ChangesRequested => EscrowStatus::Held,
            MilestoneStatus::Released | MilestoneStatus::Completed => EscrowStatus::Released,
        }
    }
}

/// Where the milestone's money sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    Unfunded,
    Held,
    Released,
}

impl EscrowStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EscrowStatus::Unfunded => "UNFUNDED",
            EscrowStatus::Held => "HELD",
            EscrowStatus::Released => "RELEASED",
        }
    }
}

/// Every operation the permission matrix knows about for milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneAction {
    Edit,
    Delete,
    Draft,
    AcceptTerms,
    Finalize,
    Fund,
    Start,
    Submit,
    Resume,
    OpenReview,
    SupervisorApprove,
    SupervisorRequestChanges,
    ApproveRelease,
    RequestChanges,
    Disapprove,
    MarkComplete,
    UnmarkComplete,
    Dispute,
}

impl MilestoneAction {
    const ALL: [MilestoneAction; 18] = [
        MilestoneAction::Edit,
        MilestoneAction::Delete,
        MilestoneAction::Draft,
        MilestoneAction::AcceptTerms,
        MilestoneAction::Finalize,
        MilestoneAction::Fund,
        MilestoneAction::Start,
        MilestoneAction::Submit,
        MilestoneAction::Resume,
        MilestoneAction::OpenReview,
        MilestoneAction::SupervisorApprove,
        MilestoneAction::SupervisorRequestChanges,
        MilestoneAction::ApproveRelease,
        MilestoneAction::RequestChanges,
        MilestoneAction::Disapprove,
        MilestoneAction::MarkComplete,
        MilestoneAction::UnmarkComplete,
        MilestoneAction::Dispute,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            MilestoneAction::Edit => "edit",
            MilestoneAction::Delete => "delete",
            MilestoneAction::Draft => "draft",
            MilestoneAction::AcceptTerms => "accept-terms",
            MilestoneAction::Finalize => "finalize",
            MilestoneAction::Fund => "fund",
            MilestoneAction::Start => "start",
            MilestoneAction::Submit => "submit",
            MilestoneAction::Resume => "resume",
            MilestoneAction::OpenReview => "open-review",
            MilestoneAction::SupervisorApprove => "supervisor-approve",
            MilestoneAction::SupervisorRequestChanges => "supervisor-request-changes",
            MilestoneAction::ApproveRelease => "approve-release",
            MilestoneAction::RequestChanges => "request-changes",
            MilestoneAction::Disapprove => "disapprove",
            MilestoneAction::MarkComplete => "mark-complete",
            MilestoneAction::UnmarkComplete => "unmark-complete",
            MilestoneAction::Dispute => "dispute",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.label() == raw)
    }
}

/// Payload used by the owning partner to propose a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneDraft {
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub acceptance_criteria: String,
    pub due_date: NaiveDate,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub supervisor_gate: bool,
}

/// Partial update applied by `edit`; absent fields stay unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub supervisor_gate: Option<bool>,
}

/// Dispute raised by the owner during review; recorded without moving the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub raised_by: UserId,
    pub reason: String,
    pub raised_in: MilestoneStatus,
    pub raised_at: DateTime<Utc>,
}

/// Persisted milestone with its escrow position and concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub project_id: ProjectId,
    pub title: String,
    pub scope: String,
    pub acceptance_criteria: String,
    pub due_date: NaiveDate,
    pub amount: i64,
    pub currency: String,
    pub escrow_status: EscrowStatus,
    pub supervisor_gate: bool,
    pub status: MilestoneStatus,
    pub disputes: Vec<Dispute>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Milestone {
    /// Move to `status`, keeping the escrow position in lockstep.
    pub fn enter(&mut self, status: MilestoneStatus, now: DateTime<Utc>) {
        self.status = status;
        self.escrow_status = status.escrow();
        self.updated_at = now;
    }

    pub fn is_consistent(&self) -> bool {
        self.escrow_status == self.status.escrow()
    }

    pub fn status_view(&self) -> MilestoneStatusView {
        MilestoneStatusView {
            milestone_id: self.id.clone(),
            project_id: self.project_id.clone(),
            title: self.title.clone(),
            status: self.status.label(),
            escrow_status: self.escrow_status.label(),
            amount: self.amount,
            currency: self.currency.clone(),
            due_date: self.due_date,
            supervisor_gate: self.supervisor_gate,
            dispute_count: self.disputes.len(),
            version: self.version,
            allowed_actions: None,
        }
    }
}

/// Sanitized representation returned by every milestone endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneStatusView {
    pub milestone_id: MilestoneId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: &'static str,
    pub escrow_status: &'static str,
    pub amount: i64,
    pub currency: String,
    pub due_date: NaiveDate,
    pub supervisor_gate: bool,
    pub dispute_count: usize,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_actions: Option<Vec<&'static str>>,
}
