use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scoring::{Score, ScoreSignals};
use crate::workflows::directory::{ProjectId, UserId};

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Whether a single student or a team applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicantType {
    Individual,
    Group,
}

/// Reference to a file held by the external file collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub name: String,
    pub storage_key: String,
}

/// Payload a student (or group) sends to apply for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub project_id: ProjectId,
    pub applicant_type: ApplicantType,
    pub student_ids: Vec<UserId>,
    #[serde(default)]
    pub statement: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    pub signals: ScoreSignals,
}

/// Lifecycle of an application within a project's screening pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Submitted,
    Shortlisted,
    Waitlist,
    Assigned,
    Rejected,
    Withdrawn,
    Terminated,
}

impl ApplicationStatus {
    pub const ALL: &'static [ApplicationStatus] = &[
        ApplicationStatus::Submitted,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::Waitlist,
        ApplicationStatus::Assigned,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
        ApplicationStatus::Terminated,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::Shortlisted => "SHORTLISTED",
            ApplicationStatus::Waitlist => "WAITLIST",
            ApplicationStatus::Assigned => "ASSIGNED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
            ApplicationStatus::Terminated => "TERMINATED",
        }
    }

    /// Still competing for the project: not yet assigned and not closed.
    pub const fn is_candidate(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted
                | ApplicationStatus::Shortlisted
                | ApplicationStatus::Waitlist
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected
                | ApplicationStatus::Withdrawn
                | ApplicationStatus::Terminated
        )
    }
}

/// Every operation the permission matrix knows about for applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationAction {
    Shortlist,
    Waitlist,
    Reset,
    Accept,
    Reject,
    Reopen,
    Reassign,
    Withdraw,
    Terminate,
    Recommend,
    Score,
}

impl ApplicationAction {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationAction::Shortlist => "shortlist",
            ApplicationAction::Waitlist => "waitlist",
            ApplicationAction::Reset => "reset",
            ApplicationAction::Accept => "accept",
            ApplicationAction::Reject => "reject",
            ApplicationAction::Reopen => "reopen",
            ApplicationAction::Reassign => "reassign",
            ApplicationAction::Withdraw => "withdraw",
            ApplicationAction::Terminate => "terminate",
            ApplicationAction::Recommend => "recommend",
            ApplicationAction::Score => "score",
        }
    }

    /// Side-channel actions leave the status untouched.
    pub const fn changes_status(self) -> bool {
        !matches!(self, ApplicationAction::Recommend | ApplicationAction::Score)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        [
            ApplicationAction::Shortlist,
            ApplicationAction::Waitlist,
            ApplicationAction::Reset,
            ApplicationAction::Accept,
            ApplicationAction::Reject,
            ApplicationAction::Reopen,
            ApplicationAction::Reassign,
            ApplicationAction::Withdraw,
            ApplicationAction::Terminate,
            ApplicationAction::Recommend,
            ApplicationAction::Score,
        ]
        .into_iter()
        .find(|action| action.label() == raw)
    }
}

/// Persisted application together with its score and concurrency version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub project_id: ProjectId,
    pub applicant_type: ApplicantType,
    pub student_ids: Vec<UserId>,
    pub score: Score,
    pub status: ApplicationStatus,
    pub statement: String,
    pub attachments: Vec<AttachmentRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl ApplicationRecord {
    pub fn is_member(&self, user: &UserId) -> bool {
        self.student_ids.iter().any(|id| id == user)
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.id.clone(),
            project_id: self.project_id.clone(),
            status: self.status.label(),
            final_score: self.score.final_score,
            offer_expires_at: self.offer_expires_at,
            version: self.version,
        }
    }
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub project_id: ProjectId,
    pub status: &'static str,
    pub final_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub version: u64,
}

/// Result of swapping a project's assignment from one application to another.
#[derive(Debug, Clone, PartialEq)]
pub struct Reassignment {
    pub assigned: ApplicationRecord,
    pub displaced: Option<ApplicationRecord>,
}
