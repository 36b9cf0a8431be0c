use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use super::domain::{
    Dispute, EscrowStatus, Milestone, MilestoneAction, MilestoneChanges, MilestoneDraft,
    MilestoneId, MilestoneStatus, MilestoneStatusView,
};
use super::machine;
use super::repository::MilestoneRepository;
use crate::workflows::access::{self, Decision, MilestoneParty};
use crate::workflows::applications::{ApplicationRepository, ApplicationStatus};
use crate::workflows::coordinator::{
    EventDispatcher, EventKind, EventPublisher, EventSubject, WorkflowEvent,
};
use crate::workflows::directory::{
    Clock, Project, ProjectDirectory, ProjectId, SystemClock, UserId,
};
use crate::workflows::error::ensure_version;
use crate::workflows::{Actor, EngineError};

/// Service enforcing the escrow lifecycle of milestones.
pub struct MilestoneService<M, R, P, E> {
    milestones: Arc<M>,
    applications: Arc<R>,
    projects: Arc<P>,
    dispatcher: EventDispatcher<E>,
    clock: Arc<dyn Clock>,
}

static MILESTONE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_milestone_id() -> MilestoneId {
    let id = MILESTONE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    MilestoneId(format!("ms-{id:06}"))
}

impl<M, R, P, E> MilestoneService<M, R, P, E>
where
    M: MilestoneRepository + 'static,
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(milestones: Arc<M>, applications: Arc<R>, projects: Arc<P>, events: Arc<E>) -> Self {
        Self {
            milestones,
            applications,
            projects,
            dispatcher: EventDispatcher::new(events),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Propose a new milestone. Only the owning partner (or a super-admin) may create one.
    pub fn create(&self, actor: &Actor, draft: MilestoneDraft) -> Result<Milestone, EngineError> {
        let project = self.project(&draft.project_id)?;
        if !actor.owns(&project) {
            return Err(EngineError::Forbidden(format!(
                "{} {} does not own project {}",
                actor.role, actor.id.0, project.id.0
            )));
        }

        let today = self.clock.today();
        validate_title(&draft.title)?;
        validate_amount(draft.amount)?;
        validate_currency(&project, &draft.currency)?;
        validate_due_date(draft.due_date, today)?;

        let now = self.clock.now();
        let status = MilestoneStatus::Proposed;
        let milestone = Milestone {
            id: next_milestone_id(),
            project_id: project.id,
            title: draft.title.trim().to_string(),
            scope: draft.scope,
            acceptance_criteria: draft.acceptance_criteria,
            due_date: draft.due_date,
            amount: draft.amount,
            currency: draft.currency.to_ascii_uppercase(),
            escrow_status: status.escrow(),
            supervisor_gate: draft.supervisor_gate,
            status,
            disputes: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let stored = self.milestones.insert(milestone)?;
        info!(
            milestone_id = %stored.id.0,
            project_id = %stored.project_id.0,
            amount = stored.amount,
            currency = %stored.currency,
            "milestone proposed"
        );
        Ok(stored)
    }

    pub fn get(&self, id: &MilestoneId) -> Result<Milestone, EngineError> {
        self.load(id)
    }

    pub fn for_project(&self, project_id: &ProjectId) -> Result<Vec<Milestone>, EngineError> {
        let project = self.project(project_id)?;
        let mut milestones = self.milestones.for_project(&project.id)?;
        milestones.sort_by(|left, right| {
            left.due_date
                .cmp(&right.due_date)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(milestones)
    }

    /// Actions the matrix offers this actor on the milestone right now.
    pub fn allowed_actions(
        &self,
        actor: &Actor,
        id: &MilestoneId,
    ) -> Result<Vec<MilestoneAction>, EngineError> {
        let milestone = self.load(id)?;
        let project = self.project(&milestone.project_id)?;
        Ok(match self.party(actor, &project, &milestone)? {
            Some(party) => access::allowed_milestone_actions(party, milestone.status),
            None => Vec::new(),
        })
    }

    /// Status view annotated with the actions offered to `actor`.
    pub fn view_for(
        &self,
        actor: &Actor,
        id: &MilestoneId,
    ) -> Result<MilestoneStatusView, EngineError> {
        let milestone = self.load(id)?;
        let project = self.project(&milestone.project_id)?;
        let actions = match self.party(actor, &project, &milestone)? {
            Some(party) => access::allowed_milestone_actions(party, milestone.status),
            None => Vec::new(),
        };

        let mut view = milestone.status_view();
        view.allowed_actions = Some(actions.into_iter().map(MilestoneAction::label).collect());
        Ok(view)
    }

    /// Apply `changes` while the milestone is still in its early lifecycle.
    pub fn edit(
        &self,
        actor: &Actor,
        id: &MilestoneId,
        changes: MilestoneChanges,
        expected_version: Option<u64>,
    ) -> Result<Milestone, EngineError> {
        let milestone = self.load(id)?;
        ensure_version(milestone.version, expected_version)?;
        let project = self.project(&milestone.project_id)?;
        self.authorize(actor, &project, &milestone, MilestoneAction::Edit)?;

        let mut updated = milestone;
        if let Some(title) = changes.title {
            validate_title(&title)?;
            updated.title = title.trim().to_string();
        }
        if let Some(scope) = changes.scope {
            updated.scope = scope;
        }
        if let Some(criteria) = changes.acceptance_criteria {
            updated.acceptance_criteria = criteria;
        }
        if let Some(due_date) = changes.due_date {
            validate_due_date(due_date, self.clock.today())?;
            updated.due_date = due_date;
        }
        if let Some(amount) = changes.amount {
            validate_amount(amount)?;
            updated.amount = amount;
        }
        if let Some(currency) = changes.currency {
            validate_currency(&project, &currency)?;
            updated.currency = currency.to_ascii_uppercase();
        }
        if let Some(gate) = changes.supervisor_gate {
            updated.supervisor_gate = gate;
        }
        updated.updated_at = self.clock.now();

        let stored = self.milestones.update(updated)?;
        info!(
            milestone_id = %stored.id.0,
            version = stored.version,
            actor = %actor.id.0,
            "milestone edited"
        );
        Ok(stored)
    }

    /// Remove a milestone that has not started; returns the removed record.
    pub fn delete(
        &self,
        actor: &Actor,
        id: &MilestoneId,
        expected_version: Option<u64>,
    ) -> Result<Milestone, EngineError> {
        let milestone = self.load(id)?;
        ensure_version(milestone.version, expected_version)?;
        let project = self.project(&milestone.project_id)?;
        self.authorize(actor, &project, &milestone, MilestoneAction::Delete)?;

        self.milestones.remove(&milestone.id, milestone.version)?;
        info!(
            milestone_id = %milestone.id.0,
            status = milestone.status.label(),
            escrow = milestone.escrow_status.label(),
            refund_due = holds_funds(&milestone),
            actor = %actor.id.0,
            "milestone deleted"
        );
        Ok(milestone)
    }

    pub fn approve_and_release(
        &self,
        actor: &Actor,
        id: &MilestoneId,
        expected_version: Option<u64>,
    ) -> Result<Milestone, EngineError> {
        self.perform(actor, id, MilestoneAction::ApproveRelease, None, expected_version)
    }

    pub fn request_changes(
        &self,
        actor: &Actor,
        id: &MilestoneId,
        reason: Option<String>,
        expected_version: Option<u64>,
    ) -> Result<Milestone, EngineError> {
        self.perform(actor, id, MilestoneAction::RequestChanges, reason, expected_version)
    }

    pub fn disapprove(
        &self,
        actor: &Actor,
        id: &MilestoneId,
        expected_version: Option<u64>,
    ) -> Result<Milestone, EngineError> {
        self.perform(actor, id, MilestoneAction::Disapprove, None, expected_version)
    }

    pub fn mark_as_complete(
        &self,
        actor: &Actor,
        id: &MilestoneId,
        expected_version: Option<u64>,
    ) -> Result<Milestone, EngineError> {
        self.perform(actor, id, MilestoneAction::MarkComplete, None, expected_version)
    }

    pub fn unmark_as_complete(
        &self,
        actor: &Actor,
        id: &MilestoneId,
        expected_version: Option<u64>,
    ) -> Result<Milestone, EngineError> {
        self.perform(actor, id, MilestoneAction::UnmarkComplete, None, expected_version)
    }

    pub fn raise_dispute(
        &self,
        actor: &Actor,
        id: &MilestoneId,
        reason: String,
        expected_version: Option<u64>,
    ) -> Result<Milestone, EngineError> {
        self.perform(actor, id, MilestoneAction::Dispute, Some(reason), expected_version)
    }

    /// Run a lifecycle action: authorize, transition, commit, then notify.
    pub fn perform(
        &self,
        actor: &Actor,
        id: &MilestoneId,
        action: MilestoneAction,
        reason: Option<String>,
        expected_version: Option<u64>,
    ) -> Result<Milestone, EngineError> {
        if matches!(action, MilestoneAction::Edit | MilestoneAction::Delete) {
            return Err(EngineError::Validation(format!(
                "{} is not a lifecycle action",
                action.label()
            )));
        }

        let milestone = self.load(id)?;
        ensure_version(milestone.version, expected_version)?;
        let project = self.project(&milestone.project_id)?;
        let assigned = self.assigned_students(&project)?;
        self.authorize_with(actor, &project, &milestone, &assigned, action)?;

        let from = milestone.status;
        let next = machine::next_status(action, from, milestone.supervisor_gate).ok_or(
            EngineError::InvalidTransition {
                action: action.label(),
                state: from.label(),
            },
        )?;

        let now = self.clock.now();
        let mut updated = milestone;
        let reason = reason
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if action == MilestoneAction::Dispute {
            let reason = reason.clone().ok_or_else(|| {
                EngineError::Validation("a dispute needs a reason".to_string())
            })?;
            updated.disputes.push(Dispute {
                raised_by: actor.id.clone(),
                reason,
                raised_in: from,
                raised_at: now,
            });
        }
        updated.enter(next, now);

        let stored = self.milestones.update(updated)?;
        info!(
            milestone_id = %stored.id.0,
            action = action.label(),
            from = from.label(),
            to = stored.status.label(),
            escrow = stored.escrow_status.label(),
            actor = %actor.id.0,
            "milestone transitioned"
        );

        self.dispatcher
            .dispatch(lifecycle_events(&stored, action, reason, &project, &assigned));
        Ok(stored)
    }

    fn authorize(
        &self,
        actor: &Actor,
        project: &Project,
        milestone: &Milestone,
        action: MilestoneAction,
    ) -> Result<MilestoneParty, EngineError> {
        let assigned = self.assigned_students(project)?;
        self.authorize_with(actor, project, milestone, &assigned, action)
    }

    fn authorize_with(
        &self,
        actor: &Actor,
        project: &Project,
        milestone: &Milestone,
        assigned: &[UserId],
        action: MilestoneAction,
    ) -> Result<MilestoneParty, EngineError> {
        let party = access::milestone_party(actor, project, milestone.supervisor_gate, assigned)
            .ok_or_else(|| {
                EngineError::Forbidden(format!(
                    "{} {} has no standing on milestone {}",
                    actor.role, actor.id.0, milestone.id.0
                ))
            })?;

        match access::milestone_decision(party, milestone.status, action) {
            Decision::Allowed => Ok(party),
            Decision::WrongState
                if matches!(action, MilestoneAction::Edit | MilestoneAction::Delete) =>
            {
                Err(EngineError::NotEditable {
                    state: milestone.status.label(),
                })
            }
            Decision::WrongState => Err(EngineError::InvalidTransition {
                action: action.label(),
                state: milestone.status.label(),
            }),
            Decision::Denied => Err(EngineError::Forbidden(format!(
                "{} may not {} milestones",
                actor.role,
                action.label()
            ))),
        }
    }

    fn party(
        &self,
        actor: &Actor,
        project: &Project,
        milestone: &Milestone,
    ) -> Result<Option<MilestoneParty>, EngineError> {
        let assigned = self.assigned_students(project)?;
        Ok(access::milestone_party(
            actor,
            project,
            milestone.supervisor_gate,
            &assigned,
        ))
    }

    /// Students of the project's assigned application; empty while unstaffed.
    fn assigned_students(&self, project: &Project) -> Result<Vec<UserId>, EngineError> {
        Ok(self
            .applications
            .for_project(&project.id)?
            .into_iter()
            .find(|record| record.status == ApplicationStatus::Assigned)
            .map(|record| record.student_ids)
            .unwrap_or_default())
    }

    fn load(&self, id: &MilestoneId) -> Result<Milestone, EngineError> {
        self.milestones
            .fetch(id)?
            .ok_or_else(|| EngineError::not_found("milestone", &id.0))
    }

    fn project(&self, id: &ProjectId) -> Result<Project, EngineError> {
        self.projects
            .project(id)?
            .ok_or_else(|| EngineError::not_found("project", &id.0))
    }
}

fn lifecycle_events(
    milestone: &Milestone,
    action: MilestoneAction,
    reason: Option<String>,
    project: &Project,
    assigned: &[UserId],
) -> Vec<WorkflowEvent> {
    let (kind, recipients): (EventKind, Vec<UserId>) = match action {
        MilestoneAction::RequestChanges | MilestoneAction::SupervisorRequestChanges => {
            (EventKind::MilestoneChangesRequested, assigned.to_vec())
        }
        MilestoneAction::ApproveRelease => (EventKind::MilestoneReleased, assigned.to_vec()),
        MilestoneAction::Dispute => {
            let mut recipients = project.supervisor_ids.clone();
            recipients.extend(assigned.iter().cloned());
            (EventKind::MilestoneDisputed, recipients)
        }
        _ => return Vec::new(),
    };

    recipients
        .into_iter()
        .map(|recipient| {
            let event = WorkflowEvent::new(
                kind,
                recipient,
                EventSubject::Milestone(milestone.id.clone()),
            )
            .with_detail("project_id", milestone.project_id.0.clone())
            .with_detail("title", milestone.title.clone())
            .with_detail("status", milestone.status.label());
            let event = if kind == EventKind::MilestoneReleased {
                event.with_detail(
                    "amount",
                    format!("{} {}", milestone.amount, milestone.currency),
                )
            } else {
                event
            };
            match &reason {
                Some(text) => event.with_detail("reason", text.clone()),
                None => event,
            }
        })
        .collect()
}

fn validate_title(title: &str) -> Result<(), EngineError> {
    if title.trim().is_empty() {
        return Err(EngineError::Validation(
            "milestone title must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_amount(amount: i64) -> Result<(), EngineError> {
    if amount <= 0 {
        return Err(EngineError::Validation(format!(
            "milestone amount must be positive (found {amount})"
        )));
    }
    Ok(())
}

fn validate_currency(project: &Project, currency: &str) -> Result<(), EngineError> {
    if !currency.eq_ignore_ascii_case(&project.currency) {
        return Err(EngineError::Validation(format!(
            "milestone currency {currency} does not match project currency {}",
            project.currency
        )));
    }
    Ok(())
}

fn validate_due_date(due_date: NaiveDate, today: NaiveDate) -> Result<(), EngineError> {
    if due_date < today {
        return Err(EngineError::Validation(format!(
            "due date {due_date} is in the past"
        )));
    }
    Ok(())
}

fn holds_funds(milestone: &Milestone) -> bool {
    milestone.escrow_status == EscrowStatus::Held
}
