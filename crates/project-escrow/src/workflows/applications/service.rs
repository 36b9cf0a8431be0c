use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::domain::{
    ApplicantType, ApplicationAction, ApplicationId, ApplicationRecord, ApplicationStatus,
    ApplicationSubmission, Reassignment,
};
use super::machine::{self, DISPLACED_STATUS};
use super::ranking;
use super::repository::ApplicationRepository;
use super::scoring::{ManualScorer, ScoreComponent, ScoringEngine, ScoringError};
use crate::config::{EngineConfig, RejectionPolicy};
use crate::workflows::access::{self, ApplicationParty, Decision};
use crate::workflows::coordinator::{
    EventDispatcher, EventKind, EventPublisher, EventSubject, WorkflowEvent,
};
use crate::workflows::directory::{
    Clock, Project, ProjectDirectory, ProjectId, SystemClock, UserId,
};
use crate::workflows::error::ensure_version;
use crate::workflows::{Actor, EngineError, Role};

/// Operation requested through the generic action endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationCommand {
    Transition(ApplicationAction),
    Recommend { partner_ids: Vec<UserId> },
    Score { value: f32 },
}

/// Service composing the permission matrix, state machine, repository, and scoring model.
pub struct ApplicationService<R, P, E> {
    repository: Arc<R>,
    projects: Arc<P>,
    dispatcher: EventDispatcher<E>,
    scoring: Arc<ScoringEngine>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

impl<R, P, E> ApplicationService<R, P, E>
where
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(repository: Arc<R>, projects: Arc<P>, events: Arc<E>, config: EngineConfig) -> Self {
        let scoring = Arc::new(ScoringEngine::new(config.scoring.clone()));
        Self {
            repository,
            projects,
            dispatcher: EventDispatcher::new(events),
            scoring,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Submit a new application on behalf of the acting student.
    pub fn submit(
        &self,
        actor: &Actor,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationRecord, EngineError> {
        if actor.role != Role::Student || !submission.student_ids.contains(&actor.id) {
            return Err(EngineError::Forbidden(
                "only a listed student can submit an application".to_string(),
            ));
        }
        validate_applicants(submission.applicant_type, &submission.student_ids)?;

        let project = self.project(&submission.project_id)?;
        let existing = self.repository.for_project(&project.id)?;
        ensure_no_live_application(&existing, &submission.student_ids, None)?;

        let score = self.scoring.score(&submission.signals).map_err(scoring_error)?;
        let now = self.clock.now();
        let record = ApplicationRecord {
            id: next_application_id(),
            project_id: project.id,
            applicant_type: submission.applicant_type,
            student_ids: submission.student_ids,
            score,
            status: ApplicationStatus::Submitted,
            statement: submission.statement,
            attachments: submission.attachments,
            created_at: now,
            updated_at: now,
            offer_expires_at: None,
            version: 0,
        };

        let stored = self.repository.insert(record)?;
        info!(
            application_id = %stored.id.0,
            project_id = %stored.project_id.0,
            final_score = stored.score.final_score,
            "application submitted"
        );
        Ok(stored)
    }

    /// Fetch an application and current status for API responses.
    pub fn get(&self, application_id: &ApplicationId) -> Result<ApplicationRecord, EngineError> {
        self.load(application_id)
    }

    /// Applications of a project in review order.
    pub fn ranked(&self, project_id: &ProjectId) -> Result<Vec<ApplicationRecord>, EngineError> {
        let project = self.project(project_id)?;
        Ok(ranking::rank(self.repository.for_project(&project.id)?))
    }

    /// Advisory default pick for assignment.
    pub fn default_candidate(
        &self,
        project_id: &ProjectId,
    ) -> Result<Option<ApplicationRecord>, EngineError> {
        let project = self.project(project_id)?;
        let records = self.repository.for_project(&project.id)?;
        Ok(ranking::default_candidate(&records).cloned())
    }

    pub fn score_breakdown(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ScoreComponent>, EngineError> {
        let record = self.load(application_id)?;
        Ok(self.scoring.breakdown(&record.score))
    }

    /// Actions the matrix offers this actor on the application right now.
    pub fn allowed_actions(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationAction>, EngineError> {
        let record = self.load(application_id)?;
        let project = self.project(&record.project_id)?;
        Ok(
            match access::application_party(actor, &project, &record.student_ids) {
                Some(party) => access::allowed_application_actions(party, record.status),
                None => Vec::new(),
            },
        )
    }

    pub fn shortlist(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        expected_version: Option<u64>,
    ) -> Result<ApplicationRecord, EngineError> {
        self.transition(actor, id, ApplicationAction::Shortlist, expected_version)
    }

    pub fn waitlist(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        expected_version: Option<u64>,
    ) -> Result<ApplicationRecord, EngineError> {
        self.transition(actor, id, ApplicationAction::Waitlist, expected_version)
    }

    pub fn accept(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        expected_version: Option<u64>,
    ) -> Result<ApplicationRecord, EngineError> {
        self.transition(actor, id, ApplicationAction::Accept, expected_version)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        expected_version: Option<u64>,
    ) -> Result<ApplicationRecord, EngineError> {
        self.transition(actor, id, ApplicationAction::Reject, expected_version)
    }

    pub fn withdraw(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        expected_version: Option<u64>,
    ) -> Result<ApplicationRecord, EngineError> {
        self.transition(actor, id, ApplicationAction::Withdraw, expected_version)
    }

    pub fn terminate(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        expected_version: Option<u64>,
    ) -> Result<ApplicationRecord, EngineError> {
        self.transition(actor, id, ApplicationAction::Terminate, expected_version)
    }

    /// Dispatch a command coming from the generic action endpoint.
    pub fn perform(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        command: ApplicationCommand,
        expected_version: Option<u64>,
    ) -> Result<ApplicationRecord, EngineError> {
        match command {
            ApplicationCommand::Transition(ApplicationAction::Reassign) => {
                let record = self.load(id)?;
                self.reassign(actor, &record.project_id, id, None, expected_version)
                    .map(|outcome| outcome.assigned)
            }
            ApplicationCommand::Transition(action) => {
                self.transition(actor, id, action, expected_version)
            }
            ApplicationCommand::Recommend { partner_ids } => {
                self.recommend(actor, id, partner_ids, expected_version)
            }
            ApplicationCommand::Score { value } => self.score(actor, id, value, expected_version),
        }
    }

    /// Move the project's assignment to `new_application_id` in one atomic commit.
    ///
    /// `displaced` is the application the caller believes is currently assigned; when given it
    /// must match storage, otherwise the swap is refused as a conflict. `expected_version` is
    /// the version of the new candidate the caller last saw.
    pub fn reassign(
        &self,
        actor: &Actor,
        project_id: &ProjectId,
        new_application_id: &ApplicationId,
        displaced: Option<&ApplicationId>,
        expected_version: Option<u64>,
    ) -> Result<Reassignment, EngineError> {
        let project = self.project(project_id)?;
        let candidate = self.load(new_application_id)?;
        ensure_version(candidate.version, expected_version)?;
        if candidate.project_id != project.id {
            return Err(EngineError::Validation(format!(
                "application {} does not belong to project {}",
                candidate.id.0, project.id.0
            )));
        }
        self.authorize(actor, &project, &candidate, ApplicationAction::Reassign)?;

        let current = self
            .repository
            .for_project(&project.id)?
            .into_iter()
            .find(|record| record.status == ApplicationStatus::Assigned);

        match (displaced, &current) {
            (Some(expected), Some(actual)) if expected != &actual.id => {
                return Err(EngineError::Conflict(format!(
                    "application {} is assigned, not {}",
                    actual.id.0, expected.0
                )));
            }
            (Some(expected), None) => {
                return Err(EngineError::Conflict(format!(
                    "application {} is no longer assigned",
                    expected.0
                )));
            }
            _ => {}
        }

        let now = self.clock.now();
        let mut batch = Vec::with_capacity(2);
        if let Some(previous) = &current {
            let mut unassigned = previous.clone();
            unassigned.status = DISPLACED_STATUS;
            unassigned.offer_expires_at = None;
            unassigned.updated_at = now;
            batch.push(unassigned);
        }
        let mut assigned = candidate;
        assigned.status = ApplicationStatus::Assigned;
        assigned.offer_expires_at = self.offer_deadline(now);
        assigned.updated_at = now;
        batch.push(assigned);

        let mut committed = self.repository.commit(batch)?;
        let assigned = committed
            .pop()
            .ok_or_else(|| EngineError::Unavailable("commit returned no records".to_string()))?;
        let displaced = committed.pop();

        info!(
            project_id = %project.id.0,
            assigned = %assigned.id.0,
            displaced = displaced.as_ref().map(|record| record.id.0.as_str()).unwrap_or("none"),
            actor = %actor.id.0,
            "project reassigned"
        );

        let mut events = Vec::new();
        if let Some(previous) = &displaced {
            events.extend(member_events(
                previous,
                EventKind::ApplicationUnassigned,
                &project,
            ));
        }
        events.extend(member_events(
            &assigned,
            EventKind::ApplicationAssigned,
            &project,
        ));
        self.dispatcher.dispatch(events);

        Ok(Reassignment {
            assigned,
            displaced,
        })
    }

    /// Fan a recommendation out to partners; the application itself is not modified.
    pub fn recommend(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        partner_ids: Vec<UserId>,
        expected_version: Option<u64>,
    ) -> Result<ApplicationRecord, EngineError> {
        let record = self.load(id)?;
        ensure_version(record.version, expected_version)?;
        let project = self.project(&record.project_id)?;
        self.authorize(actor, &project, &record, ApplicationAction::Recommend)?;

        let partners: BTreeSet<UserId> = partner_ids.into_iter().collect();
        if partners.is_empty() {
            return Err(EngineError::Validation(
                "recommend needs at least one partner id".to_string(),
            ));
        }

        let events = partners
            .into_iter()
            .map(|partner| {
                WorkflowEvent::new(
                    EventKind::ApplicationRecommended,
                    partner,
                    EventSubject::Application(record.id.clone()),
                )
                .with_detail("project_id", project.id.0.clone())
                .with_detail("recommended_by", actor.id.0.clone())
            })
            .collect();
        self.dispatcher.dispatch(events);
        Ok(record)
    }

    /// Record the acting reviewer's manual score and recompute the final score.
    pub fn score(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        value: f32,
        expected_version: Option<u64>,
    ) -> Result<ApplicationRecord, EngineError> {
        let record = self.load(id)?;
        ensure_version(record.version, expected_version)?;
        let project = self.project(&record.project_id)?;
        let party = self.authorize(actor, &project, &record, ApplicationAction::Score)?;

        let scorer = match party {
            ApplicationParty::Supervisor => ManualScorer::Supervisor,
            _ => ManualScorer::Partner,
        };
        let score = self
            .scoring
            .with_manual(&record.score, scorer, value)
            .map_err(|err| match err {
                ScoringError::ManualScoreAlreadySet(_) => EngineError::InvalidTransition {
                    action: ApplicationAction::Score.label(),
                    state: "manual score already recorded",
                },
                other => scoring_error(other),
            })?;

        let mut updated = record;
        updated.score = score;
        updated.updated_at = self.clock.now();
        let stored = self.commit_one(updated)?;
        info!(
            application_id = %stored.id.0,
            final_score = stored.score.final_score,
            "manual score recorded"
        );
        Ok(stored)
    }

    fn transition(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        action: ApplicationAction,
        expected_version: Option<u64>,
    ) -> Result<ApplicationRecord, EngineError> {
        let record = self.load(id)?;
        ensure_version(record.version, expected_version)?;
        let project = self.project(&record.project_id)?;
        self.authorize(actor, &project, &record, action)?;

        let next = machine::next_status(action, record.status).ok_or(
            EngineError::InvalidTransition {
                action: action.label(),
                state: record.status.label(),
            },
        )?;

        let siblings = self.repository.for_project(&project.id)?;
        match action {
            ApplicationAction::Accept => ensure_unassigned(&siblings, &record.id)?,
            ApplicationAction::Reject => self.ensure_rejectable(&project, &siblings, &record)?,
            ApplicationAction::Reopen => {
                ensure_no_live_application(&siblings, &record.student_ids, Some(&record.id))?
            }
            _ => {}
        }

        let now = self.clock.now();
        let from = record.status;
        let mut updated = record;
        updated.status = next;
        updated.updated_at = now;
        updated.offer_expires_at = match next {
            ApplicationStatus::Assigned => self.offer_deadline(now),
            _ => None,
        };

        let stored = self.commit_one(updated)?;
        info!(
            application_id = %stored.id.0,
            project_id = %project.id.0,
            action = action.label(),
            from = from.label(),
            to = stored.status.label(),
            actor = %actor.id.0,
            "application transitioned"
        );

        if stored.status == ApplicationStatus::Assigned {
            self.dispatcher.dispatch(member_events(
                &stored,
                EventKind::ApplicationAssigned,
                &project,
            ));
        }
        Ok(stored)
    }

    fn authorize(
        &self,
        actor: &Actor,
        project: &Project,
        record: &ApplicationRecord,
        action: ApplicationAction,
    ) -> Result<ApplicationParty, EngineError> {
        let party = access::application_party(actor, project, &record.student_ids).ok_or_else(
            || {
                EngineError::Forbidden(format!(
                    "{} {} has no standing on application {}",
                    actor.role, actor.id.0, record.id.0
                ))
            },
        )?;

        match access::application_decision(party, record.status, action) {
            Decision::Allowed => Ok(party),
            Decision::WrongState => Err(EngineError::InvalidTransition {
                action: action.label(),
                state: record.status.label(),
            }),
            Decision::Denied => Err(EngineError::Forbidden(format!(
                "{} may not {} applications",
                actor.role,
                action.label()
            ))),
        }
    }

    fn ensure_rejectable(
        &self,
        project: &Project,
        siblings: &[ApplicationRecord],
        record: &ApplicationRecord,
    ) -> Result<(), EngineError> {
        if self.config.rejection_policy == RejectionPolicy::AllowLastCandidate {
            return Ok(());
        }

        let staffed = siblings
            .iter()
            .filter(|other| other.status == ApplicationStatus::Assigned)
            .count();
        let other_candidates = siblings
            .iter()
            .filter(|other| other.id != record.id && other.status.is_candidate())
            .count();

        if staffed < usize::from(project.capacity.max(1)) && other_candidates == 0 {
            return Err(EngineError::InvariantViolation(format!(
                "rejecting {} would leave project {} with no candidates",
                record.id.0, project.id.0
            )));
        }
        Ok(())
    }

    fn offer_deadline(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.config
            .offer_window_hours
            .map(|hours| now + Duration::hours(hours))
    }

    fn commit_one(&self, record: ApplicationRecord) -> Result<ApplicationRecord, EngineError> {
        self.repository
            .commit(vec![record])?
            .pop()
            .ok_or_else(|| EngineError::Unavailable("commit returned no records".to_string()))
    }

    fn load(&self, id: &ApplicationId) -> Result<ApplicationRecord, EngineError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| EngineError::not_found("application", &id.0))
    }

    fn project(&self, id: &ProjectId) -> Result<Project, EngineError> {
        self.projects
            .project(id)?
            .ok_or_else(|| EngineError::not_found("project", &id.0))
    }
}

fn ensure_unassigned(
    siblings: &[ApplicationRecord],
    candidate: &ApplicationId,
) -> Result<(), EngineError> {
    match siblings
        .iter()
        .find(|other| other.status == ApplicationStatus::Assigned && &other.id != candidate)
    {
        Some(assigned) => Err(EngineError::InvariantViolation(format!(
            "application {} is already assigned to project {}; use reassign",
            assigned.id.0, assigned.project_id.0
        ))),
        None => Ok(()),
    }
}

/// A student may hold at most one live (non-terminal) application per project.
fn ensure_no_live_application(
    siblings: &[ApplicationRecord],
    students: &[UserId],
    except: Option<&ApplicationId>,
) -> Result<(), EngineError> {
    let clash = siblings.iter().find(|record| {
        Some(&record.id) != except
            && !record.status.is_terminal()
            && students.iter().any(|student| record.is_member(student))
    });
    match clash {
        Some(clash) => Err(EngineError::InvariantViolation(format!(
            "a listed student already has live application {} on project {}",
            clash.id.0, clash.project_id.0
        ))),
        None => Ok(()),
    }
}

fn validate_applicants(kind: ApplicantType, students: &[UserId]) -> Result<(), EngineError> {
    let distinct: BTreeSet<&UserId> = students.iter().collect();
    if distinct.len() != students.len() {
        return Err(EngineError::Validation(
            "student ids must be distinct".to_string(),
        ));
    }
    match (kind, students.len()) {
        (_, 0) => Err(EngineError::Validation(
            "an application needs at least one student".to_string(),
        )),
        (ApplicantType::Individual, count) if count != 1 => Err(EngineError::Validation(
            format!("individual applications list exactly one student (found {count})"),
        )),
        _ => Ok(()),
    }
}

fn member_events(
    record: &ApplicationRecord,
    kind: EventKind,
    project: &Project,
) -> Vec<WorkflowEvent> {
    record
        .student_ids
        .iter()
        .map(|student| {
            WorkflowEvent::new(
                kind,
                student.clone(),
                EventSubject::Application(record.id.clone()),
            )
            .with_detail("project_id", project.id.0.clone())
            .with_detail("status", record.status.label())
        })
        .collect()
}

fn scoring_error(err: ScoringError) -> EngineError {
    EngineError::Validation(err.to_string())
}
