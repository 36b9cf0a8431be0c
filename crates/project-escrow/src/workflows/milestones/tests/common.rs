use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::applications::{
    ApplicantType, ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationStatus,
    ScoreSignals, ScoringConfig, ScoringEngine,
};
use crate::workflows::milestones::{
    Milestone, MilestoneAction, MilestoneDraft, MilestoneId, MilestoneRepository,
    MilestoneService,
};
use crate::workflows::{
    Actor, Clock, EventPublisher, InMemoryStore, Project, ProjectId, PublishError, RepositoryError,
    Role, UserId, WorkflowEvent,
};

pub(super) type TestService =
    MilestoneService<InMemoryStore, InMemoryStore, InMemoryStore, RecordingPublisher>;

pub(super) struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn project() -> Project {
    Project {
        id: ProjectId("prj-7".to_string()),
        owner_partner_id: UserId("partner-7".to_string()),
        supervisor_ids: vec![UserId("sup-7".to_string())],
        university_id: "uni-1".to_string(),
        department: "Engineering".to_string(),
        course: "Industry Studio".to_string(),
        capacity: 1,
        currency: "USD".to_string(),
        deadline: NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date"),
    }
}

pub(super) fn partner() -> Actor {
    Actor::new("partner-7", Role::Partner)
}

pub(super) fn supervisor() -> Actor {
    Actor::new("sup-7", Role::Supervisor)
}

/// Member of the project's assigned application.
pub(super) fn builder() -> Actor {
    Actor::new("stu-1", Role::Student)
}

pub(super) fn draft(supervisor_gate: bool) -> MilestoneDraft {
    MilestoneDraft {
        project_id: project().id,
        title: "Onboarding flow".to_string(),
        scope: "Sign-up, email verification, and profile setup screens".to_string(),
        acceptance_criteria: "Flows pass the agreed UI review".to_string(),
        due_date: NaiveDate::from_ymd_opt(2026, 4, 15).expect("valid date"),
        amount: 250_000,
        currency: "USD".to_string(),
        supervisor_gate,
    }
}

fn assigned_application() -> ApplicationRecord {
    let score = ScoringEngine::new(ScoringConfig::default())
        .score(&ScoreSignals {
            skill_match: 85.0,
            rating_score: 80.0,
            on_time_rate: 0.95,
            rework_rate: 0.05,
            portfolio_score: 70.0,
        })
        .expect("valid signals");
    ApplicationRecord {
        id: ApplicationId("app-assigned".to_string()),
        project_id: project().id,
        applicant_type: ApplicantType::Group,
        student_ids: vec![UserId("stu-1".to_string()), UserId("stu-2".to_string())],
        score,
        status: ApplicationStatus::Assigned,
        statement: String::new(),
        attachments: Vec::new(),
        created_at: now(),
        updated_at: now(),
        offer_expires_at: None,
        version: 1,
    }
}

#[derive(Default)]
pub(super) struct RecordingPublisher {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingPublisher {
    pub(super) fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().expect("publisher mutex poisoned").clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: WorkflowEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .expect("publisher mutex poisoned")
            .push(event);
        Ok(())
    }
}

/// Store holding the project and, when `staffed`, its assigned application.
pub(super) fn store(staffed: bool) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::with_projects([project()]));
    if staffed {
        ApplicationRepository::insert(store.as_ref(), assigned_application())
            .expect("seed assigned application");
    }
    store
}

pub(super) fn build_service() -> (TestService, Arc<InMemoryStore>, Arc<RecordingPublisher>) {
    build_service_on(store(true))
}

pub(super) fn build_service_on(
    store: Arc<InMemoryStore>,
) -> (TestService, Arc<InMemoryStore>, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::default());
    let service = MilestoneService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        publisher.clone(),
    )
    .with_clock(Arc::new(FixedClock(now())));
    (service, store, publisher)
}

/// Reads go to the shared store; every write is refused as if storage went away.
pub(super) struct WriteFailingRepository {
    pub(super) inner: Arc<InMemoryStore>,
}

impl MilestoneRepository for WriteFailingRepository {
    fn insert(&self, _milestone: Milestone) -> Result<Milestone, RepositoryError> {
        Err(RepositoryError::Unavailable("write timed out".to_string()))
    }

    fn fetch(&self, id: &MilestoneId) -> Result<Option<Milestone>, RepositoryError> {
        MilestoneRepository::fetch(self.inner.as_ref(), id)
    }

    fn for_project(&self, project_id: &ProjectId) -> Result<Vec<Milestone>, RepositoryError> {
        MilestoneRepository::for_project(self.inner.as_ref(), project_id)
    }

    fn update(&self, _milestone: Milestone) -> Result<Milestone, RepositoryError> {
        Err(RepositoryError::Unavailable("write timed out".to_string()))
    }

    fn remove(&self, _id: &MilestoneId, _version: u64) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("write timed out".to_string()))
    }
}

pub(super) type FailingService =
    MilestoneService<WriteFailingRepository, InMemoryStore, InMemoryStore, RecordingPublisher>;

/// Service sharing `store` for reads whose milestone writes always fail.
pub(super) fn failing_service_on(
    store: Arc<InMemoryStore>,
) -> (FailingService, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::default());
    let repository = Arc::new(WriteFailingRepository {
        inner: store.clone(),
    });
    let service = MilestoneService::new(repository, store.clone(), store, publisher.clone())
        .with_clock(Arc::new(FixedClock(now())));
    (service, publisher)
}

/// Run `steps` in order, failing the test on the first refused step.
pub(super) fn advance(
    service: &TestService,
    id: &MilestoneId,
    steps: &[(Actor, MilestoneAction)],
) -> Milestone {
    let mut current = service.get(id).expect("milestone exists");
    for (actor, action) in steps {
        current = service
            .perform(actor, id, *action, None, Some(current.version))
            .unwrap_or_else(|err| panic!("{} by {} failed: {err}", action.label(), actor.id.0));
        assert!(current.is_consistent(), "escrow out of step after {}", action.label());
    }
    current
}

/// Create a milestone and drive it to `SUBMITTED`.
pub(super) fn submitted_milestone(service: &TestService, supervisor_gate: bool) -> Milestone {
    let created = service
        .create(&partner(), draft(supervisor_gate))
        .expect("create succeeds");
    advance(
        service,
        &created.id,
        &[
            (partner(), MilestoneAction::Draft),
            (builder(), MilestoneAction::AcceptTerms),
            (partner(), MilestoneAction::Finalize),
            (partner(), MilestoneAction::Fund),
            (builder(), MilestoneAction::Start),
            (builder(), MilestoneAction::Submit),
        ],
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
