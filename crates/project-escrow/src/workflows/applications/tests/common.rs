use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::workflows::applications::{
    ApplicantType, ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationService,
    ApplicationSubmission, ScoreSignals,
};
use crate::workflows::{
    Actor, Clock, EventPublisher, InMemoryStore, Project, ProjectId, PublishError,
    RepositoryError, Role, UserId, WorkflowEvent,
};

pub(super) type TestService = ApplicationService<InMemoryStore, InMemoryStore, RecordingPublisher>;

pub(super) struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn project() -> Project {
    Project {
        id: ProjectId("prj-1".to_string()),
        owner_partner_id: UserId("partner-1".to_string()),
        supervisor_ids: vec![UserId("sup-1".to_string())],
        university_id: "uni-1".to_string(),
        department: "Computer Science".to_string(),
        course: "Capstone".to_string(),
        capacity: 1,
        currency: "USD".to_string(),
        deadline: NaiveDate::from_ymd_opt(2026, 6, 30).expect("valid date"),
    }
}

pub(super) fn partner() -> Actor {
    Actor::new("partner-1", Role::Partner)
}

pub(super) fn supervisor() -> Actor {
    Actor::new("sup-1", Role::Supervisor)
}

pub(super) fn student(id: &str) -> Actor {
    Actor::new(id, Role::Student)
}

pub(super) fn signals(skill_match: f32) -> ScoreSignals {
    ScoreSignals {
        skill_match,
        rating_score: 70.0,
        on_time_rate: 0.9,
        rework_rate: 0.1,
        portfolio_score: 60.0,
    }
}

pub(super) fn submission(students: &[&str], skill_match: f32) -> ApplicationSubmission {
    ApplicationSubmission {
        project_id: project().id,
        applicant_type: if students.len() == 1 {
            ApplicantType::Individual
        } else {
            ApplicantType::Group
        },
        student_ids: students
            .iter()
            .map(|id| UserId((*id).to_string()))
            .collect(),
        statement: "We have shipped two React Native apps.".to_string(),
        attachments: Vec::new(),
        signals: signals(skill_match),
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

pub(super) struct OfflinePublisher;

impl EventPublisher for OfflinePublisher {
    fn publish(&self, _event: WorkflowEvent) -> Result<(), PublishError> {
        Err(PublishError::Transport("chat gateway offline".to_string()))
    }
}

/// Repository whose storage is unreachable.
pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_project(
        &self,
        _project_id: &ProjectId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit(
        &self,
        _records: Vec<ApplicationRecord>,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Reads go to the wrapped store; every commit fails after the reads succeeded.
pub(super) struct CommitFailingRepository {
    pub(super) inner: Arc<InMemoryStore>,
}

impl ApplicationRepository for CommitFailingRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        ApplicationRepository::insert(self.inner.as_ref(), record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        ApplicationRepository::fetch(self.inner.as_ref(), id)
    }

    fn for_project(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        ApplicationRepository::for_project(self.inner.as_ref(), project_id)
    }

    fn commit(
        &self,
        _records: Vec<ApplicationRecord>,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("write timed out".to_string()))
    }
}

pub(super) fn build_service() -> (TestService, Arc<InMemoryStore>, Arc<RecordingPublisher>) {
    build_service_with(EngineConfig::default())
}

pub(super) fn build_service_with(
    config: EngineConfig,
) -> (TestService, Arc<InMemoryStore>, Arc<RecordingPublisher>) {
    let store = Arc::new(InMemoryStore::with_projects([project()]));
    let publisher = Arc::new(RecordingPublisher::default());
    let service = ApplicationService::new(store.clone(), store.clone(), publisher.clone(), config)
        .with_clock(Arc::new(FixedClock(now())));
    (service, store, publisher)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
