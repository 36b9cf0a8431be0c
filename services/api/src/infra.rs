use chrono::{NaiveDate, TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use project_escrow::config::EngineConfig;
use project_escrow::workflows::applications::ApplicationService;
use project_escrow::workflows::milestones::MilestoneService;
use project_escrow::workflows::{
    Clock, EventPublisher, InMemoryStore, Project, ProjectId, PublishError, UserId,
    WorkflowEvent,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

pub(crate) type Applications = ApplicationService<InMemoryStore, InMemoryStore, LoggingPublisher>;
pub(crate) type Milestones =
    MilestoneService<InMemoryStore, InMemoryStore, InMemoryStore, LoggingPublisher>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Stand-in for the chat/notification gateway: logs every event.
///
/// `serve` only logs. The demo asks for a transcript so it can print what was queued.
#[derive(Default, Clone)]
pub(crate) struct LoggingPublisher {
    transcript: Option<Arc<Mutex<Vec<WorkflowEvent>>>>,
}

impl EventPublisher for LoggingPublisher {
    fn publish(&self, event: WorkflowEvent) -> Result<(), PublishError> {
        info!(
            template = event.kind.template(),
            recipient = %event.recipient.0,
            "notification queued"
        );
        if let Some(transcript) = &self.transcript {
            transcript
                .lock()
                .map_err(|_| PublishError::Transport("event log poisoned".to_string()))?
                .push(event);
        }
        Ok(())
    }
}

impl LoggingPublisher {
    pub(crate) fn recording() -> Self {
        Self {
            transcript: Some(Arc::default()),
        }
    }

    pub(crate) fn events(&self) -> Vec<WorkflowEvent> {
        self.transcript
            .as_ref()
            .and_then(|transcript| transcript.lock().ok().map(|guard| guard.clone()))
            .unwrap_or_default()
    }
}

/// Clock pinned to one instant, used by the demo to make its output reproducible.
pub(crate) struct PinnedClock(pub(crate) chrono::DateTime<Utc>);

impl PinnedClock {
    pub(crate) fn at_morning_of(day: NaiveDate) -> Self {
        let instant = day
            .and_hms_opt(9, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or_else(Utc::now);
        Self(instant)
    }
}

impl Clock for PinnedClock {
    fn now(&self) -> chrono::DateTime<Utc> {
        self.0
    }
}

/// Marketplace project the in-memory store starts with.
pub(crate) fn sample_project(today: NaiveDate) -> Project {
    Project {
        id: ProjectId("prj-mobile-onboarding".to_string()),
        owner_partner_id: UserId("partner-acme".to_string()),
        supervisor_ids: vec![UserId("sup-rivera".to_string())],
        university_id: "uni-northfield".to_string(),
        department: "Computer Science".to_string(),
        course: "Industry Capstone".to_string(),
        capacity: 1,
        currency: "USD".to_string(),
        deadline: today + chrono::Duration::days(120),
    }
}

pub(crate) fn build_services(
    store: Arc<InMemoryStore>,
    events: Arc<LoggingPublisher>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
) -> (Arc<Applications>, Arc<Milestones>) {
    let applications = ApplicationService::new(store.clone(), store.clone(), events.clone(), config)
        .with_clock(clock.clone());
    let milestones =
        MilestoneService::new(store.clone(), store.clone(), store, events).with_clock(clock);
    (Arc::new(applications), Arc::new(milestones))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
