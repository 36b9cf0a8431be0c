//! Process-local persistence used by the API binary, the demo, and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::applications::{
    ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationStatus,
};
use super::directory::{Project, ProjectDirectory, ProjectId, RepositoryError};
use super::milestones::{Milestone, MilestoneId, MilestoneRepository};

#[derive(Debug, Default)]
struct StoreState {
    projects: BTreeMap<ProjectId, Project>,
    applications: BTreeMap<ApplicationId, ApplicationRecord>,
    milestones: BTreeMap<MilestoneId, Milestone>,
}

/// Mutex-backed store implementing every persistence seam.
///
/// All writes happen under one lock, so a multi-record `commit` is applied atomically.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(projects: impl IntoIterator<Item = Project>) -> Self {
        let state = StoreState {
            projects: projects
                .into_iter()
                .map(|project| (project.id.clone(), project))
                .collect(),
            ..StoreState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Register or replace a project snapshot.
    pub fn add_project(&self, project: Project) -> Result<(), RepositoryError> {
        self.lock()?.projects.insert(project.id.clone(), project);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl ProjectDirectory for InMemoryStore {
    fn project(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError> {
        Ok(self.lock()?.projects.get(id).cloned())
    }
}

impl ApplicationRepository for InMemoryStore {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut state = self.lock()?;
        if state.applications.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        state.applications.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self.lock()?.applications.get(id).cloned())
    }

    fn for_project(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(self
            .lock()?
            .applications
            .values()
            .filter(|record| &record.project_id == project_id)
            .cloned()
            .collect())
    }

    fn commit(
        &self,
        records: Vec<ApplicationRecord>,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let mut state = self.lock()?;

        for record in &records {
            let stored = state
                .applications
                .get(&record.id)
                .ok_or(RepositoryError::NotFound)?;
            if stored.version != record.version {
                return Err(RepositoryError::Conflict);
            }
        }

        let incoming: BTreeMap<&ApplicationId, &ApplicationRecord> =
            records.iter().map(|record| (&record.id, record)).collect();
        let touched: BTreeSet<&ProjectId> =
            records.iter().map(|record| &record.project_id).collect();
        for project_id in touched {
            let assigned = state
                .applications
                .values()
                .filter(|stored| &stored.project_id == project_id)
                .map(|stored| incoming.get(&stored.id).copied().unwrap_or(stored))
                .filter(|record| record.status == ApplicationStatus::Assigned)
                .count();
            if assigned > 1 {
                return Err(RepositoryError::Conflict);
            }
        }

        let committed: Vec<ApplicationRecord> = records
            .into_iter()
            .map(|mut record| {
                record.version += 1;
                record
            })
            .collect();
        for record in &committed {
            state.applications.insert(record.id.clone(), record.clone());
        }
        Ok(committed)
    }
}

impl MilestoneRepository for InMemoryStore {
    fn insert(&self, milestone: Milestone) -> Result<Milestone, RepositoryError> {
        let mut state = self.lock()?;
        if state.milestones.contains_key(&milestone.id) {
            return Err(RepositoryError::Conflict);
        }
        state.milestones.insert(milestone.id.clone(), milestone.clone());
        Ok(milestone)
    }

    fn fetch(&self, id: &MilestoneId) -> Result<Option<Milestone>, RepositoryError> {
        Ok(self.lock()?.milestones.get(id).cloned())
    }

    fn for_project(&self, project_id: &ProjectId) -> Result<Vec<Milestone>, RepositoryError> {
        Ok(self
            .lock()?
            .milestones
            .values()
            .filter(|milestone| &milestone.project_id == project_id)
            .cloned()
            .collect())
    }

    fn update(&self, mut milestone: Milestone) -> Result<Milestone, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .milestones
            .get_mut(&milestone.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != milestone.version {
            return Err(RepositoryError::Conflict);
        }
        milestone.version += 1;
        *stored = milestone.clone();
        Ok(milestone)
    }

    fn remove(&self, id: &MilestoneId, version: u64) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.milestones.get(id) {
            None => Err(RepositoryError::NotFound),
            Some(stored) if stored.version != version => Err(RepositoryError::Conflict),
            Some(_) => {
                state.milestones.remove(id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::applications::{ApplicantType, ScoreSignals, ScoringConfig, ScoringEngine};
    use crate::workflows::directory::UserId;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn record(id: &str, status: ApplicationStatus) -> ApplicationRecord {
        let score = ScoringEngine::new(ScoringConfig::default())
            .score(&ScoreSignals {
                skill_match: 80.0,
                rating_score: 70.0,
                on_time_rate: 0.9,
                rework_rate: 0.1,
                portfolio_score: 60.0,
            })
            .expect("valid signals");
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid time");
        ApplicationRecord {
            id: ApplicationId(id.to_string()),
            project_id: ProjectId("prj-1".to_string()),
            applicant_type: ApplicantType::Individual,
            student_ids: vec![UserId(format!("stu-{id}"))],
            score,
            status,
            statement: String::new(),
            attachments: Vec::new(),
            created_at: at,
            updated_at: at,
            offer_expires_at: None,
            version: 0,
        }
    }

    #[test]
    fn commit_bumps_versions_and_rejects_stale_writes() {
        let store = InMemoryStore::new();
        ApplicationRepository::insert(&store, record("a", ApplicationStatus::Submitted))
            .expect("insert");

        let mut shortlisted = record("a", ApplicationStatus::Shortlisted);
        let committed = store.commit(vec![shortlisted.clone()]).expect("commit");
        assert_eq!(committed[0].version, 1);

        shortlisted.status = ApplicationStatus::Waitlist;
        assert_eq!(store.commit(vec![shortlisted]), Err(RepositoryError::Conflict));
        let stored = ApplicationRepository::fetch(&store, &ApplicationId("a".to_string()))
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.status, ApplicationStatus::Shortlisted);
    }

    #[test]
    fn commit_refuses_a_second_assignment_and_writes_nothing() {
        let store = InMemoryStore::new();
        ApplicationRepository::insert(&store, record("a", ApplicationStatus::Assigned))
            .expect("insert");
        ApplicationRepository::insert(&store, record("b", ApplicationStatus::Submitted))
            .expect("insert");
        ApplicationRepository::insert(&store, record("c", ApplicationStatus::Submitted))
            .expect("insert");

        let batch = vec![
            record("c", ApplicationStatus::Rejected),
            record("b", ApplicationStatus::Assigned),
        ];
        assert_eq!(store.commit(batch), Err(RepositoryError::Conflict));

        let project = ProjectId("prj-1".to_string());
        let untouched = ApplicationRepository::for_project(&store, &project).expect("list");
        assert!(untouched.iter().all(|record| record.version == 0));
        assert_eq!(
            untouched
                .iter()
                .find(|record| record.id.0 == "c")
                .map(|record| record.status),
            Some(ApplicationStatus::Submitted)
        );
    }

    #[test]
    fn swapping_the_assignee_in_one_batch_is_accepted() {
        let store = InMemoryStore::new();
        ApplicationRepository::insert(&store, record("a", ApplicationStatus::Assigned))
            .expect("insert");
        ApplicationRepository::insert(&store, record("b", ApplicationStatus::Waitlist))
            .expect("insert");

        let committed = store
            .commit(vec![
                record("a", ApplicationStatus::Rejected),
                record("b", ApplicationStatus::Assigned),
            ])
            .expect("swap commits");
        assert_eq!(committed.len(), 2);
        assert!(committed.iter().all(|record| record.version == 1));
    }

    #[test]
    fn projects_are_served_from_the_directory() {
        let store = InMemoryStore::new();
        let project = Project {
            id: ProjectId("prj-9".to_string()),
            owner_partner_id: UserId("partner-9".to_string()),
            supervisor_ids: Vec::new(),
            university_id: "uni-1".to_string(),
            department: "Design".to_string(),
            course: "Studio".to_string(),
            capacity: 1,
            currency: "EUR".to_string(),
            deadline: NaiveDate::from_ymd_opt(2026, 12, 31).expect("valid date"),
        };
        store.add_project(project.clone()).expect("add project");
        assert_eq!(store.project(&project.id), Ok(Some(project)));
        assert_eq!(store.project(&ProjectId("missing".to_string())), Ok(None));
    }
}
