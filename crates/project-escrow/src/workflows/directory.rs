use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of any platform user (student, partner, supervisor, or admin).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for marketplace projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub String);

/// Read-only project snapshot owned by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_partner_id: UserId,
    pub supervisor_ids: Vec<UserId>,
    pub university_id: String,
    pub department: String,
    pub course: String,
    /// Maximum assignable applications; the marketplace only ever staffs one.
    pub capacity: u8,
    pub currency: String,
    pub deadline: NaiveDate,
}

impl Project {
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_partner_id == user
    }

    pub fn is_supervised_by(&self, user: &UserId) -> bool {
        self.supervisor_ids.iter().any(|id| id == user)
    }
}

/// Lookup of projects from the platform's persistence layer.
pub trait ProjectDirectory: Send + Sync {
    fn project(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError>;
}

/// Error enumeration for persistence failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The stored version moved on, or the write would break a storage-level constraint.
    #[error("record changed since it was read")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Source of the current time, injected so transitions can be replayed in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
