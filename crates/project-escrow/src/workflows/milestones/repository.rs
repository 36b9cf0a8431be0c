use super::domain::{Milestone, MilestoneId};
use crate::workflows::directory::{ProjectId, RepositoryError};

/// Storage abstraction for milestones.
///
/// `update` and `remove` are compare-and-swap on `version`: a mismatch is
/// [`RepositoryError::Conflict`]. `update` returns the record with its version incremented.
pub trait MilestoneRepository: Send + Sync {
    fn insert(&self, milestone: Milestone) -> Result<Milestone, RepositoryError>;
    fn fetch(&self, id: &MilestoneId) -> Result<Option<Milestone>, RepositoryError>;
    fn for_project(&self, project_id: &ProjectId) -> Result<Vec<Milestone>, RepositoryError>;
    fn update(&self, milestone: Milestone) -> Result<Milestone, RepositoryError>;
    fn remove(&self, id: &MilestoneId, version: u64) -> Result<(), RepositoryError>;
}
