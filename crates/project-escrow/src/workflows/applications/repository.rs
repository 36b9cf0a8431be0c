use super::domain::{ApplicationId, ApplicationRecord};
use crate::workflows::directory::{ProjectId, RepositoryError};

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Implementations must make `commit` all-or-nothing: every record's `version` is compared with
/// the stored version, and the whole batch is refused with [`RepositoryError::Conflict`] if any
/// differs or if the batch would leave a project with more than one `ASSIGNED` application.
/// Committed records come back with their version incremented.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn for_project(&self, project_id: &ProjectId)
        -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn commit(
        &self,
        records: Vec<ApplicationRecord>,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}
