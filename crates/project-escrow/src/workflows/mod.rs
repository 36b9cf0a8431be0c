//! Screening and escrow workflows plus the collaborator seams they depend on.

pub mod access;
pub mod applications;
pub mod coordinator;
pub mod directory;
mod error;
pub mod http;
pub mod ledger;
pub mod milestones;
pub mod store;

pub use access::{Actor, Role};
pub use coordinator::{
    EventDispatcher, EventKind, EventPublisher, EventSubject, PublishError, WorkflowEvent,
};
pub use directory::{
    Clock, Project, ProjectDirectory, ProjectId, RepositoryError, SystemClock, UserId,
};
pub use error::EngineError;
pub use ledger::TentativeLedger;
pub use store::InMemoryStore;
