//! Application intake, scoring, ranking, and the assignment state machine.
//!
//! A project is staffed by at most one `ASSIGNED` application. Every transition is checked
//! against the permission matrix and the state machine before it is committed through the
//! repository; notifications follow the commit.

pub mod domain;
pub mod machine;
pub mod ranking;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicantType, ApplicationAction, ApplicationId, ApplicationRecord, ApplicationStatus,
    ApplicationStatusView, ApplicationSubmission, AttachmentRef, Reassignment,
};
pub use repository::ApplicationRepository;
pub use router::application_router;
pub use scoring::{
    ManualScorer, Score, ScoreComponent, ScoreFactor, ScoreSignals, ScoringConfig, ScoringEngine,
    ScoringError,
};
pub use service::{ApplicationCommand, ApplicationService};
