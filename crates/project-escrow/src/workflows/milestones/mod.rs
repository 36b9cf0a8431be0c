//! Milestone escrow lifecycle: proposal, funding, delivery, review, and release.

pub mod domain;
pub mod machine;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Dispute, EscrowStatus, Milestone, MilestoneAction, MilestoneChanges, MilestoneDraft,
    MilestoneId, MilestoneStatus, MilestoneStatusView,
};
pub use repository::MilestoneRepository;
pub use router::milestone_router;
pub use service::MilestoneService;
