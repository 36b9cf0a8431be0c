//! Application screening and milestone escrow engine.
//!
//! The crate owns the business rules of the project marketplace: which applicant is assigned to
//! a project, and how a milestone's escrowed funds move from proposal to release. Persistence,
//! identity, and notification delivery are reached through the collaborator traits exposed by
//! [`workflows`].

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
