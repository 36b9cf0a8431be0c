//! Permission engine shared by the application and milestone workflows.
//!
//! Callers resolve the acting user's *party* towards an entity (owner, reviewer, member, ...)
//! from explicit inputs, then consult a static grant table. Nothing here reads session or
//! global state: the outcome is a pure function of actor, entity, and action.

mod matrix;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::directory::{Project, UserId};

pub use matrix::{
    allowed_application_actions, allowed_milestone_actions, application_decision,
    milestone_decision, ApplicationParty, Decision, MilestoneParty,
};

/// Platform role carried by every authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Partner,
    Supervisor,
    UniversityAdmin,
    SuperAdmin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Partner => "partner",
            Role::Supervisor => "supervisor",
            Role::UniversityAdmin => "university_admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "student" => Ok(Role::Student),
            "partner" => Ok(Role::Partner),
            "supervisor" => Ok(Role::Supervisor),
            "university_admin" => Ok(Role::UniversityAdmin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The acting user, resolved by the identity collaborator and passed into every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
    /// University a university admin acts for; other roles leave it unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_id: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId(id.into()),
            role,
            university_id: None,
        }
    }

    pub fn with_university(mut self, university_id: impl Into<String>) -> Self {
        self.university_id = Some(university_id.into());
        self
    }

    /// Partner owning the project, or a super-admin acting on its behalf.
    pub fn owns(&self, project: &Project) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::Partner => project.is_owned_by(&self.id),
            _ => false,
        }
    }

    pub fn supervises(&self, project: &Project) -> bool {
        self.role == Role::Supervisor && project.is_supervised_by(&self.id)
    }

    /// University admin of the university the project belongs to.
    pub fn administers(&self, project: &Project) -> bool {
        self.role == Role::UniversityAdmin
            && self.university_id.as_deref() == Some(project.university_id.as_str())
    }
}

/// Resolve how an actor relates to an application.
pub fn application_party(
    actor: &Actor,
    project: &Project,
    student_ids: &[UserId],
) -> Option<ApplicationParty> {
    match actor.role {
        Role::SuperAdmin | Role::Partner if actor.owns(project) => Some(ApplicationParty::Owner),
        Role::UniversityAdmin if actor.administers(project) => {
            Some(ApplicationParty::UniversityAdmin)
        }
        Role::Supervisor if actor.supervises(project) => Some(ApplicationParty::Supervisor),
        Role::Student if student_ids.contains(&actor.id) => Some(ApplicationParty::Member),
        _ => None,
    }
}

/// Resolve how an actor relates to a milestone.
///
/// `assigned_students` is the student set of the project's assigned application (empty when
/// the project is unstaffed). Supervisors only count as a party while the gate is on.
pub fn milestone_party(
    actor: &Actor,
    project: &Project,
    supervisor_gate: bool,
    assigned_students: &[UserId],
) -> Option<MilestoneParty> {
    match actor.role {
        Role::SuperAdmin | Role::Partner if actor.owns(project) => Some(MilestoneParty::Owner),
        Role::Supervisor if supervisor_gate && actor.supervises(project) => {
            Some(MilestoneParty::Supervisor)
        }
        Role::Student if assigned_students.contains(&actor.id) => {
            Some(MilestoneParty::AssignedStudent)
        }
        _ => None,
    }
}
