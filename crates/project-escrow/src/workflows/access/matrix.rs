use serde::Serialize;

use crate::workflows::applications::domain::{ApplicationAction, ApplicationStatus};
use crate::workflows::milestones::domain::{MilestoneAction, MilestoneStatus};

/// Relationship of an actor to an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationParty {
    /// Partner owning the project (or a super-admin).
    Owner,
    UniversityAdmin,
    /// Supervisor attached to the project.
    Supervisor,
    /// Student listed in the application's student set.
    Member,
}

/// Relationship of an actor to a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneParty {
    Owner,
    /// Project supervisor while the milestone's supervisor gate is on.
    Supervisor,
    /// Student belonging to the project's assigned application.
    AssignedStudent,
}

/// Outcome of a permission lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// The party may perform the action, just not from the current state.
    WrongState,
    /// The party never holds this action.
    Denied,
}

struct Grant<P: 'static, S: 'static, A: 'static> {
    parties: &'static [P],
    states: &'static [S],
    actions: &'static [A],
}

fn decide<P, S, A>(table: &[Grant<P, S, A>], party: P, state: S, action: A) -> Decision
where
    P: PartialEq,
    S: PartialEq,
    A: PartialEq,
{
    let mut held = false;
    for grant in table
        .iter()
        .filter(|grant| grant.parties.contains(&party) && grant.actions.contains(&action))
    {
        if grant.states.contains(&state) {
            return Decision::Allowed;
        }
        held = true;
    }

    if held {
        Decision::WrongState
    } else {
        Decision::Denied
    }
}

fn collect<P, S, A>(table: &[Grant<P, S, A>], party: P, state: S) -> Vec<A>
where
    P: PartialEq,
    S: PartialEq,
    A: PartialEq + Copy,
{
    let mut actions = Vec::new();
    for grant in table
        .iter()
        .filter(|grant| grant.parties.contains(&party) && grant.states.contains(&state))
    {
        for action in grant.actions {
            if !actions.contains(action) {
                actions.push(*action);
            }
        }
    }
    actions
}

use ApplicationAction as AA;
use ApplicationParty as AP;
use ApplicationStatus as AS;

const REVIEWERS: &[ApplicationParty] = &[AP::Owner, AP::UniversityAdmin, AP::Supervisor];
const SCORERS: &[ApplicationParty] = &[AP::Owner, AP::Supervisor];
const PRE_ASSIGNMENT: &[ApplicationStatus] = &[AS::Submitted, AS::Shortlisted, AS::Waitlist];

static APPLICATION_GRANTS: &[Grant<ApplicationParty, ApplicationStatus, ApplicationAction>] = &[
    Grant {
        parties: REVIEWERS,
        states: &[AS::Submitted],
        actions: &[AA::Shortlist, AA::Waitlist],
    },
    Grant {
        parties: REVIEWERS,
        states: &[AS::Shortlisted],
        actions: &[AA::Waitlist, AA::Reset],
    },
    Grant {
        parties: REVIEWERS,
        states: &[AS::Waitlist],
        actions: &[AA::Shortlist, AA::Reset],
    },
    Grant {
        parties: REVIEWERS,
        states: PRE_ASSIGNMENT,
        actions: &[AA::Accept, AA::Reject, AA::Reassign],
    },
    Grant {
        parties: REVIEWERS,
        states: &[AS::Rejected],
        actions: &[AA::Reopen],
    },
    Grant {
        parties: REVIEWERS,
        states: &[
            AS::Submitted,
            AS::Shortlisted,
            AS::Waitlist,
            AS::Assigned,
            AS::Withdrawn,
            AS::Terminated,
        ],
        actions: &[AA::Recommend],
    },
    Grant {
        parties: SCORERS,
        states: &[AS::Submitted, AS::Shortlisted, AS::Waitlist, AS::Assigned],
        actions: &[AA::Score],
    },
    Grant {
        parties: &[AP::Member],
        states: PRE_ASSIGNMENT,
        actions: &[AA::Withdraw],
    },
    Grant {
        parties: &[AP::Member],
        states: &[AS::Assigned],
        actions: &[AA::Terminate],
    },
];

use MilestoneAction as MA;
use MilestoneParty as MP;
use MilestoneStatus as MS;

static MILESTONE_GRANTS: &[Grant<MilestoneParty, MilestoneStatus, MilestoneAction>] = &[
    Grant {
        parties: &[MP::Owner],
        states: MilestoneStatus::EDITABLE,
        actions: &[MA::Edit, MA::Delete],
    },
    Grant {
        parties: &[MP::Owner],
        states: &[MS::Proposed],
        actions: &[MA::Draft],
    },
    Grant {
        parties: &[MP::Owner],
        states: &[MS::Accepted],
        actions: &[MA::Finalize],
    },
    Grant {
        parties: &[MP::Owner],
        states: &[MS::Finalized],
        actions: &[MA::Fund],
    },
    Grant {
        parties: &[MP::Owner],
        states: &[MS::Submitted],
        actions: &[MA::OpenReview],
    },
    Grant {
        parties: &[MP::Owner],
        states: &[MS::PartnerReview],
        actions: &[MA::ApproveRelease, MA::RequestChanges],
    },
    Grant {
        parties: &[MP::Owner],
        states: &[MS::Released],
        actions: &[MA::Disapprove, MA::MarkComplete],
    },
    Grant {
        parties: &[MP::Owner],
        states: &[MS::Completed],
        actions: &[MA::UnmarkComplete],
    },
    Grant {
        parties: &[MP::Owner],
        states: MilestoneStatus::DISPUTABLE,
        actions: &[MA::Dispute],
    },
    Grant {
        parties: &[MP::Supervisor],
        states: &[MS::SupervisorReview],
        actions: &[MA::SupervisorApprove, MA::SupervisorRequestChanges],
    },
    Grant {
        parties: &[MP::AssignedStudent],
        states: &[MS::Draft],
        actions: &[MA::AcceptTerms],
    },
    Grant {
        parties: &[MP::AssignedStudent],
        states: &[MS::Funded],
        actions: &[MA::Start],
    },
    Grant {
        parties: &[MP::AssignedStudent],
        states: &[MS::InProgress],
        actions: &[MA::Submit],
    },
    Grant {
        parties: &[MP::AssignedStudent],
        states: &[MS::ChangesRequested],
        actions: &[MA::Submit, MA::Resume],
    },
];

pub fn application_decision(
    party: ApplicationParty,
    status: ApplicationStatus,
    action: ApplicationAction,
) -> Decision {
    decide(APPLICATION_GRANTS, party, status, action)
}

pub fn allowed_application_actions(
    party: ApplicationParty,
    status: ApplicationStatus,
) -> Vec<ApplicationAction> {
    collect(APPLICATION_GRANTS, party, status)
}

pub fn milestone_decision(
    party: MilestoneParty,
    status: MilestoneStatus,
    action: MilestoneAction,
) -> Decision {
    decide(MILESTONE_GRANTS, party, status, action)
}

pub fn allowed_milestone_actions(
    party: MilestoneParty,
    status: MilestoneStatus,
) -> Vec<MilestoneAction> {
    collect(MILESTONE_GRANTS, party, status)
}
