//! Transition function of the application state machine.

use super::domain::{ApplicationAction, ApplicationStatus};

/// Target status of `action` from `from`, or `None` when the lifecycle has no such edge.
///
/// Side-channel actions (`recommend`, `score`) have no edge and always yield `None`.
pub fn next_status(
    action: ApplicationAction,
    from: ApplicationStatus,
) -> Option<ApplicationStatus> {
    use ApplicationAction as A;
    use ApplicationStatus as S;

    match (action, from) {
        (A::Shortlist, S::Submitted | S::Waitlist) => Some(S::Shortlisted),
        (A::Waitlist, S::Submitted | S::Shortlisted) => Some(S::Waitlist),
        (A::Reset, S::Shortlisted | S::Waitlist) => Some(S::Submitted),
        (A::Accept | A::Reassign, S::Submitted | S::Shortlisted | S::Waitlist) => {
            Some(S::Assigned)
        }
        (A::Reject, S::Submitted | S::Shortlisted | S::Waitlist) => Some(S::Rejected),
        (A::Reopen, S::Rejected) => Some(S::Submitted),
        (A::Withdraw, S::Submitted | S::Shortlisted | S::Waitlist) => Some(S::Withdrawn),
        (A::Terminate, S::Assigned) => Some(S::Terminated),
        _ => None,
    }
}

/// Status an assigned application takes when a reassignment displaces it.
pub const DISPLACED_STATUS: ApplicationStatus = ApplicationStatus::Rejected;
