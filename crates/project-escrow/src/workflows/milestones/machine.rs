//! Transition function of the milestone escrow state machine.

use super::domain::{MilestoneAction, MilestoneStatus};

/// Target status of `action` from `from`, or `None` when the lifecycle has no such edge.
///
/// `edit`, `delete`, and `dispute` keep the current status. `open-review` routes through
/// supervisor review only when the gate is on.
pub fn next_status(
    action: MilestoneAction,
    from: MilestoneStatus,
    supervisor_gate: bool,
) -> Option<MilestoneStatus> {
    use MilestoneAction as A;
    use MilestoneStatus as S;

    match (action, from) {
        (A::Edit | A::Delete, status) if status.is_editable() => Some(status),
        (A::Dispute, status) if S::DISPUTABLE.contains(&status) => Some(status),
        (A::Draft, S::Proposed) => Some(S::Draft),
        (A::AcceptTerms, S::Draft) => Some(S::Accepted),
        (A::Finalize, S::Accepted) => Some(S::Finalized),
        (A::Fund, S::Finalized) => Some(S::Funded),
        (A::Start, S::Funded) => Some(S::InProgress),
        (A::Submit, S::InProgress | S::ChangesRequested) => Some(S::Submitted),
        (A::Resume, S::ChangesRequested) => Some(S::InProgress),
        (A::OpenReview, S::Submitted) if supervisor_gate => Some(S::SupervisorReview),
        (A::OpenReview, S::Submitted) => Some(S::PartnerReview),
        (A::SupervisorApprove, S::SupervisorReview) => Some(S::PartnerReview),
        (A::SupervisorRequestChanges, S::SupervisorReview) => Some(S::ChangesRequested),
        (A::ApproveRelease, S::PartnerReview) => Some(S::Released),
        (A::RequestChanges, S::PartnerReview) => Some(S::ChangesRequested),
        (A::Disapprove, S::Released) => Some(S::PartnerReview),
        (A::MarkComplete, S::Released) => Some(S::Completed),
        (A::UnmarkComplete, S::Completed) => Some(S::Released),
        _ => None,
    }
}
