use super::common::*;
use crate::workflows::milestones::{
    EscrowStatus, MilestoneAction, MilestoneChanges, MilestoneRepository, MilestoneStatus,
};
use crate::workflows::{Actor, EngineError, EventKind, Role, UserId};
use chrono::NaiveDate;

#[test]
fn create_proposes_an_unfunded_milestone() {
    let (service, _, _) = build_service();

    let milestone = service
        .create(&partner(), draft(false))
        .expect("create succeeds");

    assert_eq!(milestone.status, MilestoneStatus::Proposed);
    assert_eq!(milestone.escrow_status, EscrowStatus::Unfunded);
    assert_eq!(milestone.version, 0);
    assert!(milestone.id.0.starts_with("ms-"));
}

#[test]
fn only_the_owning_partner_creates_milestones() {
    let (service, _, _) = build_service();

    let by_student = service.create(&builder(), draft(false));
    assert!(matches!(by_student, Err(EngineError::Forbidden(_))));

    let by_other_partner = service.create(&Actor::new("partner-8", Role::Partner), draft(false));
    assert!(matches!(by_other_partner, Err(EngineError::Forbidden(_))));

    let by_admin = service.create(&Actor::new("root", Role::SuperAdmin), draft(false));
    assert!(by_admin.is_ok());
}

#[test]
fn create_validates_terms() {
    let (service, _, _) = build_service();

    let mut blank = draft(false);
    blank.title = "   ".to_string();
    let mut free = draft(false);
    free.amount = 0;
    let mut foreign = draft(false);
    foreign.currency = "EUR".to_string();
    let mut overdue = draft(false);
    overdue.due_date = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");

    for payload in [blank, free, foreign, overdue] {
        let outcome = service.create(&partner(), payload);
        assert!(
            matches!(outcome, Err(EngineError::Validation(_))),
            "expected validation error, got {outcome:?}"
        );
    }
}

#[test]
fn lifecycle_without_gate_reaches_completion() {
    let (service, _, _) = build_service();
    let submitted = submitted_milestone(&service, false);
    assert_eq!(submitted.escrow_status, EscrowStatus::Held);

    let completed = advance(
        &service,
        &submitted.id,
        &[
            (partner(), MilestoneAction::OpenReview),
            (partner(), MilestoneAction::ApproveRelease),
            (partner(), MilestoneAction::MarkComplete),
        ],
    );

    assert_eq!(completed.status, MilestoneStatus::Completed);
    assert_eq!(completed.escrow_status, EscrowStatus::Released);
}

#[test]
fn supervisor_gate_routes_review_through_the_supervisor() {
    let (service, _, _) = build_service();
    let gated = submitted_milestone(&service, true);

    let in_review = advance(&service, &gated.id, &[(partner(), MilestoneAction::OpenReview)]);
    assert_eq!(in_review.status, MilestoneStatus::SupervisorReview);

    let owner_skip = service.approve_and_release(&partner(), &gated.id, None);
    assert!(matches!(owner_skip, Err(EngineError::InvalidTransition { .. })));

    let approved = service
        .perform(&supervisor(), &gated.id, MilestoneAction::SupervisorApprove, None, None)
        .expect("supervisor approves");
    assert_eq!(approved.status, MilestoneStatus::PartnerReview);

    let ungated = submitted_milestone(&service, false);
    let outcome = service.perform(
        &supervisor(),
        &ungated.id,
        MilestoneAction::SupervisorApprove,
        None,
        None,
    );
    assert!(matches!(outcome, Err(EngineError::Forbidden(_))));
}

#[test]
fn release_and_disapprove_round_trip() {
    let (service, _, _) = build_service();
    let submitted = submitted_milestone(&service, false);
    let released = advance(
        &service,
        &submitted.id,
        &[
            (partner(), MilestoneAction::OpenReview),
            (partner(), MilestoneAction::ApproveRelease),
        ],
    );
    assert_eq!(released.escrow_status, EscrowStatus::Released);

    let reverted = service
        .disapprove(&partner(), &released.id, Some(released.version))
        .expect("disapprove succeeds");
    assert_eq!(reverted.status, MilestoneStatus::PartnerReview);
    assert_eq!(reverted.escrow_status, EscrowStatus::Held);

    let again = service
        .approve_and_release(&partner(), &released.id, Some(reverted.version))
        .expect("release succeeds again");
    assert_eq!(again.status, MilestoneStatus::Released);
    assert_eq!(again.escrow_status, EscrowStatus::Released);
}

#[test]
fn completed_milestones_are_locked_down() {
    let (service, _, _) = build_service();
    let submitted = submitted_milestone(&service, false);
    let completed = advance(
        &service,
        &submitted.id,
        &[
            (partner(), MilestoneAction::OpenReview),
            (partner(), MilestoneAction::ApproveRelease),
            (partner(), MilestoneAction::MarkComplete),
        ],
    );

    let changes = service.request_changes(&partner(), &completed.id, None, None);
    assert!(matches!(changes, Err(EngineError::InvalidTransition { .. })));

    let resubmit = service.perform(&builder(), &completed.id, MilestoneAction::Submit, None, None);
    assert!(matches!(resubmit, Err(EngineError::InvalidTransition { .. })));

    let edit = service.edit(&partner(), &completed.id, MilestoneChanges::default(), None);
    assert_eq!(edit, Err(EngineError::NotEditable { state: "COMPLETED" }));

    let reopened = service
        .unmark_as_complete(&partner(), &completed.id, None)
        .expect("owner may unmark");
    assert_eq!(reopened.status, MilestoneStatus::Released);
    let recompleted = service
        .mark_as_complete(&partner(), &completed.id, None)
        .expect("owner may mark again");
    assert_eq!(recompleted.status, MilestoneStatus::Completed);
}

#[test]
fn edits_stop_once_work_starts() {
    let (service, _, _) = build_service();
    let created = service
        .create(&partner(), draft(false))
        .expect("create succeeds");

    let funded = advance(
        &service,
        &created.id,
        &[
            (partner(), MilestoneAction::Draft),
            (builder(), MilestoneAction::AcceptTerms),
            (partner(), MilestoneAction::Finalize),
            (partner(), MilestoneAction::Fund),
        ],
    );
    let edited = service
        .edit(
            &partner(),
            &created.id,
            MilestoneChanges {
                title: Some("Onboarding and login".to_string()),
                amount: Some(300_000),
                ..MilestoneChanges::default()
            },
            Some(funded.version),
        )
        .expect("funded milestones are still editable");
    assert_eq!(edited.title, "Onboarding and login");
    assert_eq!(edited.amount, 300_000);
    assert_eq!(edited.version, funded.version + 1);

    advance(&service, &created.id, &[(builder(), MilestoneAction::Start)]);

    let edit = service.edit(&partner(), &created.id, MilestoneChanges::default(), None);
    assert_eq!(edit, Err(EngineError::NotEditable { state: "IN_PROGRESS" }));
    let delete = service.delete(&partner(), &created.id, None);
    assert_eq!(delete, Err(EngineError::NotEditable { state: "IN_PROGRESS" }));
}

#[test]
fn edit_validates_changed_fields() {
    let (service, _, _) = build_service();
    let created = service
        .create(&partner(), draft(false))
        .expect("create succeeds");

    let outcome = service.edit(
        &partner(),
        &created.id,
        MilestoneChanges {
            currency: Some("GBP".to_string()),
            ..MilestoneChanges::default()
        },
        None,
    );

    assert!(matches!(outcome, Err(EngineError::Validation(_))));
    assert_eq!(service.get(&created.id), Ok(created));
}

#[test]
fn students_cannot_edit_milestones() {
    let (service, _, _) = build_service();
    let created = service
        .create(&partner(), draft(false))
        .expect("create succeeds");

    let outcome = service.edit(&builder(), &created.id, MilestoneChanges::default(), None);

    assert!(matches!(outcome, Err(EngineError::Forbidden(_))));
}

#[test]
fn delete_removes_an_unstarted_milestone() {
    let (service, store, _) = build_service();
    let created = service
        .create(&partner(), draft(false))
        .expect("create succeeds");

    let removed = service
        .delete(&partner(), &created.id, Some(0))
        .expect("delete succeeds");

    assert_eq!(removed.id, created.id);
    assert_eq!(MilestoneRepository::fetch(store.as_ref(), &created.id), Ok(None));
    assert!(matches!(service.get(&created.id), Err(EngineError::NotFound(_))));
}

#[test]
fn request_changes_notifies_assigned_students() {
    let (service, _, publisher) = build_service();
    let submitted = submitted_milestone(&service, false);
    advance(&service, &submitted.id, &[(partner(), MilestoneAction::OpenReview)]);

    let returned = service
        .request_changes(
            &partner(),
            &submitted.id,
            Some("Password reset screen missing".to_string()),
            None,
        )
        .expect("request changes succeeds");
    assert_eq!(returned.status, MilestoneStatus::ChangesRequested);
    assert_eq!(returned.escrow_status, EscrowStatus::Held);

    let events: Vec<_> = publisher
        .events()
        .into_iter()
        .filter(|event| event.kind == EventKind::MilestoneChangesRequested)
        .collect();
    let recipients: Vec<&str> = events.iter().map(|event| event.recipient.0.as_str()).collect();
    assert_eq!(recipients, vec!["stu-1", "stu-2"]);
    assert_eq!(
        events[0].details.get("reason").map(String::as_str),
        Some("Password reset screen missing")
    );

    let resumed = service
        .perform(&builder(), &submitted.id, MilestoneAction::Resume, None, None)
        .expect("students may resume");
    assert_eq!(resumed.status, MilestoneStatus::InProgress);
}

#[test]
fn failed_writes_leave_the_milestone_alone_and_send_nothing() {
    let (service, store, publisher) = build_service();
    let submitted = submitted_milestone(&service, false);
    let in_review = advance(&service, &submitted.id, &[(partner(), MilestoneAction::OpenReview)]);
    let delivered_before = publisher.events().len();
    let (failing, failing_publisher) = failing_service_on(store.clone());

    let changes = failing.request_changes(
        &partner(),
        &in_review.id,
        Some("Missing tests".to_string()),
        Some(in_review.version),
    );
    assert!(matches!(changes, Err(EngineError::Unavailable(_))));

    let release = failing.approve_and_release(&partner(), &in_review.id, Some(in_review.version));
    assert!(matches!(release, Err(EngineError::Unavailable(_))));

    let dispute =
        failing.raise_dispute(&partner(), &in_review.id, "Late delivery".to_string(), None);
    assert!(matches!(dispute, Err(EngineError::Unavailable(_))));

    assert!(failing_publisher.events().is_empty());
    assert_eq!(publisher.events().len(), delivered_before);
    let stored = MilestoneRepository::fetch(store.as_ref(), &in_review.id)
        .expect("fetch succeeds")
        .expect("milestone present");
    assert_eq!(stored.status, MilestoneStatus::PartnerReview);
    assert_eq!(stored.escrow_status, EscrowStatus::Held);
    assert_eq!(stored.version, in_review.version);
    assert!(stored.disputes.is_empty());
}

#[test]
fn release_notifies_students_with_the_amount() {
    let (service, _, publisher) = build_service();
    let submitted = submitted_milestone(&service, false);
    advance(
        &service,
        &submitted.id,
        &[
            (partner(), MilestoneAction::OpenReview),
            (partner(), MilestoneAction::ApproveRelease),
        ],
    );

    let released: Vec<_> = publisher
        .events()
        .into_iter()
        .filter(|event| event.kind == EventKind::MilestoneReleased)
        .collect();

    assert_eq!(released.len(), 2);
    assert_eq!(
        released[0].details.get("amount").map(String::as_str),
        Some("250000 USD")
    );
}

#[test]
fn disputes_are_recorded_without_moving_the_status() {
    let (service, _, publisher) = build_service();
    let submitted = submitted_milestone(&service, false);

    let missing_reason = service.raise_dispute(&partner(), &submitted.id, "  ".to_string(), None);
    assert!(matches!(missing_reason, Err(EngineError::Validation(_))));

    let by_student = service.raise_dispute(&builder(), &submitted.id, "late".to_string(), None);
    assert!(matches!(by_student, Err(EngineError::Forbidden(_))));

    let disputed = service
        .raise_dispute(&partner(), &submitted.id, "Scope disagreement".to_string(), None)
        .expect("dispute recorded");
    assert_eq!(disputed.status, MilestoneStatus::Submitted);
    assert_eq!(disputed.disputes.len(), 1);
    assert_eq!(disputed.disputes[0].raised_in, MilestoneStatus::Submitted);
    assert_eq!(disputed.version, submitted.version + 1);

    let recipients: Vec<UserId> = publisher
        .events()
        .into_iter()
        .filter(|event| event.kind == EventKind::MilestoneDisputed)
        .map(|event| event.recipient)
        .collect();
    assert_eq!(
        recipients,
        vec![
            UserId("sup-7".to_string()),
            UserId("stu-1".to_string()),
            UserId("stu-2".to_string()),
        ]
    );
}

#[test]
fn students_need_an_assigned_application() {
    let (service, _, _) = build_service_on(store(false));
    let created = service
        .create(&partner(), draft(false))
        .expect("create succeeds");
    service
        .perform(&partner(), &created.id, MilestoneAction::Draft, None, None)
        .expect("draft succeeds");

    let outcome =
        service.perform(&builder(), &created.id, MilestoneAction::AcceptTerms, None, None);

    assert!(matches!(outcome, Err(EngineError::Forbidden(_))));
}

#[test]
fn stale_versions_are_conflicts() {
    let (service, _, _) = build_service();
    let created = service
        .create(&partner(), draft(false))
        .expect("create succeeds");

    let outcome = service.perform(&partner(), &created.id, MilestoneAction::Draft, None, Some(4));

    assert!(matches!(outcome, Err(EngineError::Conflict(_))));
    assert_eq!(
        service.get(&created.id).map(|milestone| milestone.status),
        Ok(MilestoneStatus::Proposed)
    );
}

#[test]
fn edit_and_delete_are_not_lifecycle_actions() {
    let (service, _, _) = build_service();
    let created = service
        .create(&partner(), draft(false))
        .expect("create succeeds");

    let outcome = service.perform(&partner(), &created.id, MilestoneAction::Edit, None, None);

    assert!(matches!(outcome, Err(EngineError::Validation(_))));
}

#[test]
fn allowed_actions_follow_party_and_state() {
    let (service, _, _) = build_service();
    let created = service
        .create(&partner(), draft(false))
        .expect("create succeeds");
    let funded = advance(
        &service,
        &created.id,
        &[
            (partner(), MilestoneAction::Draft),
            (builder(), MilestoneAction::AcceptTerms),
            (partner(), MilestoneAction::Finalize),
            (partner(), MilestoneAction::Fund),
        ],
    );

    assert_eq!(
        service.allowed_actions(&builder(), &funded.id),
        Ok(vec![MilestoneAction::Start])
    );
    assert_eq!(
        service.allowed_actions(&partner(), &funded.id),
        Ok(vec![MilestoneAction::Edit, MilestoneAction::Delete])
    );
    assert_eq!(service.allowed_actions(&supervisor(), &funded.id), Ok(Vec::new()));

    let view = service
        .view_for(&builder(), &funded.id)
        .expect("view renders");
    assert_eq!(view.allowed_actions, Some(vec!["start"]));
    assert_eq!(view.escrow_status, "HELD");
}

#[test]
fn project_listing_orders_by_due_date() {
    let (service, _, _) = build_service();
    let later = service
        .create(&partner(), draft(false))
        .expect("create succeeds");
    let mut early = draft(false);
    early.due_date = NaiveDate::from_ymd_opt(2026, 3, 20).expect("valid date");
    let sooner = service.create(&partner(), early).expect("create succeeds");

    let listed: Vec<_> = service
        .for_project(&project().id)
        .expect("listing succeeds")
        .into_iter()
        .map(|milestone| milestone.id)
        .collect();

    assert_eq!(listed, vec![sooner.id, later.id]);
}
