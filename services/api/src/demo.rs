use crate::infra::{build_services, sample_project, LoggingPublisher, PinnedClock};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use project_escrow::config::{EngineConfig, RejectionPolicy};
use project_escrow::error::AppError;
use project_escrow::workflows::applications::{
    ApplicantType, ApplicationRecord, ApplicationSubmission, ScoreSignals,
};
use project_escrow::workflows::milestones::{Milestone, MilestoneAction, MilestoneDraft};
use project_escrow::workflows::{Actor, EngineError, InMemoryStore, Role, UserId};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date the scenario runs on (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Route milestone reviews through the project supervisor first.
    #[arg(long)]
    pub(crate) supervisor_gate: bool,
    /// Refuse rejections that would leave the project without candidates.
    #[arg(long)]
    pub(crate) protect_last_candidate: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        supervisor_gate,
        protect_last_candidate,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let project = sample_project(today);
    let store = Arc::new(InMemoryStore::with_projects([project.clone()]));
    let events = Arc::new(LoggingPublisher::recording());
    let config = EngineConfig {
        rejection_policy: if protect_last_candidate {
            RejectionPolicy::ProtectLastCandidate
        } else {
            RejectionPolicy::AllowLastCandidate
        },
        offer_window_hours: Some(72),
        ..EngineConfig::default()
    };
    let (applications, milestones) = build_services(
        store,
        events.clone(),
        config,
        Arc::new(PinnedClock::at_morning_of(today)),
    );

    let partner = Actor::new(project.owner_partner_id.0.clone(), Role::Partner);
    let supervisor = Actor::new("sup-rivera", Role::Supervisor);

    println!("Screening demo for {} ({})", project.id.0, project.course);
    let submissions = [
        (&["stu-avery"][..], 72.0, 0.92, 64.0),
        (&["stu-blake", "stu-casey"][..], 88.0, 0.85, 81.0),
        (&["stu-devon"][..], 61.0, 0.97, 58.0),
    ];
    let mut submitted = Vec::new();
    for (students, skill_match, on_time_rate, portfolio_score) in submissions {
        let actor = Actor::new(students[0], Role::Student);
        let record = applications.submit(
            &actor,
            ApplicationSubmission {
                project_id: project.id.clone(),
                applicant_type: if students.len() > 1 {
                    ApplicantType::Group
                } else {
                    ApplicantType::Individual
                },
                student_ids: students.iter().map(|id| UserId((*id).to_string())).collect(),
                statement: String::new(),
                attachments: Vec::new(),
                signals: ScoreSignals {
                    skill_match,
                    rating_score: 75.0,
                    on_time_rate,
                    rework_rate: 0.1,
                    portfolio_score,
                },
            },
        )?;
        submitted.push(record);
    }

    println!("Ranked applications:");
    for record in applications.ranked(&project.id)? {
        print_application("  ", &record);
    }

    let best = applications
        .default_candidate(&project.id)?
        .ok_or_else(|| EngineError::InvariantViolation("no candidate to assign".to_string()))?;
    applications.shortlist(&partner, &best.id, Some(best.version))?;
    let assigned = applications.accept(&partner, &best.id, None)?;
    println!("\nAccepted {}:", assigned.id.0);
    print_application("  ", &assigned);

    let runner_up = submitted
        .iter()
        .find(|record| record.id != assigned.id)
        .ok_or_else(|| EngineError::InvariantViolation("no runner-up".to_string()))?;
    match applications.accept(&supervisor, &runner_up.id, None) {
        Ok(_) => println!("  unexpected: second accept went through"),
        Err(err) => println!("  second accept refused: {} ({})", err, err.code()),
    }

    let swap = applications.reassign(
        &partner,
        &project.id,
        &runner_up.id,
        Some(&assigned.id),
        Some(runner_up.version),
    )?;
    println!("\nReassigned project:");
    print_application("  now assigned ", &swap.assigned);
    if let Some(displaced) = &swap.displaced {
        print_application("  displaced    ", displaced);
    }
    let team = &swap.assigned.student_ids;
    let lead = Actor::new(team[0].0.clone(), Role::Student);

    println!("\nEscrow demo (supervisor gate {})", if supervisor_gate { "on" } else { "off" });
    let milestone = milestones.create(
        &partner,
        MilestoneDraft {
            project_id: project.id.clone(),
            title: "Onboarding flow".to_string(),
            scope: "Sign-up, verification, and profile screens".to_string(),
            acceptance_criteria: "Screens pass the agreed UI review".to_string(),
            due_date: today + Duration::days(30),
            amount: 250_000,
            currency: project.currency.clone(),
            supervisor_gate,
        },
    )?;
    print_milestone(&milestone);

    let mut steps = vec![
        (&partner, MilestoneAction::Draft, None),
        (&lead, MilestoneAction::AcceptTerms, None),
        (&partner, MilestoneAction::Finalize, None),
        (&partner, MilestoneAction::Fund, None),
        (&lead, MilestoneAction::Start, None),
        (&lead, MilestoneAction::Submit, None),
        (&partner, MilestoneAction::OpenReview, None),
    ];
    if supervisor_gate {
        steps.push((&supervisor, MilestoneAction::SupervisorApprove, None));
    }
    steps.extend([
        (
            &partner,
            MilestoneAction::RequestChanges,
            Some("Password reset screen is missing".to_string()),
        ),
        (&lead, MilestoneAction::Submit, None),
        (&partner, MilestoneAction::OpenReview, None),
    ]);
    if supervisor_gate {
        steps.push((&supervisor, MilestoneAction::SupervisorApprove, None));
    }
    steps.extend([
        (&partner, MilestoneAction::ApproveRelease, None),
        (&partner, MilestoneAction::Disapprove, None),
        (&partner, MilestoneAction::ApproveRelease, None),
        (&partner, MilestoneAction::MarkComplete, None),
    ]);

    let mut current = milestone;
    for (actor, action, reason) in steps {
        current = milestones.perform(actor, &current.id, action, reason, Some(current.version))?;
        println!("  {:<16} by {:<14}", action.label(), actor.id.0);
        print_milestone(&current);
    }

    match milestones.edit(&partner, &current.id, Default::default(), None) {
        Ok(_) => println!("  unexpected: completed milestone accepted an edit"),
        Err(err) => println!("  edit after completion refused: {} ({})", err, err.code()),
    }

    println!("\nNotifications queued: {}", events.events().len());
    for event in events.events() {
        println!("  - {} -> {}", event.kind.template(), event.recipient.0);
    }

    Ok(())
}

fn print_application(prefix: &str, record: &ApplicationRecord) {
    let students: Vec<&str> = record.student_ids.iter().map(|id| id.0.as_str()).collect();
    println!(
        "{prefix}{} [{}] score {:.1} | {}",
        record.id.0,
        record.status.label(),
        record.score.final_score,
        students.join(", ")
    );
}

fn print_milestone(milestone: &Milestone) {
    println!(
        "    {} {} | escrow {} | v{}",
        milestone.id.0,
        milestone.status.label(),
        milestone.escrow_status.label(),
        milestone.version
    );
}
