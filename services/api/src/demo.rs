use crate::infra::{build_services, demo_directory, OutboxNotifier, Services};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tna::config::DEFAULT_NOTIFY_QUEUE;
use tna::error::AppError;
use tna::workflows::directory::{DirectoryUser, InMemoryDirectory, Role, UserId};
use tna::workflows::notifications::{channel, NotificationDispatcher};
use tna::workflows::survey::SurveyDraft;
use tna::workflows::training::{Decision, HodScope, Stage, TrainingNeedPayload};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// HOD visibility: `any` or `department`
    #[arg(long, default_value_t = HodScope::Any)]
    pub(crate) hod_scope: HodScope,
    /// Skip the feedback survey portion of the demo.
    #[arg(long)]
    pub(crate) skip_survey: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CheckDirectoryArgs {
    /// JSON array of directory users
    pub(crate) path: PathBuf,
}

fn sample_payload() -> TrainingNeedPayload {
    [
        ("generalSkills", "Data analysis"),
        ("toolsTraining", "Power BI"),
        ("softSkills", "Stakeholder communication"),
        ("confidenceLevel", "3"),
        ("careerGoals", "Lead the reporting team"),
        ("trainingFormat", "Instructor-led"),
        ("trainingDuration", "3 days"),
        ("trainingFrequency", "Twice a year"),
    ]
    .into_iter()
    .collect()
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let directory = Arc::new(demo_directory()?);
    let outbox = Arc::new(OutboxNotifier::default());
    let (publisher, receiver) = channel(DEFAULT_NOTIFY_QUEUE);
    let dispatcher = NotificationDispatcher::new(directory.clone(), outbox.clone()).spawn(receiver);
    let Services { training, surveys } = build_services(directory, publisher, args.hod_scope);

    println!("Training needs analysis demo (HOD scope: {})", args.hod_scope);

    println!("\nEmployee request through the full chain");
    let employee = UserId::new("emp-it-1");
    let receipt = match training.submit(&employee, sample_payload()) {
        Ok(receipt) => receipt,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "  {} submitted by {employee}: {}",
        receipt.request_number, receipt.status
    );

    let chain = [
        ("mgr-it", Decision::Approve),
        ("hod-it", Decision::Approve),
        ("hr-1", Decision::Approve),
        ("admin-1", Decision::Reject),
    ];
    for (reviewer, decision) in chain {
        match training.decide(&UserId::new(reviewer), &receipt.request_number.0, decision) {
            Ok(decided) => println!(
                "  {:<8} {:<7} at {:<7} -> {}",
                reviewer,
                decision.label(),
                decided.stage.label(),
                decided.status
            ),
            Err(err) => println!("  {reviewer} could not decide: {err}"),
        }
    }

    println!("\nGuards");
    match training.decide(
        &UserId::new("admin-1"),
        &receipt.request_number.0,
        Decision::Approve,
    ) {
        Ok(decided) => println!("  Unexpected transition to {}", decided.status),
        Err(err) => println!("  Repeat decision refused ({:?}): {err}", err.kind()),
    }
    match training.decide(&employee, &receipt.request_number.0, Decision::Approve) {
        Ok(decided) => println!("  Unexpected transition to {}", decided.status),
        Err(err) => println!("  Employee decision refused ({:?}): {err}", err.kind()),
    }

    match training.lookup(&UserId::new("admin-1"), &receipt.request_id.0) {
        Ok(record) => {
            println!("\nAudit trail of {}", record.request_number);
            for stage in Stage::ALL {
                let reviewer = record
                    .audit
                    .reviewer(stage)
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {:<7} {reviewer}", stage.label());
            }
        }
        Err(err) => println!("  Lookup failed: {err}"),
    }

    println!("\nManager request skips manager review");
    match training.submit(&UserId::new("mgr-fin"), sample_payload()) {
        Ok(receipt) => {
            println!("  {} submitted: {}", receipt.request_number, receipt.status);
            if let Ok(decided) = training.decide(
                &UserId::new("hod-fin"),
                &receipt.request_id.0,
                Decision::Approve,
            ) {
                println!("  hod-fin approved -> {}", decided.status);
            }
            match training.pending_reviews(&UserId::new("hr-1")) {
                Ok(queue) => println!("  HR queue now holds {} request(s)", queue.len()),
                Err(err) => println!("  HR queue unavailable: {err}"),
            }
        }
        Err(err) => println!("  Submission rejected: {err}"),
    }

    if !args.skip_survey {
        println!("\nFeedback survey");
        let admin = UserId::new("admin-1");
        let draft = SurveyDraft {
            title: "Power BI workshop".to_string(),
            questions: vec![
                "How relevant was the content?".to_string(),
                "What would you change?".to_string(),
            ],
            assigned_to: vec![employee.clone(), UserId::new("emp-fin-1")],
        };
        match surveys.create(&admin, draft) {
            Ok(survey) => {
                println!(
                    "  {} \"{}\" assigned to {} user(s)",
                    survey.id,
                    survey.title,
                    survey.assigned_to.len()
                );
                let answers = vec!["Very relevant".to_string(), "More exercises".to_string()];
                if let Err(err) = surveys.respond(&employee, &survey.id, answers) {
                    println!("  Response rejected: {err}");
                }
                if let Ok(inbox) = surveys.assigned_with_status(&UserId::new("emp-fin-1")) {
                    for entry in inbox {
                        println!("  emp-fin-1 inbox: {} ({:?})", entry.title, entry.status);
                    }
                }
                if let Ok(created) = surveys.created(&admin) {
                    for entry in created {
                        println!(
                            "  {} responses: {}/{}",
                            entry.title,
                            entry.response_count,
                            entry.assigned_to.len()
                        );
                    }
                }
            }
            Err(err) => println!("  Survey not created: {err}"),
        }
    }

    drop(training);
    drop(surveys);
    match dispatcher.await {
        Ok(summary) => println!(
            "\nNotifications: {} delivered, {} skipped, {} failed",
            summary.delivered, summary.skipped, summary.failed
        ),
        Err(err) => println!("\nNotification dispatcher aborted: {err}"),
    }
    for mail in outbox.sent() {
        println!("  to {:<22} {}", mail.to, mail.subject);
    }

    Ok(())
}

pub(crate) fn run_check_directory(args: CheckDirectoryArgs) -> Result<(), AppError> {
    let directory = InMemoryDirectory::from_path(&args.path)?;
    let users = directory.users()?;

    let mut by_role: BTreeMap<&'static str, usize> = BTreeMap::new();
    for user in &users {
        *by_role.entry(user.role.label()).or_default() += 1;
    }

    println!("{}: {} user(s)", args.path.display(), users.len());
    for (role, count) in &by_role {
        println!("  {role:<9} {count}");
    }

    let findings = directory_findings(&users);
    if findings.is_empty() {
        println!("No problems found");
    } else {
        println!("{} problem(s):", findings.len());
        for finding in findings {
            println!("  - {finding}");
        }
    }
    Ok(())
}

/// Gaps that would make submissions fail or notifications go nowhere.
pub(crate) fn directory_findings(users: &[DirectoryUser]) -> Vec<String> {
    let known: BTreeMap<&UserId, &DirectoryUser> = users.iter().map(|user| (&user.id, user)).collect();
    let mut findings = Vec::new();

    for user in users {
        if user.role == Role::Employee {
            match &user.manager {
                None => findings.push(format!("{} has no manager and cannot submit", user.id)),
                Some(manager) => match known.get(manager) {
                    None => findings.push(format!(
                        "{} points at unknown manager {manager} and cannot submit",
                        user.id
                    )),
                    Some(found) if found.role != Role::Manager => findings.push(format!(
                        "{} reports to {manager}, who is {} rather than a manager",
                        user.id, found.role
                    )),
                    Some(_) => {}
                },
            }
        }
        if user.email.is_none() {
            findings.push(format!("{} has no email and receives no notifications", user.id));
        }
    }

    for role in [Role::Hod, Role::Hr, Role::Admin] {
        if !users.iter().any(|user| user.role == role) {
            findings.push(format!("no {role} in the directory; that stage has nobody to notify"));
        }
    }
    findings
}
