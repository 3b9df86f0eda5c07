use super::common::*;
use crate::workflows::directory::Role;
use crate::workflows::notifications::WorkflowEvent;
use crate::workflows::training::domain::{Decision, Stage, TrainingStatus};
use crate::workflows::training::memory::InMemoryTrainingNeedRepository;
use crate::workflows::training::repository::{RepositoryError, TrainingNeedRepository};
use crate::workflows::training::service::{TrainingRequestService, WorkflowError};
use crate::workflows::training::visibility::HodScope;
use crate::workflows::ErrorKind;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn submission_status_follows_submitter_role() {
    let (service, repository, _) = build_service();

    let cases = [
        ("emp-1", TrainingStatus::PENDING_MANAGER, Some("mgr-1")),
        ("mgr-1", TrainingStatus::PENDING_HOD, Some("hod-it")),
        ("hod-it", TrainingStatus::PENDING_HR, Some("hr-1")),
        ("hr-1", TrainingStatus::PENDING_ADMIN, Some("admin-1")),
    ];

    for (submitter, status, reviewer) in cases {
        let receipt = service
            .submit(&uid(submitter), payload())
            .expect("submission accepted");
        assert_eq!(receipt.status, status, "{submitter}");
        assert_eq!(receipt.next_reviewer, reviewer.map(uid), "{submitter}");

        let stored = repository
            .get_by_id(&receipt.request_id)
            .expect("lookup")
            .expect("persisted");
        assert_eq!(stored.payload, payload());
        let expected_manager = (submitter == "emp-1").then(|| uid("mgr-1"));
        assert_eq!(stored.assigned_manager, expected_manager, "{submitter}");
        assert!(stored.audit.decided_stages().is_empty());
    }
}

#[test]
fn submission_copies_department_and_notifies_reviewer() {
    let (service, repository, events) = build_service();

    let receipt = service.submit(&uid("emp-2"), payload()).expect("accepted");
    let stored = repository
        .get_by_request_number(&receipt.request_number)
        .expect("lookup")
        .expect("persisted");
    assert_eq!(stored.department.as_ref().map(|d| d.0.as_str()), Some("Finance"));
    assert!(receipt.request_number.0.starts_with("TRN-"));

    match events.events().as_slice() {
        [WorkflowEvent::RequestSubmitted { notify, status, .. }] => {
            assert_eq!(notify, &uid("mgr-2"));
            assert_eq!(*status, TrainingStatus::PENDING_MANAGER);
        }
        other => panic!("expected one submission event, got {other:?}"),
    }
}

#[test]
fn employee_without_manager_is_rejected_and_nothing_is_stored() {
    let (service, repository, events) = build_service();

    match service.submit(&uid("emp-orphan"), payload()) {
        Err(WorkflowError::Validation(message)) => assert!(message.contains("no manager")),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(repository.is_empty().expect("store readable"));
    assert!(events.events().is_empty());
}

#[test]
fn employee_whose_manager_is_missing_from_directory_is_rejected() {
    let (service, repository, _) = build_service();

    let err = service
        .submit(&uid("emp-dangling"), payload())
        .expect_err("dangling manager");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(repository.is_empty().expect("store readable"));
}

#[test]
fn employee_whose_manager_link_is_not_a_manager_is_rejected() {
    let directory = directory_with([
        user("emp-misrouted", Role::Employee, Some("IT"), Some("emp-1")),
        user("emp-to-hr", Role::Employee, Some("IT"), Some("hr-1")),
    ]);
    let repository = Arc::new(InMemoryTrainingNeedRepository::default());
    let events = Arc::new(RecordingPublisher::default());
    let service =
        TrainingRequestService::new(repository.clone(), Arc::new(directory), events.clone());

    for submitter in ["emp-misrouted", "emp-to-hr"] {
        match service.submit(&uid(submitter), payload()) {
            Err(WorkflowError::Validation(message)) => {
                assert!(message.contains("not a manager"), "{submitter}: {message}")
            }
            other => panic!("{submitter}: expected validation error, got {other:?}"),
        }
    }
    assert!(repository.is_empty().expect("store readable"));
    assert!(events.events().is_empty());
}

#[test]
fn scoped_hod_chain_requires_submitter_department() {
    let directory = directory_with([
        user("mgr-floating", Role::Manager, None, None),
        user("emp-floating", Role::Employee, None, Some("mgr-1")),
    ]);
    let repository = Arc::new(InMemoryTrainingNeedRepository::default());
    let scoped = TrainingRequestService::new(
        repository.clone(),
        Arc::new(directory.clone()),
        Arc::new(RecordingPublisher::default()),
    )
    .with_hod_scope(HodScope::Department);

    for submitter in ["mgr-floating", "emp-floating"] {
        let err = scoped
            .submit(&uid(submitter), payload())
            .expect_err("no department to route to");
        assert_eq!(err.kind(), ErrorKind::Validation, "{submitter}");
    }
    assert!(repository.is_empty().expect("store readable"));

    let receipt = scoped
        .submit(&uid("hod-it"), payload())
        .expect("hod requests skip the hod stage");
    assert_eq!(receipt.status, TrainingStatus::PENDING_HR);

    let unscoped = TrainingRequestService::new(
        Arc::new(InMemoryTrainingNeedRepository::default()),
        Arc::new(directory),
        Arc::new(RecordingPublisher::default()),
    );
    let receipt = unscoped
        .submit(&uid("mgr-floating"), payload())
        .expect("any hod can pick it up");
    assert_eq!(receipt.status, TrainingStatus::PENDING_HOD);
}

#[test]
fn admins_and_unknown_callers_cannot_submit() {
    let (service, repository, _) = build_service();

    let admin = service
        .submit(&uid("admin-1"), payload())
        .expect_err("admins do not submit");
    assert_eq!(admin.kind(), ErrorKind::Forbidden);

    let stranger = service
        .submit(&uid("nobody"), payload())
        .expect_err("unknown caller");
    assert_eq!(stranger.kind(), ErrorKind::Forbidden);
    assert!(repository.is_empty().expect("store readable"));
}

#[test]
fn payload_cannot_override_workflow_fields() {
    let (service, repository, _) = build_service();
    let mut payload = payload();
    payload
        .0
        .insert("status".to_string(), "Approved_By_Admin".to_string());

    let err = service
        .submit(&uid("emp-1"), payload)
        .expect_err("reserved key");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(repository.is_empty().expect("store readable"));
}

#[test]
fn only_the_assigned_manager_may_decide() {
    let (service, repository, _) = build_service();
    let receipt = service.submit(&uid("emp-1"), payload()).expect("accepted");

    let err = service
        .decide(&uid("mgr-2"), &receipt.request_id.0, Decision::Approve)
        .expect_err("not assigned");
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let stored = repository
        .get_by_id(&receipt.request_id)
        .expect("lookup")
        .expect("present");
    assert_eq!(stored.status, TrainingStatus::PENDING_MANAGER);
    assert!(stored.audit.reviewer(Stage::Manager).is_none());
}

#[test]
fn employees_cannot_decide() {
    let (service, _, _) = build_service();
    let receipt = service.submit(&uid("emp-1"), payload()).expect("accepted");

    let err = service
        .decide(&uid("emp-2"), &receipt.request_id.0, Decision::Approve)
        .expect_err("employees do not review");
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[test]
fn deciding_an_unknown_request_is_not_found() {
    let (service, _, _) = build_service();
    match service.decide(&uid("hr-1"), "tn-999999", Decision::Approve) {
        Err(WorkflowError::NotFound(key)) => assert_eq!(key, "tn-999999"),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn hod_cannot_decide_a_request_waiting_on_hr() {
    let (service, repository, _) = build_service();
    let receipt = service.submit(&uid("hod-it"), payload()).expect("accepted");
    assert_eq!(receipt.status, TrainingStatus::PENDING_HR);

    match service.decide(&uid("hod-fin"), &receipt.request_id.0, Decision::Approve) {
        Err(WorkflowError::Conflict { stage, actual, .. }) => {
            assert_eq!(stage, Stage::Hod);
            assert_eq!(actual, TrainingStatus::PENDING_HR);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    let stored = repository
        .get_by_id(&receipt.request_id)
        .expect("lookup")
        .expect("present");
    assert_eq!(stored.status, TrainingStatus::PENDING_HR);
}

#[test]
fn terminal_requests_refuse_every_reviewer() {
    let (service, _, _) = build_service();
    let receipt = service.submit(&uid("emp-1"), payload()).expect("accepted");
    let decided = service
        .decide(&uid("mgr-1"), &receipt.request_id.0, Decision::Reject)
        .expect("manager rejects");
    assert_eq!(decided.status, TrainingStatus::REJECTED_BY_MANAGER);

    for reviewer in ["mgr-1", "hod-it", "hr-1", "admin-1"] {
        for decision in [Decision::Approve, Decision::Reject] {
            let err = service
                .decide(&uid(reviewer), &receipt.request_id.0, decision)
                .expect_err("terminal request");
            assert_eq!(err.kind(), ErrorKind::Conflict, "{reviewer}");
        }
    }
}

#[test]
fn repeated_decision_is_a_conflict_and_keeps_first_reviewer() {
    let (service, repository, _) = build_service();
    let receipt = service.submit(&uid("mgr-1"), payload()).expect("accepted");

    service
        .decide(&uid("hod-it"), &receipt.request_number.0, Decision::Approve)
        .expect("first decision");
    let err = service
        .decide(&uid("hod-fin"), &receipt.request_number.0, Decision::Reject)
        .expect_err("second decision");
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let stored = repository
        .get_by_id(&receipt.request_id)
        .expect("lookup")
        .expect("present");
    assert_eq!(stored.status, TrainingStatus::APPROVED_BY_HOD);
    assert_eq!(stored.audit.reviewer(Stage::Hod), Some(&uid("hod-it")));
}

#[test]
fn concurrent_decisions_produce_one_transition_and_one_conflict() {
    let (service, repository, events) = build_service();
    let service = Arc::new(service);
    let receipt = service.submit(&uid("mgr-1"), payload()).expect("accepted");

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["hod-it", "hod-fin"]
        .into_iter()
        .map(|reviewer| {
            let service = service.clone();
            let barrier = barrier.clone();
            let key = receipt.request_id.0.clone();
            thread::spawn(move || {
                barrier.wait();
                service.decide(&uid(reviewer), &key, Decision::Approve)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread completes"))
        .collect();
    let successes = results.iter().filter(|result| result.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|result| matches!(result, Err(WorkflowError::Conflict { .. })))
        .count();
    assert_eq!((successes, conflicts), (1, 1));

    let stored = repository
        .get_by_id(&receipt.request_id)
        .expect("lookup")
        .expect("present");
    assert_eq!(stored.status, TrainingStatus::APPROVED_BY_HOD);
    assert!(stored.audit.reviewer(Stage::Hod).is_some());

    let advanced = events
        .events()
        .into_iter()
        .filter(|event| matches!(event, WorkflowEvent::RequestAdvanced { .. }))
        .count();
    assert_eq!(advanced, 1);
}

#[test]
fn decisions_notify_the_submitter() {
    let (service, _, events) = build_service();
    let receipt = service.submit(&uid("emp-1"), payload()).expect("accepted");
    service
        .decide(&uid("mgr-1"), &receipt.request_id.0, Decision::Approve)
        .expect("approved");

    match events.events().last() {
        Some(WorkflowEvent::RequestAdvanced {
            notify,
            reviewer,
            new_status,
            decision,
            ..
        }) => {
            assert_eq!(notify, &uid("emp-1"));
            assert_eq!(reviewer, &uid("mgr-1"));
            assert_eq!(*new_status, TrainingStatus::PENDING_HOD);
            assert_eq!(*decision, Decision::Approve);
        }
        other => panic!("expected advance event, got {other:?}"),
    }
}

#[test]
fn publish_failures_do_not_undo_committed_changes() {
    let repository = Arc::new(InMemoryTrainingNeedRepository::default());
    let service = TrainingRequestService::new(
        repository.clone(),
        Arc::new(directory()),
        Arc::new(ClosedPublisher),
    );

    let receipt = service.submit(&uid("emp-1"), payload()).expect("accepted");
    let decided = service
        .decide(&uid("mgr-1"), &receipt.request_id.0, Decision::Approve)
        .expect("decided");
    assert_eq!(decided.status, TrainingStatus::PENDING_HOD);

    let stored = repository
        .get_by_id(&receipt.request_id)
        .expect("lookup")
        .expect("present");
    assert_eq!(stored.status, TrainingStatus::PENDING_HOD);
}

#[test]
fn number_collisions_are_regenerated() {
    let (service, _, _) = build_service();
    let service = service.with_number_source(ScriptedNumbers::new(vec![
        "TRN-111111-111",
        "TRN-111111-111",
        "TRN-222222-222",
    ]));

    let first = service.submit(&uid("emp-1"), payload()).expect("first");
    let second = service.submit(&uid("emp-1"), payload()).expect("second");
    assert_eq!(first.request_number.0, "TRN-111111-111");
    assert_eq!(second.request_number.0, "TRN-222222-222");
}

#[test]
fn persistent_collisions_surface_as_server_fault() {
    let (service, repository, _) = build_service();
    let service = service.with_number_source(ScriptedNumbers::new(vec!["TRN-333333-333"]));

    service.submit(&uid("emp-1"), payload()).expect("first");
    let err = service
        .submit(&uid("emp-1"), payload())
        .expect_err("numbers exhausted");
    assert!(matches!(
        err,
        WorkflowError::Repository(RepositoryError::DuplicateRequestNumber(_))
    ));
    assert_eq!(err.kind(), ErrorKind::ServerFault);
    assert_eq!(repository.len().expect("store readable"), 1);
}

#[test]
fn store_outage_is_a_server_fault() {
    let service = TrainingRequestService::new(
        Arc::new(UnavailableRepository),
        Arc::new(directory()),
        Arc::new(RecordingPublisher::default()),
    );

    let submit = service
        .submit(&uid("emp-1"), payload())
        .expect_err("store offline");
    assert_eq!(submit.kind(), ErrorKind::ServerFault);
    let list = service.list_visible(&uid("hr-1")).expect_err("store offline");
    assert_eq!(list.kind(), ErrorKind::ServerFault);
}

#[test]
fn any_hod_may_decide_unless_scoped_to_department() {
    let (service, _, _) = build_service();
    let it_request = service.submit(&uid("mgr-1"), payload()).expect("accepted");
    let decided = service
        .decide(&uid("hod-fin"), &it_request.request_id.0, Decision::Approve)
        .expect("cross-department hod decides");
    assert_eq!(decided.status, TrainingStatus::APPROVED_BY_HOD);

    let (service, _, _) = build_service();
    let service = service.with_hod_scope(HodScope::Department);
    let it_request = service.submit(&uid("mgr-1"), payload()).expect("accepted");
    let err = service
        .decide(&uid("hod-fin"), &it_request.request_id.0, Decision::Approve)
        .expect_err("scoped hod");
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    service
        .decide(&uid("hod-it"), &it_request.request_id.0, Decision::Approve)
        .expect("same-department hod decides");
}

#[test]
fn hr_and_admin_stages_check_role_only() {
    let (service, _, _) = build_service();
    let receipt = service.submit(&uid("hod-it"), payload()).expect("accepted");

    let hr = service
        .decide(&uid("hr-1"), &receipt.request_id.0, Decision::Approve)
        .expect("hr decides");
    assert_eq!(hr.status, TrainingStatus::PENDING_ADMIN);
    let admin = service
        .decide(&uid("admin-1"), &receipt.request_id.0, Decision::Approve)
        .expect("admin decides");
    assert_eq!(admin.status, TrainingStatus::APPROVED_BY_ADMIN);
}

#[test]
fn listings_follow_role_visibility() {
    let (service, _, _) = build_service();
    let from_employee = service.submit(&uid("emp-1"), payload()).expect("accepted");
    let from_manager = service.submit(&uid("mgr-2"), payload()).expect("accepted");
    let from_hod = service.submit(&uid("hod-it"), payload()).expect("accepted");
    let from_hr = service.submit(&uid("hr-1"), payload()).expect("accepted");

    let ids = |caller: &str| -> Vec<String> {
        service
            .list_visible(&uid(caller))
            .expect("listing")
            .into_iter()
            .map(|record| record.id.0)
            .collect()
    };

    assert_eq!(ids("mgr-1"), vec![from_employee.request_id.0.clone()]);
    assert!(ids("mgr-2").is_empty(), "manager listing is by assignment");
    assert_eq!(ids("hod-fin"), vec![from_manager.request_id.0.clone()]);
    assert_eq!(ids("hr-1"), vec![from_hod.request_id.0.clone()]);
    assert_eq!(ids("admin-1"), vec![from_hr.request_id.0.clone()]);
    assert_eq!(ids("emp-1"), vec![from_employee.request_id.0.clone()]);
    assert!(ids("emp-2").is_empty());
}

#[test]
fn manager_sees_decided_requests_but_queue_holds_only_pending() {
    let (service, _, _) = build_service();
    let first = service.submit(&uid("emp-1"), payload()).expect("accepted");
    let second = service.submit(&uid("emp-1"), payload()).expect("accepted");
    service
        .decide(&uid("mgr-1"), &first.request_id.0, Decision::Approve)
        .expect("approved");

    let listed = service.list_visible(&uid("mgr-1")).expect("listing");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.request_id, "newest first");

    let queue = service.pending_reviews(&uid("mgr-1")).expect("queue");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, second.request_id);

    let err = service
        .pending_reviews(&uid("emp-1"))
        .expect_err("employees have no queue");
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[test]
fn my_requests_lists_everything_the_caller_submitted() {
    let (service, _, _) = build_service();
    let rejected = service.submit(&uid("emp-1"), payload()).expect("accepted");
    service
        .decide(&uid("mgr-1"), &rejected.request_id.0, Decision::Reject)
        .expect("rejected");
    service.submit(&uid("emp-1"), payload()).expect("accepted");
    service.submit(&uid("emp-2"), payload()).expect("accepted");

    let mine = service.my_requests(&uid("emp-1")).expect("listing");
    assert_eq!(mine.len(), 2);
    assert!(mine
        .iter()
        .any(|record| record.status == TrainingStatus::REJECTED_BY_MANAGER));
}

#[test]
fn lookup_accepts_ids_and_numbers_and_hides_foreign_records() {
    let (service, _, _) = build_service();
    let receipt = service.submit(&uid("emp-1"), payload()).expect("accepted");

    let by_number = service
        .lookup(&uid("admin-1"), &receipt.request_number.0)
        .expect("admin looks up by number");
    let by_id = service
        .lookup(&uid("emp-1"), &receipt.request_id.0)
        .expect("owner looks up by id");
    assert_eq!(by_number, by_id);

    service
        .lookup(&uid("mgr-1"), &receipt.request_id.0)
        .expect("assigned manager sees it");
    let hidden = service
        .lookup(&uid("emp-2"), &receipt.request_id.0)
        .expect_err("not visible");
    assert_eq!(hidden.kind(), ErrorKind::NotFound);
}

#[test]
fn only_admins_remove_requests() {
    let (service, repository, _) = build_service();
    let receipt = service.submit(&uid("emp-1"), payload()).expect("accepted");

    let err = service
        .remove(&uid("hr-1"), &receipt.request_id.0)
        .expect_err("hr cannot delete");
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let removed = service
        .remove(&uid("admin-1"), &receipt.request_number.0)
        .expect("admin deletes");
    assert_eq!(removed.id, receipt.request_id);
    assert!(repository.is_empty().expect("store readable"));

    let missing = service
        .remove(&uid("admin-1"), &receipt.request_id.0)
        .expect_err("already gone");
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[test]
fn scoped_hod_listing_without_department_is_forbidden() {
    let directory = directory_with([user("hod-floating", Role::Hod, None, None)]);
    let service = TrainingRequestService::new(
        Arc::new(InMemoryTrainingNeedRepository::default()),
        Arc::new(directory),
        Arc::new(RecordingPublisher::default()),
    )
    .with_hod_scope(HodScope::Department);

    let err = service
        .list_visible(&uid("hod-floating"))
        .expect_err("no department");
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}
