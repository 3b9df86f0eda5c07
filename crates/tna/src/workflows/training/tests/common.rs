use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::directory::{Department, DirectoryUser, InMemoryDirectory, Role, UserId};
use crate::workflows::notifications::{EventPublisher, PublishError, WorkflowEvent};
use crate::workflows::training::domain::{
    NewTrainingNeed, RequestId, RequestNumber, TrainingNeedPayload, TrainingNeedRecord,
};
use crate::workflows::training::memory::InMemoryTrainingNeedRepository;
use crate::workflows::training::number::RequestNumberSource;
use crate::workflows::training::repository::{
    RepositoryError, RequestFilter, SortOrder, StatusUpdate, TrainingNeedRepository,
};
use crate::workflows::training::service::TrainingRequestService;

pub(super) type MemoryService =
    TrainingRequestService<InMemoryTrainingNeedRepository, InMemoryDirectory, RecordingPublisher>;

pub(super) fn uid(id: &str) -> UserId {
    UserId::new(id)
}

pub(super) fn user(
    id: &str,
    role: Role,
    department: Option<&str>,
    manager: Option<&str>,
) -> DirectoryUser {
    DirectoryUser {
        id: uid(id),
        name: id.to_string(),
        email: Some(format!("{id}@tna.test")),
        role,
        department: department.map(Department::new),
        manager: manager.map(uid),
        hod: None,
    }
}

fn seed_users() -> Vec<DirectoryUser> {
    vec![
        user("admin-1", Role::Admin, None, None),
        user("emp-1", Role::Employee, Some("IT"), Some("mgr-1")),
        user("emp-2", Role::Employee, Some("Finance"), Some("mgr-2")),
        user("emp-dangling", Role::Employee, Some("IT"), Some("mgr-ghost")),
        user("emp-orphan", Role::Employee, Some("IT"), None),
        user("hod-fin", Role::Hod, Some("Finance"), None),
        user("hod-it", Role::Hod, Some("IT"), None),
        user("hr-1", Role::Hr, Some("HR"), None),
        user("mgr-1", Role::Manager, Some("IT"), None),
        user("mgr-2", Role::Manager, Some("Finance"), None),
    ]
}

pub(super) fn directory() -> InMemoryDirectory {
    directory_with([])
}

/// The shared organisation plus `extra` users.
pub(super) fn directory_with(extra: impl IntoIterator<Item = DirectoryUser>) -> InMemoryDirectory {
    InMemoryDirectory::from_users(seed_users().into_iter().chain(extra)).expect("seed directory")
}

pub(super) fn payload() -> TrainingNeedPayload {
    [
        ("generalSkills", "Spreadsheet modelling"),
        ("toolsTraining", "Power BI"),
        ("softSkills", "Presenting to stakeholders"),
        ("careerGoals", "Move into analytics"),
        ("trainingFormat", "Blended"),
        ("trainingDuration", "2 days"),
        ("trainingFrequency", "Quarterly"),
    ]
    .into_iter()
    .collect()
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryTrainingNeedRepository>,
    Arc<RecordingPublisher>,
) {
    let repository = Arc::new(InMemoryTrainingNeedRepository::default());
    let events = Arc::new(RecordingPublisher::default());
    let service =
        TrainingRequestService::new(repository.clone(), Arc::new(directory()), events.clone());
    (service, repository, events)
}

#[derive(Default)]
pub(super) struct RecordingPublisher {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingPublisher {
    pub(super) fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().expect("publisher mutex poisoned").clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: WorkflowEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .expect("publisher mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) struct ClosedPublisher;

impl EventPublisher for ClosedPublisher {
    fn publish(&self, _event: WorkflowEvent) -> Result<(), PublishError> {
        Err(PublishError::Closed)
    }
}

/// Hands out a fixed list of numbers, then repeats the last one.
pub(super) struct ScriptedNumbers {
    numbers: Mutex<Vec<&'static str>>,
}

impl ScriptedNumbers {
    pub(super) fn new(mut numbers: Vec<&'static str>) -> Self {
        numbers.reverse();
        Self {
            numbers: Mutex::new(numbers),
        }
    }
}

impl RequestNumberSource for ScriptedNumbers {
    fn next_number(&self) -> RequestNumber {
        let mut guard = self.numbers.lock().expect("numbers mutex poisoned");
        let next = if guard.len() > 1 {
            guard.pop()
        } else {
            guard.last().copied()
        };
        RequestNumber(next.unwrap_or("TRN-000000-100").to_string())
    }
}

pub(super) struct UnavailableRepository;

impl TrainingNeedRepository for UnavailableRepository {
    fn create(&self, _record: NewTrainingNeed) -> Result<TrainingNeedRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn get_by_id(&self, _id: &RequestId) -> Result<Option<TrainingNeedRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn get_by_request_number(
        &self,
        _number: &RequestNumber,
    ) -> Result<Option<TrainingNeedRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find(
        &self,
        _filter: &RequestFilter,
        _sort: SortOrder,
    ) -> Result<Vec<TrainingNeedRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_status_and_audit(
        &self,
        _id: &RequestId,
        _update: StatusUpdate,
    ) -> Result<TrainingNeedRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &RequestId) -> Result<TrainingNeedRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
