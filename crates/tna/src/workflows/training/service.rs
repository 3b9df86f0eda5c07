use std::sync::Arc;

use tracing::{info, warn};

use crate::workflows::directory::{
    Department, Directory, DirectoryError, DirectoryUser, Role, UserId,
};
use crate::workflows::notifications::{EventPublisher, WorkflowEvent};
use crate::workflows::ErrorKind;

use super::domain::{
    Decision, NewTrainingNeed, RequestId, RequestNumber, Stage, TrainingNeedPayload,
    TrainingNeedRecord, TrainingStatus,
};
use super::number::{RequestNumberSource, TimestampedNumbers};
use super::repository::{RepositoryError, SortOrder, StatusUpdate, TrainingNeedRepository};
use super::visibility::{HodScope, VisibilityDenied, VisibilityPolicy};

const MAX_NUMBER_ATTEMPTS: usize = 3;

/// Returned to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SubmissionReceipt {
    pub request_id: RequestId,
    pub request_number: RequestNumber,
    pub status: TrainingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_reviewer: Option<UserId>,
}

/// Returned to the reviewer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DecisionReceipt {
    pub request_id: RequestId,
    pub request_number: RequestNumber,
    pub stage: Stage,
    pub decision: Decision,
    pub status: TrainingStatus,
}

/// The approval workflow: routing on submission, guarded decisions, role-based queries.
///
/// Holds no workflow state of its own; every mutation is a single conditional write to the
/// repository followed by a best-effort event.
pub struct TrainingRequestService<R, D, E> {
    repository: Arc<R>,
    directory: Arc<D>,
    events: Arc<E>,
    numbers: Box<dyn RequestNumberSource>,
    visibility: VisibilityPolicy,
}

impl<R, D, E> TrainingRequestService<R, D, E>
where
    R: TrainingNeedRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>, events: Arc<E>) -> Self {
        Self {
            repository,
            directory,
            events,
            numbers: Box::new(TimestampedNumbers::new()),
            visibility: VisibilityPolicy::default(),
        }
    }

    pub fn with_hod_scope(mut self, scope: HodScope) -> Self {
        self.visibility = VisibilityPolicy::new(scope);
        self
    }

    pub fn with_number_source(mut self, numbers: impl RequestNumberSource + 'static) -> Self {
        self.numbers = Box::new(numbers);
        self
    }

    /// Files a new request and routes it to the first reviewer for the submitter's role.
    pub fn submit(
        &self,
        caller: &UserId,
        payload: TrainingNeedPayload,
    ) -> Result<SubmissionReceipt, WorkflowError> {
        let submitter = self.caller(caller)?;

        let reserved = payload.reserved_keys();
        if !reserved.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "payload may not set workflow fields: {}",
                reserved.join(", ")
            )));
        }

        let status = TrainingStatus::initial_for(submitter.role).ok_or_else(|| {
            WorkflowError::Forbidden(format!(
                "role {} does not submit training requests",
                submitter.role
            ))
        })?;
        let (assigned_manager, next_reviewer) = self.route(&submitter)?;

        let mut attempt = 0;
        let record = loop {
            attempt += 1;
            let candidate = NewTrainingNeed {
                request_number: self.numbers.next_number(),
                submitter: submitter.id.clone(),
                department: submitter.department.clone(),
                assigned_manager: assigned_manager.clone(),
                status,
                payload: payload.clone(),
            };
            match self.repository.create(candidate) {
                Ok(record) => break record,
                Err(RepositoryError::DuplicateRequestNumber(number))
                    if attempt < MAX_NUMBER_ATTEMPTS =>
                {
                    warn!(%number, attempt, "request number collision, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        };

        info!(
            request_number = %record.request_number,
            submitter = %record.submitter,
            status = %record.status,
            "training request submitted"
        );

        match &next_reviewer {
            Some(reviewer) => self.emit(WorkflowEvent::RequestSubmitted {
                request_id: record.id.clone(),
                request_number: record.request_number.clone(),
                status: record.status,
                submitter: record.submitter.clone(),
                notify: reviewer.clone(),
            }),
            None => warn!(
                request_number = %record.request_number,
                status = %record.status,
                "no reviewer available to notify"
            ),
        }

        Ok(SubmissionReceipt {
            request_id: record.id,
            request_number: record.request_number,
            status: record.status,
            next_reviewer,
        })
    }

    /// Applies a reviewer's decision to the stage matching their role.
    pub fn decide(
        &self,
        caller: &UserId,
        key: &str,
        decision: Decision,
    ) -> Result<DecisionReceipt, WorkflowError> {
        let reviewer = self.caller(caller)?;
        let stage = Stage::for_role(reviewer.role).ok_or_else(|| {
            WorkflowError::Forbidden(format!(
                "role {} does not review training requests",
                reviewer.role
            ))
        })?;
        let record = self.resolve(key)?;

        if stage == Stage::Manager && record.assigned_manager.as_ref() != Some(&reviewer.id) {
            warn!(request_number = %record.request_number, reviewer = %reviewer.id, "manager not assigned");
            return Err(WorkflowError::Forbidden(format!(
                "{} is not the assigned manager of {}",
                reviewer.id, record.request_number
            )));
        }
        if stage == Stage::Hod && !self.visibility.hod_may_decide(&reviewer, &record) {
            warn!(request_number = %record.request_number, reviewer = %reviewer.id, "hod outside department");
            return Err(WorkflowError::Forbidden(format!(
                "{} may only review requests from their own department",
                reviewer.id
            )));
        }
        if !stage.accepts(record.status) {
            warn!(
                request_number = %record.request_number,
                status = %record.status,
                %stage,
                "decision on request outside stage intake"
            );
            return Err(WorkflowError::Conflict {
                request_number: record.request_number,
                stage,
                actual: record.status,
            });
        }

        let update = StatusUpdate {
            expected: record.status,
            next: stage.resolve(decision),
            stage,
            reviewer: reviewer.id.clone(),
        };
        let updated = match self.repository.update_status_and_audit(&record.id, update) {
            Ok(updated) => updated,
            Err(RepositoryError::StatusMismatch { actual, .. }) => {
                warn!(request_number = %record.request_number, status = %actual, "lost decision race");
                return Err(WorkflowError::Conflict {
                    request_number: record.request_number,
                    stage,
                    actual,
                });
            }
            Err(RepositoryError::AuditAlreadyRecorded(_)) => {
                return Err(WorkflowError::Conflict {
                    request_number: record.request_number,
                    stage,
                    actual: record.status,
                });
            }
            Err(RepositoryError::NotFound) => {
                return Err(WorkflowError::NotFound(key.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            request_number = %updated.request_number,
            reviewer = %reviewer.id,
            decision = decision.label(),
            status = %updated.status,
            "training request decided"
        );

        self.emit(WorkflowEvent::RequestAdvanced {
            request_id: updated.id.clone(),
            request_number: updated.request_number.clone(),
            stage,
            decision,
            new_status: updated.status,
            reviewer: reviewer.id,
            notify: updated.submitter.clone(),
        });

        Ok(DecisionReceipt {
            request_id: updated.id,
            request_number: updated.request_number,
            stage,
            decision,
            status: updated.status,
        })
    }

    /// Requests visible to the caller's role, newest first.
    pub fn list_visible(&self, caller: &UserId) -> Result<Vec<TrainingNeedRecord>, WorkflowError> {
        let caller = self.caller(caller)?;
        let filter = self.visibility.list_filter(&caller)?;
        Ok(self.repository.find(&filter, SortOrder::NewestFirst)?)
    }

    /// Requests waiting on the caller's decision.
    pub fn pending_reviews(
        &self,
        caller: &UserId,
    ) -> Result<Vec<TrainingNeedRecord>, WorkflowError> {
        let caller = self.caller(caller)?;
        let filter = self.visibility.review_filter(&caller)?;
        Ok(self.repository.find(&filter, SortOrder::NewestFirst)?)
    }

    pub fn my_requests(&self, caller: &UserId) -> Result<Vec<TrainingNeedRecord>, WorkflowError> {
        let caller = self.caller(caller)?;
        let filter = VisibilityPolicy::own_filter(&caller);
        Ok(self.repository.find(&filter, SortOrder::NewestFirst)?)
    }

    /// Direct lookup by id or request number. Records outside the caller's visibility are
    /// reported as missing.
    pub fn lookup(&self, caller: &UserId, key: &str) -> Result<TrainingNeedRecord, WorkflowError> {
        let caller = self.caller(caller)?;
        let record = self.resolve(key)?;
        if self.visibility.can_view(&caller, &record) {
            Ok(record)
        } else {
            Err(WorkflowError::NotFound(key.to_string()))
        }
    }

    /// Administrative hard delete.
    pub fn remove(&self, caller: &UserId, key: &str) -> Result<TrainingNeedRecord, WorkflowError> {
        let caller = self.caller(caller)?;
        if caller.role != Role::Admin {
            return Err(WorkflowError::Forbidden(
                "only admins may delete training requests".to_string(),
            ));
        }
        let record = self.resolve(key)?;
        let removed = match self.repository.delete(&record.id) {
            Err(RepositoryError::NotFound) => Err(WorkflowError::NotFound(key.to_string())),
            other => other.map_err(WorkflowError::from),
        }?;
        warn!(
            request_number = %removed.request_number,
            admin = %caller.id,
            status = %removed.status,
            "training request deleted"
        );
        Ok(removed)
    }

    fn caller(&self, id: &UserId) -> Result<DirectoryUser, WorkflowError> {
        self.directory
            .user(id)?
            .ok_or_else(|| WorkflowError::Forbidden(format!("unknown caller {id}")))
    }

    fn resolve(&self, key: &str) -> Result<TrainingNeedRecord, WorkflowError> {
        if let Some(record) = self.repository.get_by_id(&RequestId(key.to_string()))? {
            return Ok(record);
        }
        self.repository
            .get_by_request_number(&RequestNumber(key.to_string()))?
            .ok_or_else(|| WorkflowError::NotFound(key.to_string()))
    }

    /// Assigned manager (employees only) and the reviewer to notify.
    fn route(
        &self,
        submitter: &DirectoryUser,
    ) -> Result<(Option<UserId>, Option<UserId>), WorkflowError> {
        if matches!(submitter.role, Role::Employee | Role::Manager)
            && self.visibility.hod_scope() == HodScope::Department
            && submitter.department.is_none()
        {
            return Err(WorkflowError::Validation(format!(
                "{} has no department, so no HOD can review the request",
                submitter.id
            )));
        }

        match submitter.role {
            Role::Employee => {
                let manager = submitter.manager.clone().ok_or_else(|| {
                    WorkflowError::Validation(format!(
                        "no manager assigned to employee {}",
                        submitter.id
                    ))
                })?;
                match self.directory.user(&manager)? {
                    None => Err(WorkflowError::Validation(format!(
                        "assigned manager {manager} of {} is not in the directory",
                        submitter.id
                    ))),
                    Some(found) if found.role != Role::Manager => {
                        Err(WorkflowError::Validation(format!(
                            "assigned manager {manager} of {} is {}, not a manager",
                            submitter.id, found.role
                        )))
                    }
                    Some(_) => Ok((Some(manager.clone()), Some(manager))),
                }
            }
            Role::Manager => {
                let department = submitter.department.as_ref();
                Ok((None, self.first_with_role(Role::Hod, department)?))
            }
            Role::Hod => Ok((None, self.first_with_role(Role::Hr, None)?)),
            Role::Hr => Ok((None, self.first_with_role(Role::Admin, None)?)),
            Role::Admin => Err(WorkflowError::Forbidden(
                "admins do not submit training requests".to_string(),
            )),
        }
    }

    fn first_with_role(
        &self,
        role: Role,
        department: Option<&Department>,
    ) -> Result<Option<UserId>, WorkflowError> {
        Ok(self
            .directory
            .users_with_role(role, department)?
            .into_iter()
            .next()
            .map(|user| user.id))
    }

    fn emit(&self, event: WorkflowEvent) {
        let kind = event.kind();
        let recipient = event.recipient().clone();
        if let Err(err) = self.events.publish(event) {
            warn!(event = kind, %recipient, error = %err, "notification dropped");
        }
    }
}

/// Error raised by the training workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("training request {0} not found")]
    NotFound(String),
    #[error("request {request_number} is {actual}; {stage} review is not open")]
    Conflict {
        request_number: RequestNumber,
        stage: Stage,
        actual: TrainingStatus,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::Forbidden(_) => ErrorKind::Forbidden,
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::Conflict { .. } => ErrorKind::Conflict,
            WorkflowError::Repository(_) | WorkflowError::Directory(_) => ErrorKind::ServerFault,
        }
    }
}

impl From<VisibilityDenied> for WorkflowError {
    fn from(value: VisibilityDenied) -> Self {
        WorkflowError::Forbidden(value.to_string())
    }
}
