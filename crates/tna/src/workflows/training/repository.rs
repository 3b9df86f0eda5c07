use crate::workflows::directory::{Department, UserId};

use super::domain::{
    NewTrainingNeed, RequestId, RequestNumber, Stage, TrainingNeedRecord, TrainingStatus,
};

/// Conjunctive filter over stored requests. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    /// Empty means any status.
    pub statuses: Vec<TrainingStatus>,
    pub department: Option<Department>,
    pub assigned_manager: Option<UserId>,
    pub submitter: Option<UserId>,
}

impl RequestFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_statuses(statuses: impl IntoIterator<Item = TrainingStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn submitted_by(submitter: UserId) -> Self {
        Self {
            submitter: Some(submitter),
            ..Self::default()
        }
    }

    pub fn assigned_to(manager: UserId) -> Self {
        Self {
            assigned_manager: Some(manager),
            ..Self::default()
        }
    }

    pub fn in_department(mut self, department: Department) -> Self {
        self.department = Some(department);
        self
    }

    pub fn matches(&self, record: &TrainingNeedRecord) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&record.status))
            && self
                .department
                .as_ref()
                .map_or(true, |department| record.department.as_ref() == Some(department))
            && self
                .assigned_manager
                .as_ref()
                .map_or(true, |manager| record.assigned_manager.as_ref() == Some(manager))
            && self
                .submitter
                .as_ref()
                .map_or(true, |submitter| &record.submitter == submitter)
    }
}

/// Ordering by creation instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Conditional status change plus the audit entry that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub expected: TrainingStatus,
    pub next: TrainingStatus,
    pub stage: Stage,
    pub reviewer: UserId,
}

/// Storage contract the workflow engine relies on.
///
/// `update_status_and_audit` is a compare-and-set: it must apply the new status and the audit
/// entry together, and only while the stored status still equals `update.expected`. Two
/// concurrent callers with the same expectation must see one success and one
/// [`RepositoryError::StatusMismatch`].
pub trait TrainingNeedRepository: Send + Sync {
    /// Assigns the id and timestamps. Fails on a duplicate request number.
    fn create(&self, record: NewTrainingNeed) -> Result<TrainingNeedRecord, RepositoryError>;
    fn get_by_id(&self, id: &RequestId) -> Result<Option<TrainingNeedRecord>, RepositoryError>;
    fn get_by_request_number(
        &self,
        number: &RequestNumber,
    ) -> Result<Option<TrainingNeedRecord>, RepositoryError>;
    fn find(
        &self,
        filter: &RequestFilter,
        sort: SortOrder,
    ) -> Result<Vec<TrainingNeedRecord>, RepositoryError>;
    fn update_status_and_audit(
        &self,
        id: &RequestId,
        update: StatusUpdate,
    ) -> Result<TrainingNeedRecord, RepositoryError>;
    /// Administrative removal, outside the state machine.
    fn delete(&self, id: &RequestId) -> Result<TrainingNeedRecord, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("request number {0} already exists")]
    DuplicateRequestNumber(RequestNumber),
    #[error("record not found")]
    NotFound,
    #[error("status is {actual}, expected {expected}")]
    StatusMismatch {
        expected: TrainingStatus,
        actual: TrainingStatus,
    },
    #[error("{0} review already recorded")]
    AuditAlreadyRecorded(Stage),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
