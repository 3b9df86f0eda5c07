//! Training request approval chain: Manager, HOD, HR, Admin.

pub mod domain;
pub mod memory;
pub mod number;
pub mod repository;
pub mod router;
pub mod service;
pub mod visibility;

#[cfg(test)]
mod tests;

pub use domain::{
    AuditTrail, Decision, NewTrainingNeed, RequestId, RequestNumber, Stage, StageOutcome,
    TrainingNeedPayload, TrainingNeedRecord, TrainingStatus,
};
pub use memory::InMemoryTrainingNeedRepository;
pub use number::{format_request_number, RequestNumberSource, TimestampedNumbers};
pub use repository::{
    RepositoryError, RequestFilter, SortOrder, StatusUpdate, TrainingNeedRepository,
};
pub use router::training_router;
pub use service::{DecisionReceipt, SubmissionReceipt, TrainingRequestService, WorkflowError};
pub use visibility::{HodScope, VisibilityPolicy};
