//! Feedback surveys assigned by admins and answered by staff.

pub mod domain;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    AssignedSurvey, CompletionStatus, CreatedSurvey, MyResponseEntry, MyResponseView,
    Participant, ResponseId, Survey, SurveyId, SurveyResponse, SurveyResults,
};
pub use memory::InMemorySurveyRepository;
pub use repository::{SurveyRepository, SurveyRepositoryError};
pub use router::survey_router;
pub use service::{SurveyDraft, SurveyError, SurveyService};
