use crate::workflows::directory::UserId;

use super::domain::{NewSurvey, NewSurveyResponse, ResponseId, Survey, SurveyId, SurveyResponse};

/// Storage for surveys and their responses. Listings come back newest first.
///
/// `insert_response` must reject a second response by the same user to the same survey with
/// [`SurveyRepositoryError::DuplicateResponse`], atomically with the insert.
pub trait SurveyRepository: Send + Sync {
    fn insert_survey(&self, survey: NewSurvey) -> Result<Survey, SurveyRepositoryError>;
    fn get_survey(&self, id: &SurveyId) -> Result<Option<Survey>, SurveyRepositoryError>;
    fn surveys_assigned_to(&self, user: &UserId) -> Result<Vec<Survey>, SurveyRepositoryError>;
    fn all_surveys(&self) -> Result<Vec<Survey>, SurveyRepositoryError>;

    fn insert_response(
        &self,
        response: NewSurveyResponse,
    ) -> Result<SurveyResponse, SurveyRepositoryError>;
    fn get_response(&self, id: &ResponseId)
        -> Result<Option<SurveyResponse>, SurveyRepositoryError>;
    fn response_for(
        &self,
        survey: &SurveyId,
        user: &UserId,
    ) -> Result<Option<SurveyResponse>, SurveyRepositoryError>;
    fn responses_for_survey(
        &self,
        survey: &SurveyId,
    ) -> Result<Vec<SurveyResponse>, SurveyRepositoryError>;
    fn responses_by_user(&self, user: &UserId)
        -> Result<Vec<SurveyResponse>, SurveyRepositoryError>;
    fn update_answers(
        &self,
        id: &ResponseId,
        answers: Vec<String>,
    ) -> Result<SurveyResponse, SurveyRepositoryError>;
    /// Removes the user's response to `survey`, returning it if there was one.
    fn delete_response_for(
        &self,
        survey: &SurveyId,
        user: &UserId,
    ) -> Result<Option<SurveyResponse>, SurveyRepositoryError>;
    fn count_responses(&self, survey: &SurveyId) -> Result<usize, SurveyRepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SurveyRepositoryError {
    #[error("{user} already answered survey {survey}")]
    DuplicateResponse { survey: SurveyId, user: UserId },
    #[error("record not found")]
    NotFound,
    #[error("survey store unavailable: {0}")]
    Unavailable(String),
}
