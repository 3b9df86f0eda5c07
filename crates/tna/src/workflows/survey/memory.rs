use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::workflows::directory::UserId;

use super::domain::{NewSurvey, NewSurveyResponse, ResponseId, Survey, SurveyId, SurveyResponse};
use super::repository::{SurveyRepository, SurveyRepositoryError};

#[derive(Debug, Default)]
struct SurveyState {
    next_survey: u64,
    next_response: u64,
    surveys: BTreeMap<u64, Survey>,
    survey_index: HashMap<SurveyId, u64>,
    responses: BTreeMap<u64, SurveyResponse>,
    response_index: HashMap<ResponseId, u64>,
    answered: HashMap<(SurveyId, UserId), u64>,
}

/// Process-local survey store keyed by insertion sequence.
#[derive(Debug, Default, Clone)]
pub struct InMemorySurveyRepository {
    state: Arc<Mutex<SurveyState>>,
}

impl InMemorySurveyRepository {
    fn lock(&self) -> Result<MutexGuard<'_, SurveyState>, SurveyRepositoryError> {
        self.state
            .lock()
            .map_err(|_| SurveyRepositoryError::Unavailable("survey lock poisoned".to_string()))
    }

    fn newest_responses(
        state: &SurveyState,
        keep: impl Fn(&SurveyResponse) -> bool,
    ) -> Vec<SurveyResponse> {
        state
            .responses
            .values()
            .rev()
            .filter(|response| keep(response))
            .cloned()
            .collect()
    }
}

impl SurveyRepository for InMemorySurveyRepository {
    fn insert_survey(&self, survey: NewSurvey) -> Result<Survey, SurveyRepositoryError> {
        let mut state = self.lock()?;
        state.next_survey += 1;
        let sequence = state.next_survey;
        let stored = Survey {
            id: SurveyId(format!("sv-{sequence:06}")),
            title: survey.title,
            questions: survey.questions,
            assigned_to: survey.assigned_to,
            created_by: survey.created_by,
            created_at: Utc::now(),
        };
        state.survey_index.insert(stored.id.clone(), sequence);
        state.surveys.insert(sequence, stored.clone());
        Ok(stored)
    }

    fn get_survey(&self, id: &SurveyId) -> Result<Option<Survey>, SurveyRepositoryError> {
        let state = self.lock()?;
        Ok(state
            .survey_index
            .get(id)
            .and_then(|sequence| state.surveys.get(sequence))
            .cloned())
    }

    fn surveys_assigned_to(&self, user: &UserId) -> Result<Vec<Survey>, SurveyRepositoryError> {
        let state = self.lock()?;
        Ok(state
            .surveys
            .values()
            .rev()
            .filter(|survey| survey.is_assigned(user))
            .cloned()
            .collect())
    }

    fn all_surveys(&self) -> Result<Vec<Survey>, SurveyRepositoryError> {
        let state = self.lock()?;
        Ok(state.surveys.values().rev().cloned().collect())
    }

    fn insert_response(
        &self,
        response: NewSurveyResponse,
    ) -> Result<SurveyResponse, SurveyRepositoryError> {
        let mut state = self.lock()?;
        let owner = (response.survey_id.clone(), response.user_id.clone());
        if state.answered.contains_key(&owner) {
            return Err(SurveyRepositoryError::DuplicateResponse {
                survey: response.survey_id,
                user: response.user_id,
            });
        }

        state.next_response += 1;
        let sequence = state.next_response;
        let now = Utc::now();
        let stored = SurveyResponse {
            id: ResponseId(format!("rs-{sequence:06}")),
            survey_id: response.survey_id,
            user_id: response.user_id,
            answers: response.answers,
            created_at: now,
            updated_at: now,
        };
        state.answered.insert(owner, sequence);
        state.response_index.insert(stored.id.clone(), sequence);
        state.responses.insert(sequence, stored.clone());
        Ok(stored)
    }

    fn get_response(
        &self,
        id: &ResponseId,
    ) -> Result<Option<SurveyResponse>, SurveyRepositoryError> {
        let state = self.lock()?;
        Ok(state
            .response_index
            .get(id)
            .and_then(|sequence| state.responses.get(sequence))
            .cloned())
    }

    fn response_for(
        &self,
        survey: &SurveyId,
        user: &UserId,
    ) -> Result<Option<SurveyResponse>, SurveyRepositoryError> {
        let state = self.lock()?;
        Ok(state
            .answered
            .get(&(survey.clone(), user.clone()))
            .and_then(|sequence| state.responses.get(sequence))
            .cloned())
    }

    fn responses_for_survey(
        &self,
        survey: &SurveyId,
    ) -> Result<Vec<SurveyResponse>, SurveyRepositoryError> {
        let state = self.lock()?;
        Ok(Self::newest_responses(&state, |response| {
            &response.survey_id == survey
        }))
    }

    fn responses_by_user(
        &self,
        user: &UserId,
    ) -> Result<Vec<SurveyResponse>, SurveyRepositoryError> {
        let state = self.lock()?;
        Ok(Self::newest_responses(&state, |response| {
            &response.user_id == user
        }))
    }

    fn update_answers(
        &self,
        id: &ResponseId,
        answers: Vec<String>,
    ) -> Result<SurveyResponse, SurveyRepositoryError> {
        let mut state = self.lock()?;
        let sequence = *state
            .response_index
            .get(id)
            .ok_or(SurveyRepositoryError::NotFound)?;
        let response = state
            .responses
            .get_mut(&sequence)
            .ok_or(SurveyRepositoryError::NotFound)?;
        response.answers = answers;
        response.updated_at = Utc::now();
        Ok(response.clone())
    }

    fn delete_response_for(
        &self,
        survey: &SurveyId,
        user: &UserId,
    ) -> Result<Option<SurveyResponse>, SurveyRepositoryError> {
        let mut state = self.lock()?;
        let Some(sequence) = state.answered.remove(&(survey.clone(), user.clone())) else {
            return Ok(None);
        };
        let removed = state.responses.remove(&sequence);
        if let Some(response) = &removed {
            state.response_index.remove(&response.id);
        }
        Ok(removed)
    }

    fn count_responses(&self, survey: &SurveyId) -> Result<usize, SurveyRepositoryError> {
        let state = self.lock()?;
        Ok(state
            .responses
            .values()
            .filter(|response| &response.survey_id == survey)
            .count())
    }
}
