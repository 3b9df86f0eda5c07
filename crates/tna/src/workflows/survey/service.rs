use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::workflows::directory::{Directory, DirectoryError, DirectoryUser, Role, UserId};
use crate::workflows::notifications::{EventPublisher, WorkflowEvent};
use crate::workflows::ErrorKind;

use super::domain::{
    AssignedSurvey, CompletionStatus, CreatedSurvey, MyResponseEntry, MyResponseView,
    NewSurvey, NewSurveyResponse, Participant, RespondentAnswers, ResponseId, Survey, SurveyId,
    SurveyResponse, SurveyResults,
};
use super::repository::{SurveyRepository, SurveyRepositoryError};

/// Admin input for a new survey.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SurveyDraft {
    pub title: String,
    pub questions: Vec<String>,
    #[serde(default)]
    pub assigned_to: Vec<UserId>,
}

/// Feedback surveys: admins author and assign them, assignees answer once each.
pub struct SurveyService<S, D, E> {
    repository: Arc<S>,
    directory: Arc<D>,
    events: Arc<E>,
}

impl<S, D, E> SurveyService<S, D, E>
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(repository: Arc<S>, directory: Arc<D>, events: Arc<E>) -> Self {
        Self {
            repository,
            directory,
            events,
        }
    }

    pub fn create(&self, caller: &UserId, draft: SurveyDraft) -> Result<Survey, SurveyError> {
        self.admin(caller)?;

        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(SurveyError::Validation("survey title is required".to_string()));
        }
        let questions: Vec<String> = draft
            .questions
            .iter()
            .map(|question| question.trim().to_string())
            .collect();
        if questions.is_empty() || questions.iter().any(String::is_empty) {
            return Err(SurveyError::Validation(
                "survey needs at least one non-empty question".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut assigned_to = Vec::new();
        for assignee in draft.assigned_to {
            if !seen.insert(assignee.clone()) {
                continue;
            }
            if self.directory.user(&assignee)?.is_none() {
                return Err(SurveyError::Validation(format!(
                    "assignee {assignee} is not in the directory"
                )));
            }
            assigned_to.push(assignee);
        }

        let survey = self.repository.insert_survey(NewSurvey {
            title,
            questions,
            assigned_to,
            created_by: caller.clone(),
        })?;
        info!(
            survey_id = %survey.id,
            assignees = survey.assigned_to.len(),
            "survey created"
        );

        for assignee in &survey.assigned_to {
            let event = WorkflowEvent::SurveyAssigned {
                survey_id: survey.id.clone(),
                title: survey.title.clone(),
                notify: assignee.clone(),
            };
            if let Err(err) = self.events.publish(event) {
                warn!(survey_id = %survey.id, recipient = %assignee, error = %err, "notification dropped");
            }
        }
        Ok(survey)
    }

    pub fn assigned(&self, caller: &UserId) -> Result<Vec<Survey>, SurveyError> {
        let caller = self.caller(caller)?;
        Ok(self.repository.surveys_assigned_to(&caller.id)?)
    }

    pub fn assigned_with_status(&self, caller: &UserId) -> Result<Vec<AssignedSurvey>, SurveyError> {
        let caller = self.caller(caller)?;
        let answered: BTreeSet<String> = self
            .repository
            .responses_by_user(&caller.id)?
            .into_iter()
            .map(|response| response.survey_id.0)
            .collect();

        Ok(self
            .repository
            .surveys_assigned_to(&caller.id)?
            .into_iter()
            .map(|survey| {
                let status = if answered.contains(&survey.id.0) {
                    CompletionStatus::Completed
                } else {
                    CompletionStatus::Pending
                };
                AssignedSurvey {
                    id: survey.id,
                    title: survey.title,
                    status,
                }
            })
            .collect())
    }

    pub fn my_response(
        &self,
        caller: &UserId,
        survey_id: &SurveyId,
    ) -> Result<MyResponseView, SurveyError> {
        let caller = self.caller(caller)?;
        let survey = self.survey(survey_id)?;
        let response = self.repository.response_for(&survey.id, &caller.id)?;
        if response.is_none() && !survey.is_assigned(&caller.id) {
            return Err(SurveyError::Forbidden(format!(
                "survey {survey_id} is not assigned to {}",
                caller.id
            )));
        }

        let status = CompletionStatus::of(response.as_ref());
        let (answers, response_id, submitted_at) = match response {
            Some(response) => (
                response.answers,
                Some(response.id),
                Some(response.created_at),
            ),
            None => (Vec::new(), None, None),
        };
        Ok(MyResponseView {
            survey_id: survey.id,
            title: survey.title,
            questions: survey.questions,
            answers,
            status,
            response_id,
            submitted_at,
        })
    }

    /// Admin overview: every survey with its assignees and how many answered.
    pub fn created(&self, caller: &UserId) -> Result<Vec<CreatedSurvey>, SurveyError> {
        self.admin(caller)?;
        self.repository
            .all_surveys()?
            .into_iter()
            .map(|survey| {
                let response_count = self.repository.count_responses(&survey.id)?;
                let assigned_to = survey
                    .assigned_to
                    .iter()
                    .map(|id| self.participant(id))
                    .collect::<Result<_, _>>()?;
                Ok(CreatedSurvey {
                    id: survey.id,
                    title: survey.title,
                    assigned_to,
                    response_count,
                    created_at: survey.created_at,
                })
            })
            .collect()
    }

    pub fn responses(
        &self,
        caller: &UserId,
        survey_id: &SurveyId,
    ) -> Result<SurveyResults, SurveyError> {
        self.admin(caller)?;
        let survey = self.survey(survey_id)?;
        let responses = self
            .repository
            .responses_for_survey(&survey.id)?
            .into_iter()
            .map(|response| {
                Ok(RespondentAnswers {
                    respondent: self.participant(&response.user_id)?,
                    response_id: response.id,
                    answers: response.answers,
                    submitted_at: response.created_at,
                    updated_at: response.updated_at,
                })
            })
            .collect::<Result<_, SurveyError>>()?;

        Ok(SurveyResults {
            survey_id: survey.id,
            title: survey.title,
            questions: survey.questions,
            responses,
        })
    }

    pub fn my_responses(&self, caller: &UserId) -> Result<Vec<MyResponseEntry>, SurveyError> {
        let caller = self.caller(caller)?;
        let mut entries = Vec::new();
        for response in self.repository.responses_by_user(&caller.id)? {
            let Some(survey) = self.repository.get_survey(&response.survey_id)? else {
                warn!(response_id = %response.id, survey_id = %response.survey_id, "response without survey");
                continue;
            };
            entries.push(MyResponseEntry {
                survey_id: survey.id,
                response_id: response.id,
                title: survey.title,
                questions: survey.questions,
                answers: response.answers,
                submitted_at: response.created_at,
            });
        }
        Ok(entries)
    }

    pub fn respond(
        &self,
        caller: &UserId,
        survey_id: &SurveyId,
        answers: Vec<String>,
    ) -> Result<SurveyResponse, SurveyError> {
        let caller = self.caller(caller)?;
        let survey = self.survey(survey_id)?;
        if !survey.is_assigned(&caller.id) {
            return Err(SurveyError::Forbidden(format!(
                "survey {survey_id} is not assigned to {}",
                caller.id
            )));
        }
        Self::check_answers(&survey, &answers)?;

        let response = self
            .repository
            .insert_response(NewSurveyResponse {
                survey_id: survey.id.clone(),
                user_id: caller.id.clone(),
                answers,
            })
            .map_err(|err| match err {
                SurveyRepositoryError::DuplicateResponse { survey, user } => SurveyError::Conflict(
                    format!("{user} already answered survey {survey}"),
                ),
                other => other.into(),
            })?;
        info!(survey_id = %survey.id, respondent = %caller.id, "survey answered");
        Ok(response)
    }

    /// Replaces the answers of a response the caller owns.
    pub fn update_response(
        &self,
        caller: &UserId,
        response_id: &ResponseId,
        answers: Vec<String>,
    ) -> Result<SurveyResponse, SurveyError> {
        let caller = self.caller(caller)?;
        let response = self
            .repository
            .get_response(response_id)?
            .ok_or_else(|| SurveyError::NotFound(format!("response {response_id}")))?;
        if response.user_id != caller.id {
            return Err(SurveyError::Forbidden(format!(
                "response {response_id} belongs to another user"
            )));
        }
        let survey = self.survey(&response.survey_id)?;
        Self::check_answers(&survey, &answers)?;

        match self.repository.update_answers(response_id, answers) {
            Err(SurveyRepositoryError::NotFound) => {
                Err(SurveyError::NotFound(format!("response {response_id}")))
            }
            other => other.map_err(SurveyError::from),
        }
    }

    pub fn delete_response(
        &self,
        caller: &UserId,
        survey_id: &SurveyId,
    ) -> Result<SurveyResponse, SurveyError> {
        let caller = self.caller(caller)?;
        let removed = self
            .repository
            .delete_response_for(survey_id, &caller.id)?
            .ok_or_else(|| {
                SurveyError::NotFound(format!("response of {} to survey {survey_id}", caller.id))
            })?;
        info!(survey_id = %survey_id, respondent = %caller.id, "survey response withdrawn");
        Ok(removed)
    }

    fn check_answers(survey: &Survey, answers: &[String]) -> Result<(), SurveyError> {
        if answers.len() != survey.questions.len() {
            return Err(SurveyError::Validation(format!(
                "survey {} has {} questions but {} answers were given",
                survey.id,
                survey.questions.len(),
                answers.len()
            )));
        }
        Ok(())
    }

    fn caller(&self, id: &UserId) -> Result<DirectoryUser, SurveyError> {
        self.directory
            .user(id)?
            .ok_or_else(|| SurveyError::Forbidden(format!("unknown caller {id}")))
    }

    fn admin(&self, id: &UserId) -> Result<DirectoryUser, SurveyError> {
        let caller = self.caller(id)?;
        if caller.role != Role::Admin {
            return Err(SurveyError::Forbidden(
                "only admins manage surveys".to_string(),
            ));
        }
        Ok(caller)
    }

    fn survey(&self, id: &SurveyId) -> Result<Survey, SurveyError> {
        self.repository
            .get_survey(id)?
            .ok_or_else(|| SurveyError::NotFound(format!("survey {id}")))
    }

    fn participant(&self, id: &UserId) -> Result<Participant, SurveyError> {
        Ok(Participant::resolve(id, self.directory.user(id)?))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error("invalid survey input: {0}")]
    Validation(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repository(#[from] SurveyRepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl SurveyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SurveyError::Validation(_) => ErrorKind::Validation,
            SurveyError::Forbidden(_) => ErrorKind::Forbidden,
            SurveyError::NotFound(_) => ErrorKind::NotFound,
            SurveyError::Conflict(_) => ErrorKind::Conflict,
            SurveyError::Repository(_) | SurveyError::Directory(_) => ErrorKind::ServerFault,
        }
    }
}
