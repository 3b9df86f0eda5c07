use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::directory::{Department, DirectoryUser, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurveyId(pub String);

impl fmt::Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub String);

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A feedback form pushed to a fixed set of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub title: String,
    pub questions: Vec<String>,
    pub assigned_to: Vec<UserId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Survey {
    pub fn is_assigned(&self, user: &UserId) -> bool {
        self.assigned_to.contains(user)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSurvey {
    pub title: String,
    pub questions: Vec<String>,
    pub assigned_to: Vec<UserId>,
    pub created_by: UserId,
}

/// One user's answers to one survey, positionally matching its questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: ResponseId,
    pub survey_id: SurveyId,
    pub user_id: UserId,
    pub answers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSurveyResponse {
    pub survey_id: SurveyId,
    pub user_id: UserId,
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    Completed,
    Pending,
}

impl CompletionStatus {
    pub fn of(response: Option<&SurveyResponse>) -> Self {
        match response {
            Some(_) => CompletionStatus::Completed,
            None => CompletionStatus::Pending,
        }
    }
}

/// Row of the caller's survey inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignedSurvey {
    pub id: SurveyId,
    pub title: String,
    pub status: CompletionStatus,
}

/// The caller's view of a single survey and their own answers, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MyResponseView {
    pub survey_id: SurveyId,
    pub title: String,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub status: CompletionStatus,
    pub response_id: Option<ResponseId>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Contact details of a directory user as shown to survey admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub department: Option<Department>,
}

impl Participant {
    /// Users that have left the directory keep their id only.
    pub fn resolve(id: &UserId, user: Option<DirectoryUser>) -> Self {
        match user {
            Some(user) => Self {
                id: user.id,
                name: Some(user.name),
                email: user.email,
                department: user.department,
            },
            None => Self {
                id: id.clone(),
                name: None,
                email: None,
                department: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedSurvey {
    pub id: SurveyId,
    pub title: String,
    pub assigned_to: Vec<Participant>,
    pub response_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RespondentAnswers {
    pub response_id: ResponseId,
    pub respondent: Participant,
    pub answers: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Every answer collected for a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyResults {
    pub survey_id: SurveyId,
    pub title: String,
    pub questions: Vec<String>,
    pub responses: Vec<RespondentAnswers>,
}

/// A response of the caller joined with the survey it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MyResponseEntry {
    pub survey_id: SurveyId,
    pub response_id: ResponseId,
    pub title: String,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::directory::Role;

    #[test]
    fn completion_follows_response_presence() {
        assert_eq!(CompletionStatus::of(None), CompletionStatus::Pending);
        let now = Utc::now();
        let response = SurveyResponse {
            id: ResponseId("rs-000001".to_string()),
            survey_id: SurveyId("sv-000001".to_string()),
            user_id: UserId::new("emp-1"),
            answers: vec!["Yes".to_string()],
            created_at: now,
            updated_at: now,
        };
        assert_eq!(
            CompletionStatus::of(Some(&response)),
            CompletionStatus::Completed
        );
        assert_eq!(
            serde_json::to_value(CompletionStatus::Completed).expect("serialize"),
            serde_json::json!("Completed")
        );
    }

    #[test]
    fn participants_outside_directory_keep_their_id() {
        let ghost = Participant::resolve(&UserId::new("ghost"), None);
        assert_eq!(ghost.id, UserId::new("ghost"));
        assert!(ghost.name.is_none());

        let known = Participant::resolve(
            &UserId::new("emp-1"),
            Some(DirectoryUser {
                id: UserId::new("emp-1"),
                name: "Eli".to_string(),
                email: Some("eli@example.com".to_string()),
                role: Role::Employee,
                department: Some(Department::new("IT")),
                manager: None,
                hod: None,
            }),
        );
        assert_eq!(known.name.as_deref(), Some("Eli"));
        assert_eq!(known.department, Some(Department::new("IT")));
    }
}
