use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::workflows::directory::Directory;
use crate::workflows::http::{caller_from, error_response};
use crate::workflows::notifications::EventPublisher;

use super::domain::{ResponseId, SurveyId};
use super::repository::SurveyRepository;
use super::service::{SurveyDraft, SurveyError, SurveyService};

#[derive(Debug, Deserialize)]
pub(crate) struct AnswersRequest {
    pub(crate) answers: Vec<String>,
}

type Shared<S, D, E> = State<Arc<SurveyService<S, D, E>>>;

/// HTTP endpoints for authoring, answering and reviewing feedback surveys.
pub fn survey_router<S, D, E>(service: Arc<SurveyService<S, D, E>>) -> Router
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    Router::new()
        .route("/api/v1/surveys", post(create_handler::<S, D, E>))
        .route("/api/v1/surveys/assigned", get(assigned_handler::<S, D, E>))
        .route(
            "/api/v1/surveys/assigned-with-status",
            get(assigned_status_handler::<S, D, E>),
        )
        .route("/api/v1/surveys/created", get(created_handler::<S, D, E>))
        .route(
            "/api/v1/surveys/my-responses",
            get(my_responses_handler::<S, D, E>),
        )
        .route(
            "/api/v1/surveys/responses/:response_id",
            patch(update_response_handler::<S, D, E>),
        )
        .route(
            "/api/v1/surveys/:survey_id/my-response",
            get(my_response_handler::<S, D, E>).delete(delete_response_handler::<S, D, E>),
        )
        .route(
            "/api/v1/surveys/:survey_id/responses",
            get(responses_handler::<S, D, E>).post(respond_handler::<S, D, E>),
        )
        .with_state(service)
}

fn survey_error(err: SurveyError) -> Response {
    error_response(err.kind(), err.to_string())
}

fn reply<T: serde::Serialize>(status: StatusCode, result: Result<T, SurveyError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => survey_error(err),
    }
}

pub(crate) async fn create_handler<S, D, E>(
    State(service): Shared<S, D, E>,
    headers: HeaderMap,
    Json(draft): Json<SurveyDraft>,
) -> Response
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    reply(StatusCode::CREATED, service.create(&caller, draft))
}

pub(crate) async fn assigned_handler<S, D, E>(
    State(service): Shared<S, D, E>,
    headers: HeaderMap,
) -> Response
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    reply(StatusCode::OK, service.assigned(&caller))
}

pub(crate) async fn assigned_status_handler<S, D, E>(
    State(service): Shared<S, D, E>,
    headers: HeaderMap,
) -> Response
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    reply(StatusCode::OK, service.assigned_with_status(&caller))
}

pub(crate) async fn created_handler<S, D, E>(
    State(service): Shared<S, D, E>,
    headers: HeaderMap,
) -> Response
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    reply(StatusCode::OK, service.created(&caller))
}

pub(crate) async fn my_responses_handler<S, D, E>(
    State(service): Shared<S, D, E>,
    headers: HeaderMap,
) -> Response
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    reply(StatusCode::OK, service.my_responses(&caller))
}

pub(crate) async fn my_response_handler<S, D, E>(
    State(service): Shared<S, D, E>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
) -> Response
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    reply(
        StatusCode::OK,
        service.my_response(&caller, &SurveyId(survey_id)),
    )
}

pub(crate) async fn delete_response_handler<S, D, E>(
    State(service): Shared<S, D, E>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
) -> Response
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match service.delete_response(&caller, &SurveyId(survey_id)) {
        Ok(removed) => {
            let payload = json!({
                "response_id": removed.id,
                "survey_id": removed.survey_id,
                "deleted": true,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => survey_error(err),
    }
}

pub(crate) async fn responses_handler<S, D, E>(
    State(service): Shared<S, D, E>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
) -> Response
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    reply(StatusCode::OK, service.responses(&caller, &SurveyId(survey_id)))
}

pub(crate) async fn respond_handler<S, D, E>(
    State(service): Shared<S, D, E>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
    Json(request): Json<AnswersRequest>,
) -> Response
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    reply(
        StatusCode::CREATED,
        service.respond(&caller, &SurveyId(survey_id), request.answers),
    )
}

pub(crate) async fn update_response_handler<S, D, E>(
    State(service): Shared<S, D, E>,
    headers: HeaderMap,
    Path(response_id): Path<String>,
    Json(request): Json<AnswersRequest>,
) -> Response
where
    S: SurveyRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    reply(
        StatusCode::OK,
        service.update_response(&caller, &ResponseId(response_id), request.answers),
    )
}
