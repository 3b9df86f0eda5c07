use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;

use crate::workflows::directory::Directory;
use crate::workflows::http::{caller_from, error_response};
use crate::workflows::notifications::EventPublisher;

use super::domain::{Decision, TrainingNeedPayload};
use super::repository::TrainingNeedRepository;
use super::service::{TrainingRequestService, WorkflowError};

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    pub(crate) decision: Decision,
}

/// HTTP endpoints for submitting, listing and deciding training requests.
pub fn training_router<R, D, E>(service: Arc<TrainingRequestService<R, D, E>>) -> Router
where
    R: TrainingNeedRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/training-requests",
            post(submit_handler::<R, D, E>).get(list_handler::<R, D, E>),
        )
        .route(
            "/api/v1/training-requests/mine",
            get(mine_handler::<R, D, E>),
        )
        .route(
            "/api/v1/training-requests/reviews",
            get(reviews_handler::<R, D, E>),
        )
        .route(
            "/api/v1/training-requests/:key",
            get(lookup_handler::<R, D, E>).delete(delete_handler::<R, D, E>),
        )
        .route(
            "/api/v1/training-requests/:key/decision",
            patch(decision_handler::<R, D, E>),
        )
        .with_state(service)
}

fn workflow_error(err: WorkflowError) -> Response {
    error_response(err.kind(), err.to_string())
}

pub(crate) async fn submit_handler<R, D, E>(
    State(service): State<Arc<TrainingRequestService<R, D, E>>>,
    headers: HeaderMap,
    axum::Json(payload): axum::Json<TrainingNeedPayload>,
) -> Response
where
    R: TrainingNeedRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match service.submit(&caller, payload) {
        Ok(receipt) => (StatusCode::CREATED, axum::Json(receipt)).into_response(),
        Err(err) => workflow_error(err),
    }
}

pub(crate) async fn list_handler<R, D, E>(
    State(service): State<Arc<TrainingRequestService<R, D, E>>>,
    headers: HeaderMap,
) -> Response
where
    R: TrainingNeedRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match service.list_visible(&caller) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(err) => workflow_error(err),
    }
}

pub(crate) async fn mine_handler<R, D, E>(
    State(service): State<Arc<TrainingRequestService<R, D, E>>>,
    headers: HeaderMap,
) -> Response
where
    R: TrainingNeedRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match service.my_requests(&caller) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(err) => workflow_error(err),
    }
}

pub(crate) async fn reviews_handler<R, D, E>(
    State(service): State<Arc<TrainingRequestService<R, D, E>>>,
    headers: HeaderMap,
) -> Response
where
    R: TrainingNeedRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match service.pending_reviews(&caller) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(err) => workflow_error(err),
    }
}

pub(crate) async fn lookup_handler<R, D, E>(
    State(service): State<Arc<TrainingRequestService<R, D, E>>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Response
where
    R: TrainingNeedRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match service.lookup(&caller, &key) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => workflow_error(err),
    }
}

pub(crate) async fn delete_handler<R, D, E>(
    State(service): State<Arc<TrainingRequestService<R, D, E>>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Response
where
    R: TrainingNeedRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match service.remove(&caller, &key) {
        Ok(record) => {
            let payload = serde_json::json!({
                "request_id": record.id,
                "request_number": record.request_number,
                "deleted": true,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => workflow_error(err),
    }
}

pub(crate) async fn decision_handler<R, D, E>(
    State(service): State<Arc<TrainingRequestService<R, D, E>>>,
    headers: HeaderMap,
    Path(key): Path<String>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    R: TrainingNeedRepository + 'static,
    D: Directory + 'static,
    E: EventPublisher + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match service.decide(&caller, &key, request.decision) {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(err) => workflow_error(err),
    }
}
