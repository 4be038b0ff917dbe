use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use casetrack_core::case::{CaseFilter, CaseStatus, CreateCase, UpdateCase};
use casetrack_service::{CaseService, ServiceError};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/cases", get(list_cases).post(create_case))
        .route(
            "/api/cases/{id}",
            get(get_case).put(update_case).delete(delete_case),
        )
        .route("/api/cases/count-by-status", get(count_by_status))
}

#[derive(Debug, Deserialize)]
struct CaseQuery {
    status: Option<String>,
    submitted_by: Option<String>,
    assigned_to: Option<String>,
    limit: Option<i64>,
}

async fn list_cases(
    State(state): State<AppState>,
    Query(q): Query<CaseQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let filter = CaseFilter {
        status: q.status.and_then(|s| CaseStatus::from_str(&s)),
        submitted_by: q.submitted_by,
        assigned_to: q.assigned_to,
        limit: q.limit,
    };
    state
        .service
        .list_cases(&filter)
        .await
        .map(|c| Json(json!(c)))
        .map_err(to_error)
}

async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .resolve_case(&id)
        .await
        .map(|c| Json(json!(c)))
        .map_err(to_error)
}

async fn create_case(
    State(state): State<AppState>,
    Json(input): Json<CreateCase>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    state
        .service
        .create_case(&input)
        .await
        .map(|c| (StatusCode::CREATED, Json(json!(c))))
        .map_err(to_error)
}

async fn update_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateCase>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .update_case(&id, &input)
        .await
        .map(|c| Json(json!(c)))
        .map_err(to_error)
}

async fn delete_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    state
        .service
        .delete_case(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

async fn count_by_status(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .count_cases_by_status()
        .await
        .map(|counts| {
            let map: serde_json::Map<String, Value> = counts
                .into_iter()
                .map(|(status, n)| (status, json!(n)))
                .collect();
            Json(Value::Object(map))
        })
        .map_err(to_error)
}

pub(super) fn to_error(e: ServiceError) -> (StatusCode, Json<Value>) {
    match &e {
        ServiceError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": e.to_string(), "error": "not_found" })),
        ),
        ServiceError::InvalidInput(_) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": e.to_string(), "error": "invalid_input" })),
        ),
        ServiceError::Internal(detail) => {
            error!(%detail, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "internal server error", "error": "internal" })),
            )
        }
    }
}
