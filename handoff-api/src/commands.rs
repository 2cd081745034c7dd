//! The four HTTP handoff commands (§4.7), internal tasks only: `assign`,
//! `startHandoff`, `registerGreeting`, `markActivity`. Domain errors convert
//! to 400 when [`HandoffError::is_client_error`] holds, else 500 (§7).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use handoff_persistence::InternalTask;
use handoff_shared::HandoffError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(err: HandoffError) -> (StatusCode, Json<ErrorBody>) {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(ErrorBody { error: err.to_string() }))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub operator_id: String,
    pub operator_name: String,
}

pub async fn assign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<InternalTask>, (StatusCode, Json<ErrorBody>)> {
    state
        .internal
        .assign(id, &req.operator_id, &req.operator_name)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Debug, Deserialize)]
pub struct StartHandoffRequest {
    pub operator_id: String,
    pub operator_name: String,
    #[serde(default = "default_true")]
    pub send_greeting: bool,
}

fn default_true() -> bool {
    true
}

pub async fn start_handoff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StartHandoffRequest>,
) -> Result<Json<InternalTask>, (StatusCode, Json<ErrorBody>)> {
    state
        .internal
        .start_handoff(id, &req.operator_id, &req.operator_name, req.send_greeting)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn register_greeting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    state
        .internal
        .register_greeting(id)
        .await
        .map(|()| StatusCode::OK)
        .map_err(error_response)
}

pub async fn mark_activity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    state
        .internal
        .mark_activity(id)
        .await
        .map(|()| StatusCode::OK)
        .map_err(error_response)
}
