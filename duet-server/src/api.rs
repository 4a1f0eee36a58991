use crate::app::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use duet_core::{DenyReason, DuetError, Feedback, IceConfig, Session, SessionId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

pub struct ApiError(DuetError);

impl From<DuetError> for ApiError {
    fn from(e: DuetError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DuetError::SessionNotFound(_)
            | DuetError::Authorization(DenyReason::SessionNotFound) => StatusCode::NOT_FOUND,
            DuetError::Authorization(_) => StatusCode::FORBIDDEN,
            DuetError::DuplicateFeedback { .. } | DuetError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            DuetError::Validation(_)
            | DuetError::FeedbackLocked
            | DuetError::NotYetJoinable { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DuetError::MediaAcquisition(_)
            | DuetError::Signaling(_)
            | DuetError::NetworkDisconnect(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub rating: u8,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub rooms: usize,
    pub connections: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        rooms: state.room_manager.active_rooms(),
        connections: state.signaling.connection_count(),
    })
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(session): Json<Session>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let session = state.sessions.create_session(session).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.sessions.get_session(&id, query.user_id).await?))
}

pub async fn complete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.sessions.complete_session(&id, req.user_id).await?))
}

pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(req): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<Feedback>), ApiError> {
    let feedback = state
        .sessions
        .submit_feedback(&id, req.from_user_id, req.to_user_id, req.rating, req.comments)
        .await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

pub async fn ice_config(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Json<IceConfig> {
    Json(state.ice.config_for(query.user_id))
}
