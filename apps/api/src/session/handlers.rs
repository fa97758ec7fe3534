use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Event, EventType};
use crate::models::session::{SessionConfig, Turn};
use crate::session::manager::StartedSession;
use crate::session::models::{InterviewResult, StatsRecord};
use crate::state::AppState;

const DEFAULT_EVENT_LIMIT: usize = 100;
const MAX_EVENT_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(alias = "text", alias = "message")]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub event_type: Option<EventType>,
    pub limit: Option<usize>,
}

/// POST /api/v1/sessions
pub async fn handle_start_session(
    State(state): State<AppState>,
    Json(config): Json<SessionConfig>,
) -> Result<(StatusCode, Json<StartedSession>), AppError> {
    let started = state.sessions.start(config).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// POST /api/v1/sessions/:id/messages
pub async fn handle_send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<Turn>, AppError> {
    let turn = state.sessions.send_message(id, &req.content).await?;
    Ok(Json(turn))
}

/// POST /api/v1/sessions/:id/end
pub async fn handle_end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewResult>, AppError> {
    Ok(Json(state.sessions.end_interview(id).await?))
}

/// GET /api/v1/sessions/:id/history
pub async fn handle_get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Turn>>, AppError> {
    Ok(Json(state.sessions.get_history(id).await?))
}

/// GET /api/v1/sessions/:id/stats
pub async fn handle_get_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatsRecord>, AppError> {
    Ok(Json(state.sessions.get_stats(id).await?))
}

/// POST /api/v1/sessions/:id/agents/:agent
pub async fn handle_request_agent(
    State(state): State<AppState>,
    Path((id, agent)): Path<(Uuid, String)>,
) -> Result<Json<Turn>, AppError> {
    Ok(Json(state.sessions.request_agent(id, &agent).await?))
}

/// GET /api/v1/events?event_type=&limit=
pub async fn handle_list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Result<Json<Vec<Event>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    if limit == 0 || limit > MAX_EVENT_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_EVENT_LIMIT}"
        )));
    }
    Ok(Json(state.events.history(query.event_type, limit)))
}
