use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::ApiError;
use crate::middleware::{require_admin, require_member, AuthUser};
use crate::models::StudioSession;
use crate::services::sessions::{self, NewSessionInput, SessionUpdateInput};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions", post(create_session))
        .route("/sessions", patch(update_session))
        .route("/sessions", delete(delete_session))
        .route("/sessions/status", patch(update_session_status))
}

/* ---------- helpers ---------- */

// Сессия по id; чужая или несуществующая — неразличимо "не найдена"
async fn load_session(state: &AppState, session_id: i64) -> Result<StudioSession, ApiError> {
    sessions::get_session(&state.db.pool, session_id)
        .await?
        .ok_or(ApiError::NotFound("Сессия не найдена"))
}

/* ---------- SESSIONS ---------- */

// POST /api/sessions
#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    pub studio_id: i64,
    pub date: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub room_id: i64,
    pub client_id: i64,
    pub engineer_id: Option<i64>,
    pub notes: Option<String>,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Авторизация раньше любой валидации
    require_admin(&state.db.pool, req.studio_id, user.member_id).await?;

    let session = sessions::create_session(
        &state.db.pool,
        &state.config.scheduling,
        NewSessionInput {
            studio_id: req.studio_id,
            date: req.date,
            start_time: req.start_time,
            end_time: req.end_time,
            room_id: req.room_id,
            client_id: req.client_id,
            engineer_id: req.engineer_id,
            notes: req.notes,
        },
    )
    .await?;

    tracing::info!(
        "session {} created in studio {} ({} - {})",
        session.id, session.studio_id, session.start_time, session.end_time
    );

    Ok((StatusCode::CREATED, Json(session)))
}

// GET /api/sessions
#[derive(Debug, Deserialize)]
struct ListSessionsQuery {
    pub studio_id: i64,
    pub from: Option<String>,
    pub to: Option<String>,
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<ListSessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_member(&state.db.pool, params.studio_id, user.member_id).await?;

    let zone = sessions::studio_zone(&state.db.pool, params.studio_id).await?;
    let list = sessions::list_sessions(
        &state.db.pool,
        &zone,
        params.studio_id,
        params.from.as_deref(),
        params.to.as_deref(),
    )
    .await?;

    Ok((StatusCode::OK, Json(list)))
}

// PATCH /api/sessions
#[derive(Debug, Deserialize)]
struct UpdateSessionRequest {
    pub session_id: i64,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub room_id: Option<i64>,
    pub client_id: Option<i64>,
    pub engineer_id: Option<i64>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

async fn update_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = load_session(&state, req.session_id).await?;
    require_admin(&state.db.pool, current.studio_id, user.member_id).await?;

    let session = sessions::update_session(
        &state.db.pool,
        &current,
        SessionUpdateInput {
            start_at: req.start_at,
            end_at: req.end_at,
            room_id: req.room_id,
            client_id: req.client_id,
            engineer_id: req.engineer_id,
            status: req.status,
            notes: req.notes,
        },
    )
    .await?;

    Ok((StatusCode::OK, Json(session)))
}

// PATCH /api/sessions/status
#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    pub session_id: i64,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct UpdateStatusResponse {
    pub status: &'static str,
}

async fn update_session_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = load_session(&state, req.session_id).await?;
    require_admin(&state.db.pool, current.studio_id, user.member_id).await?;

    let status = sessions::update_status(&state.db.pool, &current, &req.status).await?;

    Ok((
        StatusCode::OK,
        Json(UpdateStatusResponse {
            status: status.as_str(),
        }),
    ))
}

// DELETE /api/sessions
#[derive(Debug, Deserialize)]
struct DeleteSessionQuery {
    pub session_id: i64,
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<DeleteSessionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let current = load_session(&state, params.session_id).await?;
    require_admin(&state.db.pool, current.studio_id, user.member_id).await?;

    // удаление безусловное: без мягкого удаления и повторных проверок
    sessions::delete_session(&state.db.pool, current.studio_id, current.id).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Сессия удалена"})),
    ))
}
