use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::ApiError;
use crate::middleware::{require_admin, require_member, AuthUser};
use crate::models::{GearAssignment, StudioSession};
use crate::services::gear::{self, GearWarning};
use crate::services::sessions;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions/gear", get(list_gear))
        .route("/sessions/gear", post(add_gear))
        .route("/sessions/gear", delete(remove_gear))
}

/* ---------- helpers ---------- */

async fn load_session(state: &AppState, session_id: i64) -> Result<StudioSession, ApiError> {
    sessions::get_session(&state.db.pool, session_id)
        .await?
        .ok_or(ApiError::NotFound("Сессия не найдена"))
}

// Единица оборудования должна относиться к той же студии, что и сессия
async fn ensure_gear_in_studio(
    pool: &sqlx::PgPool,
    gear_id: i64,
    studio_id: i64,
) -> Result<(), ApiError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM gear_items WHERE id = $1 AND studio_id = $2)",
    )
    .bind(gear_id)
    .bind(studio_id)
    .fetch_one(pool)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(ApiError::NotFound("Оборудование не найдено"))
    }
}

/* ---------- GEAR ---------- */

// GET /api/sessions/gear
#[derive(Debug, Deserialize)]
struct ListGearQuery {
    pub session_id: i64,
}

#[derive(Debug, Serialize)]
struct ListGearResponse {
    pub assignments: Vec<GearAssignment>,
    // рекомендательные предупреждения: никогда не блокируют сохранение
    pub warnings: Vec<GearWarning>,
}

async fn list_gear(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<ListGearQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_session(&state, params.session_id).await?;
    require_member(&state.db.pool, session.studio_id, user.member_id).await?;

    let assignments = gear::list_assignments(&state.db.pool, session.id).await?;
    let warnings = gear::availability_warnings(&assignments);

    Ok((
        StatusCode::OK,
        Json(ListGearResponse {
            assignments,
            warnings,
        }),
    ))
}

// POST /api/sessions/gear
#[derive(Debug, Deserialize)]
struct AddGearRequest {
    pub session_id: i64,
    pub gear_id: i64,
    pub note: Option<String>,
}

async fn add_gear(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<AddGearRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_session(&state, req.session_id).await?;
    require_admin(&state.db.pool, session.studio_id, user.member_id).await?;

    ensure_gear_in_studio(&state.db.pool, req.gear_id, session.studio_id).await?;

    // повторное добавление — no-op
    gear::add_assignment(&state.db.pool, session.id, req.gear_id, req.note.as_deref()).await?;

    let assignments = gear::list_assignments(&state.db.pool, session.id).await?;
    let warnings = gear::availability_warnings(&assignments);

    Ok((
        StatusCode::CREATED,
        Json(ListGearResponse {
            assignments,
            warnings,
        }),
    ))
}

// DELETE /api/sessions/gear
#[derive(Debug, Deserialize)]
struct RemoveGearRequest {
    pub session_id: i64,
    pub gear_id: i64,
}

async fn remove_gear(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<RemoveGearRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_session(&state, req.session_id).await?;
    require_admin(&state.db.pool, session.studio_id, user.member_id).await?;

    // снятие несуществующей привязки не ошибка
    gear::remove_assignment(&state.db.pool, session.id, req.gear_id).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Оборудование снято с сессии"})),
    ))
}
