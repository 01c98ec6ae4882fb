use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::errors::ApiError;
use crate::middleware::{require_admin, require_member, AuthUser};
use crate::services::defaults;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/defaults", get(get_defaults))
        .route("/defaults", patch(update_defaults))
}

// GET /api/defaults
#[derive(Debug, Deserialize)]
struct DefaultsQuery {
    pub studio_id: i64,
}

async fn get_defaults(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<DefaultsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_member(&state.db.pool, params.studio_id, user.member_id).await?;

    // при первом чтении строка создаётся из запасных значений
    let row = defaults::get_or_seed_defaults(
        &state.db.pool,
        &state.config.scheduling,
        params.studio_id,
    )
    .await?;

    Ok((StatusCode::OK, Json(row)))
}

// PATCH /api/defaults
#[derive(Debug, Deserialize)]
struct UpdateDefaultsRequest {
    pub studio_id: i64,
    pub length_hours: Option<i32>,
    pub buffer_minutes: Option<i32>,
}

async fn update_defaults(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpdateDefaultsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state.db.pool, req.studio_id, user.member_id).await?;

    if let Some(hours) = req.length_hours {
        if hours <= 0 {
            return Err(ApiError::Validation(
                "length_hours должен быть > 0".to_string(),
            ));
        }
    }
    if let Some(minutes) = req.buffer_minutes {
        if minutes < 0 {
            return Err(ApiError::Validation(
                "buffer_minutes должен быть >= 0".to_string(),
            ));
        }
    }

    let row = defaults::update_defaults(
        &state.db.pool,
        &state.config.scheduling,
        req.studio_id,
        req.length_hours,
        req.buffer_minutes,
    )
    .await?;

    Ok((StatusCode::OK, Json(row)))
}
