//! schedule.rs
//!
//! Календарное представление расписания студии.
//!
//! Возвращает бронирования, разложенные по корзинам "идут сейчас" /
//! "предстоящие" / "недавно завершённые" относительно текущего момента,
//! сгруппированные по локальным дням студии. Только чтение: никакого
//! влияния на хранимое состояние.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::FromRow;
use std::sync::Arc;

use crate::errors::ApiError;
use crate::middleware::{require_member, AuthUser};
use crate::services::schedule::{build_buckets, ScheduleEntry};
use crate::services::sessions;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/schedule", get(get_schedule))
}

#[derive(Debug, Deserialize)]
struct ScheduleQuery {
    pub studio_id: i64,
}

#[derive(Debug, FromRow)]
struct ScheduleRow {
    id: i64,
    room_id: i64,
    room_name: String,
    client_id: i64,
    client_name: String,
    engineer_id: Option<i64>,
    engineer_name: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    notes: Option<String>,
}

async fn get_schedule(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<ScheduleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_member(&state.db.pool, params.studio_id, user.member_id).await?;

    let zone = sessions::studio_zone(&state.db.pool, params.studio_id).await?;
    let now = Utc::now();

    // Окно чтения: от начала скользящего окна завершённых до бесконечности.
    // Запас в сутки закрывает разницу между границей окна по локальному
    // дню и границей по абсолютному времени.
    let window_days = state.config.scheduling.recent_window_days;
    let horizon = now - Duration::days(window_days + 1);

    let rows: Vec<ScheduleRow> = sqlx::query_as(
        r#"
        SELECT s.id, s.room_id, r.name AS room_name,
               s.client_id, c.name AS client_name,
               s.engineer_id, m.display_name AS engineer_name,
               s.start_time, s.end_time, s.status, s.notes
        FROM sessions s
        JOIN rooms r ON r.id = s.room_id
        JOIN clients c ON c.id = s.client_id
        LEFT JOIN members m ON m.member_id = s.engineer_id
        WHERE s.studio_id = $1
          AND s.end_time >= $2
        ORDER BY s.start_time
        "#,
    )
    .bind(params.studio_id)
    .bind(horizon)
    .fetch_all(&state.db.pool)
    .await?;

    let entries: Vec<ScheduleEntry> = rows
        .into_iter()
        .map(|row| {
            let live = row.status != "cancelled"
                && row.status != "completed"
                && row.start_time <= now
                && now < row.end_time;
            ScheduleEntry {
                id: row.id,
                room_id: row.room_id,
                room_name: row.room_name,
                client_id: row.client_id,
                client_name: row.client_name,
                engineer_id: row.engineer_id,
                engineer_name: row.engineer_name,
                start_time: row.start_time,
                end_time: row.end_time,
                status: row.status,
                live,
                notes: row.notes,
            }
        })
        .collect();

    let buckets = build_buckets(&entries, now, &zone, window_days);

    Ok((StatusCode::OK, Json(buckets)))
}
