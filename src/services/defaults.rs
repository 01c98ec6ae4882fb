//! defaults.rs
//!
//! Настройки планирования студии: длительность сессии по умолчанию и
//! информационный буфер между сессиями. Строка создаётся лениво при первом
//! чтении из запасных значений конфигурации, чтобы у каждой студии после
//! первого обращения была своя редактируемая запись.

use sqlx::PgPool;

use crate::config::SchedulingConfig;
use crate::models::StudioDefaults;

/// Читает настройки студии, при отсутствии — создаёт строку из запасных
/// значений и возвращает её. Параллельные первые чтения сходятся на одной
/// строке за счёт `ON CONFLICT DO NOTHING`.
pub async fn get_or_seed_defaults(
    pool: &PgPool,
    cfg: &SchedulingConfig,
    studio_id: i64,
) -> Result<StudioDefaults, sqlx::Error> {
    if let Some(row) = fetch_defaults(pool, studio_id).await? {
        return Ok(row);
    }

    sqlx::query(
        "INSERT INTO studio_defaults (studio_id, default_session_length_hours, default_buffer_minutes)
         VALUES ($1, $2, $3)
         ON CONFLICT (studio_id) DO NOTHING",
    )
    .bind(studio_id)
    .bind(cfg.fallback_session_length_hours)
    .bind(cfg.fallback_buffer_minutes)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, StudioDefaults>(
        "SELECT studio_id, default_session_length_hours, default_buffer_minutes, updated_at
         FROM studio_defaults
         WHERE studio_id = $1",
    )
    .bind(studio_id)
    .fetch_one(pool)
    .await
}

/// Частичное обновление: незаданные поля сохраняют прежние значения.
pub async fn update_defaults(
    pool: &PgPool,
    cfg: &SchedulingConfig,
    studio_id: i64,
    length_hours: Option<i32>,
    buffer_minutes: Option<i32>,
) -> Result<StudioDefaults, sqlx::Error> {
    // Гарантируем, что строка существует, прежде чем частично её обновлять
    get_or_seed_defaults(pool, cfg, studio_id).await?;

    sqlx::query_as::<_, StudioDefaults>(
        "UPDATE studio_defaults
         SET default_session_length_hours = COALESCE($2, default_session_length_hours),
             default_buffer_minutes = COALESCE($3, default_buffer_minutes),
             updated_at = NOW()
         WHERE studio_id = $1
         RETURNING studio_id, default_session_length_hours, default_buffer_minutes, updated_at",
    )
    .bind(studio_id)
    .bind(length_hours)
    .bind(buffer_minutes)
    .fetch_one(pool)
    .await
}

async fn fetch_defaults(
    pool: &PgPool,
    studio_id: i64,
) -> Result<Option<StudioDefaults>, sqlx::Error> {
    sqlx::query_as::<_, StudioDefaults>(
        "SELECT studio_id, default_session_length_hours, default_buffer_minutes, updated_at
         FROM studio_defaults
         WHERE studio_id = $1",
    )
    .bind(studio_id)
    .fetch_optional(pool)
    .await
}
