//! sessions.rs
//!
//! Жизненный цикл сессии: создание, обновление, смена статуса, удаление.
//!
//! Ключевые части:
//! 1.  **Разбор и вычисление границ**: дата "YYYY-MM-DD" и время "HH:MM"
//!     интерпретируются в часовом поясе студии; не указанное окончание
//!     выводится из настроек студии, окончание "раньше" начала переносится
//!     на следующий день (ночные сессии).
//! 2.  **Проверки принадлежности**: комната, клиент и инженер должны
//!     относиться к той же студии; чужие записи неотличимы от
//!     несуществующих.
//! 3.  **Транзакционная запись**: проверка пересечений по комнате и
//!     инженеру и сама запись выполняются в одной транзакции; ошибка на
//!     любом шаге откатывает всё целиком.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;

use crate::config::SchedulingConfig;
use crate::errors::ApiError;
use crate::models::{SessionStatus, Studio, StudioSession};
use crate::services::conflicts::{self, ResourceKind};
use crate::services::defaults;
use crate::services::schedule::{shift_iso_date, StudioZone};

const SESSION_COLUMNS: &str =
    "id, studio_id, room_id, client_id, engineer_id, start_time, end_time, status, notes, created_at, updated_at";

pub struct NewSessionInput {
    pub studio_id: i64,
    pub date: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub room_id: i64,
    pub client_id: i64,
    pub engineer_id: Option<i64>,
    pub notes: Option<String>,
}

/// Частичное обновление: отсутствующие поля сохраняют прежние значения.
/// Исключение — инженер: его назначение перезаписывается всегда,
/// отсутствие значения снимает инженера с сессии.
pub struct SessionUpdateInput {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub room_id: Option<i64>,
    pub client_id: Option<i64>,
    pub engineer_id: Option<i64>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/* ---------- разбор даты и времени ---------- */

pub fn parse_session_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Дата должна быть в формате YYYY-MM-DD".to_string()))
}

pub fn parse_session_time(s: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| ApiError::Validation("Время должно быть в формате HH:MM".to_string()))
}

/// Вычисляет абсолютные границы сессии из строк запроса.
///
/// Окончание, равное началу или более раннее, переносится на следующий
/// календарный день — так записываются ночные сессии (22:00 - 02:00).
/// Без окончания берётся начало плюс длительность по умолчанию.
pub fn resolve_session_times(
    zone: &StudioZone,
    date_str: &str,
    start_str: &str,
    end_str: Option<&str>,
    default_length_hours: i32,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    let date = parse_session_date(date_str)?;
    let start_time = parse_session_time(start_str)?;

    let start = zone
        .compose_utc(date, start_time)
        .ok_or_else(|| ApiError::Validation("Недопустимое локальное время начала".to_string()))?;

    let end = match end_str {
        Some(s) => {
            let end_time = parse_session_time(s)?;
            let same_day = zone.compose_utc(date, end_time).ok_or_else(|| {
                ApiError::Validation("Недопустимое локальное время окончания".to_string())
            })?;
            if same_day > start {
                same_day
            } else {
                // ночная сессия: окончание на следующий день
                let next = date
                    .checked_add_days(Days::new(1))
                    .ok_or_else(|| ApiError::Validation("Дата вне допустимого диапазона".to_string()))?;
                zone.compose_utc(next, end_time).ok_or_else(|| {
                    ApiError::Validation("Недопустимое локальное время окончания".to_string())
                })?
            }
        }
        None => {
            if default_length_hours <= 0 {
                return Err(ApiError::Validation(
                    "Длительность по умолчанию должна быть > 0".to_string(),
                ));
            }
            start + Duration::hours(default_length_hours as i64)
        }
    };

    Ok((start, end))
}

/* ---------- чтение ---------- */

pub async fn get_session(
    pool: &PgPool,
    session_id: i64,
) -> Result<Option<StudioSession>, sqlx::Error> {
    sqlx::query_as::<_, StudioSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await
}

/// Сессии студии, опционально ограниченные включительными границами
/// "YYYY-MM-DD" (разворачиваются в полные локальные сутки студии).
pub async fn list_sessions(
    pool: &PgPool,
    zone: &StudioZone,
    studio_id: i64,
    from_key: Option<&str>,
    to_key: Option<&str>,
) -> Result<Vec<StudioSession>, ApiError> {
    let from_bound = match from_key {
        Some(key) => Some(zone.day_start_utc(key).ok_or_else(|| {
            ApiError::Validation("Граница from должна быть в формате YYYY-MM-DD".to_string())
        })?),
        None => None,
    };
    // включительная граница to: начало следующего дня, строго меньше
    let to_bound = match to_key {
        Some(key) => {
            let next = shift_iso_date(key, 1).ok_or_else(|| {
                ApiError::Validation("Граница to должна быть в формате YYYY-MM-DD".to_string())
            })?;
            Some(zone.day_start_utc(&next).ok_or_else(|| {
                ApiError::Validation("Граница to должна быть в формате YYYY-MM-DD".to_string())
            })?)
        }
        None => None,
    };

    let mut q = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE studio_id = $1");
    let mut bind_idx = 2;
    if from_bound.is_some() {
        q.push_str(&format!(" AND start_time >= ${}", bind_idx));
        bind_idx += 1;
    }
    if to_bound.is_some() {
        q.push_str(&format!(" AND start_time < ${}", bind_idx));
    }
    q.push_str(" ORDER BY start_time");

    let mut dbq = sqlx::query_as::<_, StudioSession>(&q).bind(studio_id);
    if let Some(from) = from_bound {
        dbq = dbq.bind(from);
    }
    if let Some(to) = to_bound {
        dbq = dbq.bind(to);
    }

    Ok(dbq.fetch_all(pool).await?)
}

/* ---------- создание ---------- */

pub async fn create_session(
    pool: &PgPool,
    cfg: &SchedulingConfig,
    input: NewSessionInput,
) -> Result<StudioSession, ApiError> {
    // 1. Дешёвая валидация до любых запросов к хранилищу
    if input.room_id <= 0 {
        return Err(ApiError::Validation("room_id должен быть > 0".to_string()));
    }
    if input.client_id <= 0 {
        return Err(ApiError::Validation("client_id должен быть > 0".to_string()));
    }
    parse_session_date(&input.date)?;
    parse_session_time(&input.start_time)?;
    if let Some(end_str) = input.end_time.as_deref() {
        parse_session_time(end_str)?;
    }

    // 2. Студия и её часовой пояс
    let zone = studio_zone(pool, input.studio_id).await?;

    // Длительность по умолчанию нужна только при опущенном окончании
    let default_length_hours = if input.end_time.is_none() {
        defaults::get_or_seed_defaults(pool, cfg, input.studio_id)
            .await?
            .default_session_length_hours
    } else {
        cfg.fallback_session_length_hours
    };

    // 3. Абсолютные границы
    let (start, end) = resolve_session_times(
        &zone,
        &input.date,
        &input.start_time,
        input.end_time.as_deref(),
        default_length_hours,
    )?;

    // 4. Комната и клиент принадлежат студии
    ensure_room_in_studio(pool, input.room_id, input.studio_id).await?;
    ensure_client_in_studio(pool, input.client_id, input.studio_id).await?;

    // 5. Инженер, если указан, состоит в студии
    if let Some(engineer_id) = input.engineer_id {
        ensure_engineer_in_studio(pool, engineer_id, input.studio_id).await?;
    }

    // 6-8. Проверки пересечений и запись в одной транзакции
    let mut tx = pool.begin().await?;

    if let Some(conflict) = conflicts::find_conflict(
        &mut *tx,
        input.studio_id,
        ResourceKind::Room,
        input.room_id,
        start,
        end,
        None,
    )
    .await?
    {
        return Err(ApiError::Conflict {
            resource: ResourceKind::Room.label(),
            info: Some(conflict),
        });
    }

    if let Some(engineer_id) = input.engineer_id {
        if let Some(conflict) = conflicts::find_conflict(
            &mut *tx,
            input.studio_id,
            ResourceKind::Engineer,
            engineer_id,
            start,
            end,
            None,
        )
        .await?
        {
            return Err(ApiError::Conflict {
                resource: ResourceKind::Engineer.label(),
                info: Some(conflict),
            });
        }
    }

    let session: StudioSession = sqlx::query_as(&format!(
        "INSERT INTO sessions (studio_id, room_id, client_id, engineer_id, start_time, end_time, status, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(input.studio_id)
    .bind(input.room_id)
    .bind(input.client_id)
    .bind(input.engineer_id)
    .bind(start)
    .bind(end)
    .bind(SessionStatus::Scheduled.as_str())
    .bind(input.notes.as_deref())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| ApiError::from_write_error(e, "Ресурс"))?;

    tx.commit().await?;
    Ok(session)
}

/* ---------- обновление ---------- */

pub async fn update_session(
    pool: &PgPool,
    current: &StudioSession,
    input: SessionUpdateInput,
) -> Result<StudioSession, ApiError> {
    let start = input.start_at.unwrap_or(current.start_time);
    let end = input.end_at.unwrap_or(current.end_time);
    // здесь, в отличие от создания, без переноса на следующий день:
    // вызывающий передаёт готовые метки времени
    if end <= start {
        return Err(ApiError::Validation(
            "Окончание должно быть позже начала".to_string(),
        ));
    }

    let status = match input.status.as_deref() {
        Some(requested) => {
            let to = SessionStatus::parse_requested(requested).ok_or_else(|| {
                ApiError::Validation(format!("Недопустимый статус: {}", requested))
            })?;
            let from = stored_status(current)?;
            if !from.can_transition(to) {
                return Err(ApiError::Validation(format!(
                    "Недопустимый переход статуса: {} -> {}",
                    from.as_str(),
                    to.as_str()
                )));
            }
            to.as_str().to_string()
        }
        None => current.status.clone(),
    };

    let room_id = input.room_id.unwrap_or(current.room_id);
    let client_id = input.client_id.unwrap_or(current.client_id);
    let engineer_id = input.engineer_id;

    if let Some(new_room) = input.room_id {
        ensure_room_in_studio(pool, new_room, current.studio_id).await?;
    }
    if let Some(new_client) = input.client_id {
        ensure_client_in_studio(pool, new_client, current.studio_id).await?;
    }
    if let Some(new_engineer) = engineer_id {
        ensure_engineer_in_studio(pool, new_engineer, current.studio_id).await?;
    }

    let notes = match input.notes {
        Some(n) => Some(n),
        None => current.notes.clone(),
    };

    let mut tx = pool.begin().await?;

    // собственная строка исключается, чтобы сессия не конфликтовала
    // со своей же старой версией
    if let Some(conflict) = conflicts::find_conflict(
        &mut *tx,
        current.studio_id,
        ResourceKind::Room,
        room_id,
        start,
        end,
        Some(current.id),
    )
    .await?
    {
        return Err(ApiError::Conflict {
            resource: ResourceKind::Room.label(),
            info: Some(conflict),
        });
    }

    if let Some(engineer) = engineer_id {
        if let Some(conflict) = conflicts::find_conflict(
            &mut *tx,
            current.studio_id,
            ResourceKind::Engineer,
            engineer,
            start,
            end,
            Some(current.id),
        )
        .await?
        {
            return Err(ApiError::Conflict {
                resource: ResourceKind::Engineer.label(),
                info: Some(conflict),
            });
        }
    }

    let session: StudioSession = sqlx::query_as(&format!(
        "UPDATE sessions
         SET room_id = $2, client_id = $3, engineer_id = $4,
             start_time = $5, end_time = $6, status = $7, notes = $8,
             updated_at = NOW()
         WHERE id = $1
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(current.id)
    .bind(room_id)
    .bind(client_id)
    .bind(engineer_id)
    .bind(start)
    .bind(end)
    .bind(&status)
    .bind(notes.as_deref())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| ApiError::from_write_error(e, "Ресурс"))?;

    tx.commit().await?;
    Ok(session)
}

/* ---------- смена статуса и удаление ---------- */

pub async fn update_status(
    pool: &PgPool,
    current: &StudioSession,
    requested: &str,
) -> Result<SessionStatus, ApiError> {
    let to = SessionStatus::parse_requested(requested)
        .ok_or_else(|| ApiError::Validation(format!("Недопустимый статус: {}", requested)))?;
    let from = stored_status(current)?;
    if !from.can_transition(to) {
        return Err(ApiError::Validation(format!(
            "Недопустимый переход статуса: {} -> {}",
            from.as_str(),
            to.as_str()
        )));
    }

    // восстановление отменённой сессии может упереться в занятый слот:
    // ограничение исключения в БД вернёт конфликт
    sqlx::query("UPDATE sessions SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(current.id)
        .bind(to.as_str())
        .execute(pool)
        .await
        .map_err(|e| ApiError::from_write_error(e, "Ресурс"))?;

    Ok(to)
}

pub async fn delete_session(
    pool: &PgPool,
    studio_id: i64,
    session_id: i64,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = $1 AND studio_id = $2")
        .bind(session_id)
        .bind(studio_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Сессия не найдена"));
    }
    Ok(())
}

/* ---------- вспомогательные проверки ---------- */

pub async fn studio_zone(pool: &PgPool, studio_id: i64) -> Result<StudioZone, ApiError> {
    let studio: Option<Studio> =
        sqlx::query_as("SELECT id, name, timezone, created_at FROM studios WHERE id = $1")
            .bind(studio_id)
            .fetch_optional(pool)
            .await?;

    match studio {
        Some(studio) => Ok(StudioZone::resolve(studio.timezone.as_deref())),
        None => Err(ApiError::NotFound("Студия не найдена")),
    }
}

fn stored_status(session: &StudioSession) -> Result<SessionStatus, ApiError> {
    SessionStatus::parse_stored(&session.status).ok_or_else(|| {
        ApiError::Validation(format!("Неизвестный статус в записи: {}", session.status))
    })
}

async fn ensure_room_in_studio(
    pool: &PgPool,
    room_id: i64,
    studio_id: i64,
) -> Result<(), ApiError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM rooms WHERE id = $1 AND studio_id = $2)",
    )
    .bind(room_id)
    .bind(studio_id)
    .fetch_one(pool)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(ApiError::NotFound("Комната не найдена"))
    }
}

async fn ensure_client_in_studio(
    pool: &PgPool,
    client_id: i64,
    studio_id: i64,
) -> Result<(), ApiError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM clients WHERE id = $1 AND studio_id = $2)",
    )
    .bind(client_id)
    .bind(studio_id)
    .fetch_one(pool)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(ApiError::NotFound("Клиент не найден"))
    }
}

async fn ensure_engineer_in_studio(
    pool: &PgPool,
    engineer_id: i64,
    studio_id: i64,
) -> Result<(), ApiError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM studio_members WHERE member_id = $1 AND studio_id = $2)",
    )
    .bind(engineer_id)
    .bind(studio_id)
    .fetch_one(pool)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(ApiError::NotFound("Инженер не найден"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc_zone() -> StudioZone {
        StudioZone::Named(chrono_tz::UTC)
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn overnight_end_rolls_to_next_day() {
        let (start, end) =
            resolve_session_times(&utc_zone(), "2024-01-01", "22:00", Some("02:00"), 2).unwrap();
        assert_eq!(start, at("2024-01-01T22:00:00Z"));
        assert_eq!(end, at("2024-01-02T02:00:00Z"));
        assert_eq!(end - start, Duration::hours(4));
    }

    #[test]
    fn equal_end_rolls_to_next_day() {
        let (start, end) =
            resolve_session_times(&utc_zone(), "2024-01-01", "10:00", Some("10:00"), 2).unwrap();
        assert_eq!(end - start, Duration::hours(24));
    }

    #[test]
    fn missing_end_uses_default_length() {
        let (start, end) =
            resolve_session_times(&utc_zone(), "2024-06-15", "09:00", None, 3).unwrap();
        assert_eq!(start, at("2024-06-15T09:00:00Z"));
        assert_eq!(end, at("2024-06-15T12:00:00Z"));
    }

    #[test]
    fn malformed_date_rejected() {
        assert!(matches!(
            resolve_session_times(&utc_zone(), "01-01-2024", "10:00", None, 2),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            resolve_session_times(&utc_zone(), "2024-01-41", "10:00", None, 2),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn malformed_time_rejected() {
        assert!(matches!(
            resolve_session_times(&utc_zone(), "2024-01-01", "25:00", None, 2),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            resolve_session_times(&utc_zone(), "2024-01-01", "10:00", Some("abc"), 2),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn nonpositive_default_length_rejected() {
        assert!(matches!(
            resolve_session_times(&utc_zone(), "2024-01-01", "10:00", None, 0),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn times_composed_in_studio_zone() {
        let tokyo = StudioZone::Named(chrono_tz::Asia::Tokyo);
        let (start, _) =
            resolve_session_times(&tokyo, "2024-06-15", "09:00", Some("11:00"), 2).unwrap();
        // 09:00 в Токио = 00:00 UTC
        assert_eq!(start, at("2024-06-15T00:00:00Z"));
    }
}
