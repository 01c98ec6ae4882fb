//! errors.rs
//!
//! Типизированные ошибки ядра планирования и их отображение в HTTP-ответы.
//!
//! Классы ошибок:
//! - **Unauthorized / Forbidden** — проверяются до любой валидации.
//! - **Validation** — некорректные строки даты/времени, пустые поля, end <= start.
//! - **NotFound** — ресурс не существует или принадлежит другой студии
//!   (ответ неотличим, чтобы не раскрывать чужие данные).
//! - **Conflict** — пересечение по комнате или инженеру; несёт сводку
//!   конфликтующего бронирования для точного сообщения.
//! - **Storage** — ошибка хранилища, наружу уходит обёрнутое сообщение.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Сводка о пересекающемся бронировании: кто занял ресурс и на какое время.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictInfo {
    pub session_id: i64,
    pub counterpart: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Требуется авторизация")]
    Unauthorized,

    #[error("Недостаточно прав для этой операции")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(&'static str),

    /// Пересечение интервалов по ресурсу. `info` пуст только в случае,
    /// когда гонку поймало ограничение БД и конфликтующей строки под рукой нет.
    #[error("Пересечение по ресурсу: {resource}")]
    Conflict {
        resource: &'static str,
        info: Option<ConflictInfo>,
    },

    #[error("Ошибка базы данных")]
    Storage(#[from] sqlx::Error),
}

impl ApiError {
    /// Превращает ошибку записи в `Conflict`, если её вызвало ограничение
    /// исключения интервалов (код Postgres 23P01), иначе — в `Storage`.
    pub fn from_write_error(err: sqlx::Error, resource: &'static str) -> ApiError {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23P01") {
                return ApiError::Conflict {
                    resource,
                    info: None,
                };
            }
        }
        ApiError::Storage(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(json!({"error": "Требуется авторизация"})))
                    .into_response()
            }
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "Недостаточно прав для этой операции"})),
            )
                .into_response(),
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({"error": msg}))).into_response()
            }
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({"error": msg}))).into_response()
            }
            ApiError::Conflict { resource, info } => {
                let body = match info {
                    Some(info) => json!({
                        "error": format!(
                            "{} уже занят: пересечение с бронированием клиента {}",
                            resource, info.counterpart
                        ),
                        "conflict": info,
                    }),
                    None => json!({
                        "error": format!("{} уже занят на это время", resource),
                    }),
                };
                (StatusCode::CONFLICT, Json(body)).into_response()
            }
            ApiError::Storage(err) => {
                tracing::error!("storage error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Ошибка базы данных"})),
                )
                    .into_response()
            }
        }
    }
}
