use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

use crate::errors::ApiError;
use crate::models::Member;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub member_id: i64,
    pub email: String,
    pub display_name: String,
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Получаем заголовок Authorization
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        // Проверяем что это Basic auth
        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(ApiError::Unauthorized)?;

        // Декодируем base64
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| ApiError::Unauthorized)?;

        let credentials = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

        // Разделяем email:password
        let mut parts = credentials.splitn(2, ':');
        let email = parts.next().ok_or(ApiError::Unauthorized)?;
        let password = parts.next().ok_or(ApiError::Unauthorized)?;

        let row: Option<Member> = sqlx::query_as(
            "SELECT member_id, email, password_hash, display_name, is_active
             FROM members
             WHERE email = $1 AND is_active = true",
        )
        .bind(email)
        .fetch_optional(&state.db.pool)
        .await?;

        let member = row.ok_or(ApiError::Unauthorized)?;

        if !bcrypt::verify(password, &member.password_hash).unwrap_or(false) {
            return Err(ApiError::Unauthorized);
        }

        Ok(AuthUser {
            member_id: member.member_id,
            email: member.email,
            display_name: member.display_name,
        })
    }
}

/// Участник студии с любой ролью. Для чтений.
pub async fn require_member(
    pool: &sqlx::PgPool,
    studio_id: i64,
    member_id: i64,
) -> Result<(), ApiError> {
    let is_member = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM studio_members WHERE studio_id = $1 AND member_id = $2)",
    )
    .bind(studio_id)
    .bind(member_id)
    .fetch_one(pool)
    .await?;

    if is_member {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Владелец или администратор студии. Для всех мутирующих операций.
pub async fn require_admin(
    pool: &sqlx::PgPool,
    studio_id: i64,
    member_id: i64,
) -> Result<(), ApiError> {
    let is_admin = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM studio_members
            WHERE studio_id = $1 AND member_id = $2 AND role IN ('owner', 'admin')
        )",
    )
    .bind(studio_id)
    .bind(member_id)
    .fetch_one(pool)
    .await?;

    if is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
