use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Настройки планирования студии. Строка создаётся лениво при первом чтении,
// после чего её можно редактировать.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudioDefaults {
    pub studio_id: i64,
    pub default_session_length_hours: i32,
    // Информационное поле: буфер не превращается в жёсткий зазор
    // при проверке пересечений
    pub default_buffer_minutes: i32,
    pub updated_at: DateTime<Utc>,
}
