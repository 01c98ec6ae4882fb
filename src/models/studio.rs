use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Studio {
    pub id: i64,
    pub name: String,
    // IANA-имя часового пояса; NULL = часовой пояс сервера
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
}
