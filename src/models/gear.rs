use serde::Serialize;
use sqlx::FromRow;

// Привязка оборудования к сессии, соединённая с карточкой оборудования
// для отображения. Количество на привязку всегда 1; quantity — остаток
// на складе студии (0 = неучитываемый запас).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GearAssignment {
    pub session_id: i64,
    pub gear_id: i64,
    pub brand: String,
    pub model: String,
    pub category: String,
    pub quantity: i32,
    pub note: Option<String>,
}
