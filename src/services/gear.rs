//! gear.rs
//!
//! Привязка оборудования к сессиям и рекомендательные предупреждения о
//! перерасходе. Оборудование — общий фонд студии: привязка фиксирует
//! намерение использовать его в окне сессии, а не владение.

use sqlx::PgPool;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::GearAssignment;

/// Повторное добавление той же единицы — no-op, не дубль:
/// идемпотентность держится на составном ключе (session_id, gear_id).
pub async fn add_assignment(
    pool: &PgPool,
    session_id: i64,
    gear_id: i64,
    note: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO session_gear (session_id, gear_id, note)
         VALUES ($1, $2, $3)
         ON CONFLICT (session_id, gear_id) DO NOTHING",
    )
    .bind(session_id)
    .bind(gear_id)
    .bind(note)
    .execute(pool)
    .await?;
    Ok(())
}

/// Снятие несуществующей привязки не считается ошибкой.
pub async fn remove_assignment(
    pool: &PgPool,
    session_id: i64,
    gear_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM session_gear WHERE session_id = $1 AND gear_id = $2")
        .bind(session_id)
        .bind(gear_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Привязки сессии вместе с карточками оборудования для отображения.
pub async fn list_assignments(
    pool: &PgPool,
    session_id: i64,
) -> Result<Vec<GearAssignment>, sqlx::Error> {
    sqlx::query_as::<_, GearAssignment>(
        r#"
        SELECT sg.session_id, sg.gear_id, g.brand, g.model, g.category, g.quantity, sg.note
        FROM session_gear sg
        JOIN gear_items g ON g.id = sg.gear_id
        WHERE sg.session_id = $1
        ORDER BY g.category, g.brand, g.model
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

/// Рекомендательное предупреждение о перерасходе оборудования.
/// Никогда не блокирует сохранение.
#[derive(Debug, Clone, Serialize)]
pub struct GearWarning {
    pub gear_id: i64,
    pub requested: i64,
    pub available: i64,
    pub message: String,
}

/// Считает перерасход по набору привязок одной сессии: запрошенное
/// количество по каждой единице против остатка на складе.
///
/// Оборудование с нулевым учтённым количеством пропускается — это
/// "неучитываемый запас". Наборы разных сессий не агрегируются между собой.
pub fn availability_warnings(assignments: &[GearAssignment]) -> Vec<GearWarning> {
    // (запрошено, в наличии) на каждую единицу оборудования
    let mut totals: BTreeMap<i64, (i64, i64)> = BTreeMap::new();
    for a in assignments {
        let entry = totals.entry(a.gear_id).or_insert((0, a.quantity as i64));
        entry.0 += 1;
    }

    totals
        .into_iter()
        .filter(|&(_, (requested, available))| available > 0 && requested > available)
        .map(|(gear_id, (requested, available))| GearWarning {
            gear_id,
            requested,
            available,
            message: format!(
                "Запрошено {} ед., в наличии {}",
                requested, available
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(gear_id: i64, quantity: i32) -> GearAssignment {
        GearAssignment {
            session_id: 1,
            gear_id,
            brand: "Neumann".to_string(),
            model: "U87".to_string(),
            category: "microphone".to_string(),
            quantity,
            note: None,
        }
    }

    #[test]
    fn overcommit_produces_single_warning() {
        // три запроса одной и той же единицы при остатке 2
        let set = vec![assignment(7, 2), assignment(7, 2), assignment(7, 2)];
        let warnings = availability_warnings(&set);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].gear_id, 7);
        assert_eq!(warnings[0].requested, 3);
        assert_eq!(warnings[0].available, 2);
    }

    #[test]
    fn within_stock_is_silent() {
        let set = vec![assignment(7, 2), assignment(7, 2)];
        assert!(availability_warnings(&set).is_empty());
    }

    #[test]
    fn untracked_stock_is_exempt() {
        // quantity = 0 — запас не учитывается, предупреждения нет
        let set = vec![assignment(7, 0), assignment(7, 0), assignment(7, 0)];
        assert!(availability_warnings(&set).is_empty());
    }

    #[test]
    fn independent_items_warned_independently() {
        let set = vec![
            assignment(1, 1),
            assignment(1, 1),
            assignment(2, 5),
        ];
        let warnings = availability_warnings(&set);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].gear_id, 1);
        assert_eq!(warnings[0].requested, 2);
    }
}
