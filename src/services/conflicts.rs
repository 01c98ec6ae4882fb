//! conflicts.rs
//!
//! Проверка пересечений интервалов — центральный алгоритм планирования.
//!
//! Кандидат [start, end) отклоняется, если на том же ресурсе (комната или
//! инженер) в той же студии уже есть неотменённое бронирование, интервал
//! которого строго пересекается с кандидатом:
//!
//! ```text
//! start_time < end AND end_time > start
//! ```
//!
//! Интервалы полуоткрытые: сессия, заканчивающаяся в T, и сессия,
//! начинающаяся в T, не конфликтуют — бронирования могут идти впритык.
//! При обновлении собственная строка сессии исключается через
//! `exclude_session_id`, чтобы сессия не конфликтовала сама с собой.
//!
//! Возвращается первая найденная пересекающаяся строка (порядок отдаёт
//! хранилище — для сообщения об ошибке достаточно любой) вместе с именем
//! клиента, чтобы вызывающий мог показать "пересекается с X с T1 по T2".

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::errors::ConflictInfo;

/// Ось, по которой независимо запрещены пересечения.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Room,
    Engineer,
}

impl ResourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Room => "Комната",
            ResourceKind::Engineer => "Инженер",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            ResourceKind::Room => "room_id",
            ResourceKind::Engineer => "engineer_id",
        }
    }
}

/// Чистый предикат пересечения полуоткрытых интервалов, который зеркалит
/// SQL-условие ниже.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Ищет неотменённое бронирование, пересекающееся с кандидатом на данном
/// ресурсе. Выполняется на соединении транзакции, в которой затем идёт
/// запись, чтобы проверка и запись были единым целым.
pub async fn find_conflict(
    conn: &mut PgConnection,
    studio_id: i64,
    kind: ResourceKind,
    resource_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_session_id: Option<i64>,
) -> Result<Option<ConflictInfo>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT s.id, c.name, s.start_time, s.end_time
        FROM sessions s
        JOIN clients c ON c.id = s.client_id
        WHERE s.{column} = $1
          AND s.studio_id = $2
          AND s.status <> 'cancelled'
          AND s.start_time < $3
          AND s.end_time > $4
          AND ($5::BIGINT IS NULL OR s.id <> $5)
        LIMIT 1
        "#,
        column = kind.column()
    );

    let row: Option<(i64, String, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(&query)
        .bind(resource_id)
        .bind(studio_id)
        .bind(end)
        .bind(start)
        .bind(exclude_session_id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(|(session_id, counterpart, start_time, end_time)| ConflictInfo {
        session_id,
        counterpart,
        start_time,
        end_time,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn strict_overlap_detected() {
        assert!(overlaps(ts(100), ts(200), ts(150), ts(250)));
        assert!(overlaps(ts(150), ts(250), ts(100), ts(200)));
        // вложенный интервал
        assert!(overlaps(ts(100), ts(400), ts(200), ts(300)));
        assert!(overlaps(ts(200), ts(300), ts(100), ts(400)));
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        // конец одного == начало другого: бронирования впритык разрешены
        assert!(!overlaps(ts(100), ts(200), ts(200), ts(300)));
        assert!(!overlaps(ts(200), ts(300), ts(100), ts(200)));
    }

    #[test]
    fn disjoint_intervals_do_not_conflict() {
        assert!(!overlaps(ts(100), ts(200), ts(300), ts(400)));
        assert!(!overlaps(ts(300), ts(400), ts(100), ts(200)));
    }

    proptest! {
        // Предикат симметричен и совпадает с определением
        // a1 < b2 && b1 < a2 на любых корректных интервалах.
        #[test]
        fn overlap_is_symmetric(
            a1 in 0i64..100_000,
            a_len in 1i64..10_000,
            b1 in 0i64..100_000,
            b_len in 1i64..10_000,
        ) {
            let (a2, b2) = (a1 + a_len, b1 + b_len);
            let forward = overlaps(ts(a1), ts(a2), ts(b1), ts(b2));
            let backward = overlaps(ts(b1), ts(b2), ts(a1), ts(a2));
            prop_assert_eq!(forward, backward);
            prop_assert_eq!(forward, a1 < b2 && b1 < a2);
        }
    }
}
