use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Сессия (бронирование): комната + клиент + опциональный инженер
// на интервале [start_time, end_time).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudioSession {
    pub id: i64,
    pub studio_id: i64,
    pub room_id: i64,
    pub client_id: i64,
    pub engineer_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudioSession {
    /// Производный статус "идёт сейчас": вычисляется при чтении и никогда
    /// не сохраняется в БД.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status != SessionStatus::Cancelled.as_str()
            && self.status != SessionStatus::Completed.as_str()
            && self.start_time <= now
            && now < self.end_time
    }
}

/// Закрытый набор статусов сессии.
///
/// `NoShow` присутствует в хранимых данных, но не достижим через точку входа
/// смены статуса; `live`/`active` — производные состояния и не хранятся вовсе.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::NoShow => "no_show",
        }
    }

    /// Разбор статуса, прочитанного из БД.
    pub fn parse_stored(s: &str) -> Option<SessionStatus> {
        match s {
            "scheduled" => Some(SessionStatus::Scheduled),
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            "cancelled" => Some(SessionStatus::Cancelled),
            "no_show" => Some(SessionStatus::NoShow),
            _ => None,
        }
    }

    /// Разбор статуса из запроса на смену статуса.
    ///
    /// Нормализация псевдонима выполняется один раз, здесь: `finished`
    /// превращается в `completed`. `no_show`, `live`, `active` и прочие
    /// значения отклоняются — они недоступны через эту точку входа.
    pub fn parse_requested(s: &str) -> Option<SessionStatus> {
        match s {
            "scheduled" => Some(SessionStatus::Scheduled),
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" | "finished" => Some(SessionStatus::Completed),
            "cancelled" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }

    /// Терминальные статусы: из них нет переходов (кроме восстановления
    /// отменённой сессии, см. `can_transition`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::NoShow)
    }

    /// Допустимые переходы:
    /// - scheduled -> in_progress
    /// - любой нетерминальный -> completed
    /// - любой нетерминальный -> cancelled
    /// - cancelled -> scheduled (восстановление)
    ///
    /// Переход в тот же статус разрешён как no-op.
    pub fn can_transition(self, to: SessionStatus) -> bool {
        use SessionStatus::*;
        if self == to {
            return true;
        }
        match (self, to) {
            (Scheduled, InProgress) => true,
            (Scheduled | InProgress, Completed) => true,
            (Scheduled | InProgress, Cancelled) => true,
            (Cancelled, Scheduled) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn finished_normalizes_to_completed() {
        assert_eq!(
            SessionStatus::parse_requested("finished"),
            Some(SessionStatus::Completed)
        );
    }

    #[test]
    fn derived_and_reserved_statuses_rejected() {
        assert_eq!(SessionStatus::parse_requested("live"), None);
        assert_eq!(SessionStatus::parse_requested("active"), None);
        assert_eq!(SessionStatus::parse_requested("no_show"), None);
        assert_eq!(SessionStatus::parse_requested(""), None);
    }

    #[test]
    fn transition_matrix() {
        use SessionStatus::*;
        assert!(Scheduled.can_transition(InProgress));
        assert!(Scheduled.can_transition(Completed));
        assert!(InProgress.can_transition(Completed));
        assert!(Scheduled.can_transition(Cancelled));
        assert!(InProgress.can_transition(Cancelled));
        assert!(Cancelled.can_transition(Scheduled));
        // no-op
        assert!(Scheduled.can_transition(Scheduled));
        // запрещённые
        assert!(!Completed.can_transition(Scheduled));
        assert!(!Completed.can_transition(InProgress));
        assert!(!Cancelled.can_transition(InProgress));
        assert!(!NoShow.can_transition(Scheduled));
        assert!(!InProgress.can_transition(Scheduled));
    }

    fn session_with(status: &str, start: i64, end: i64) -> StudioSession {
        StudioSession {
            id: 1,
            studio_id: 1,
            room_id: 1,
            client_id: 1,
            engineer_id: None,
            start_time: Utc.timestamp_opt(start, 0).unwrap(),
            end_time: Utc.timestamp_opt(end, 0).unwrap(),
            status: status.to_string(),
            notes: None,
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            updated_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    #[test]
    fn live_is_a_read_time_projection() {
        let now = Utc.timestamp_opt(500, 0).unwrap();
        assert!(session_with("scheduled", 100, 1000).is_live(now));
        assert!(session_with("in_progress", 100, 1000).is_live(now));
        assert!(!session_with("cancelled", 100, 1000).is_live(now));
        assert!(!session_with("completed", 100, 1000).is_live(now));
        // границы интервала полуоткрытые
        assert!(session_with("scheduled", 500, 1000).is_live(now));
        assert!(!session_with("scheduled", 100, 500).is_live(now));
    }
}
