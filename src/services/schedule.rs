//! schedule.rs
//!
//! Раскладка бронирований по корзинам для календарного отображения.
//!
//! Ключевые части:
//! 1.  **StudioZone**: часовой пояс студии (IANA-имя) с откатом на пояс
//!     сервера. Все календарные ключи дней считаются в нём, чтобы границы
//!     суток совпадали с локальными сутками студии, а не сервера.
//! 2.  **Ключи дней**: `StudioZone::iso_date` проецирует абсолютный момент
//!     в строку "YYYY-MM-DD"; `shift_iso_date` — чистая календарная
//!     арифметика над ключом, без участия часовых поясов и DST.
//! 3.  **Классификация**: относительно "сейчас" бронирование попадает в
//!     "Идут сейчас" (интервал накрывает now), "Предстоящие" (локальный
//!     день начала не раньше сегодняшнего) или "Недавно завершённые"
//!     (конец в прошлом, день конца в скользящем окне).
//! 4.  **Группировка**: внутри корзины — группы по локальному дню с
//!     заголовком "Сегодня"/"Завтра" или абсолютной датой; заголовки
//!     опускаются, когда вся корзина умещается в один день.
//!
//! Модуль только читает: никакого влияния на хранимое состояние.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;

const WEEKDAYS_RU: [&str; 7] = ["Пн", "Вт", "Ср", "Чт", "Пт", "Сб", "Вс"];
const MONTHS_RU: [&str; 12] = [
    "января", "февраля", "марта", "апреля", "мая", "июня",
    "июля", "августа", "сентября", "октября", "ноября", "декабря",
];

/// Часовой пояс студии: именованный IANA-пояс или пояс сервера.
#[derive(Debug, Clone, Copy)]
pub enum StudioZone {
    Named(Tz),
    Server,
}

impl StudioZone {
    /// Разбирает значение из карточки студии. NULL или нераспознанное имя
    /// откатываются на пояс сервера.
    pub fn resolve(timezone: Option<&str>) -> StudioZone {
        match timezone {
            Some(name) => match name.parse::<Tz>() {
                Ok(tz) => StudioZone::Named(tz),
                Err(_) => {
                    tracing::warn!("unknown studio timezone {:?}, falling back to server zone", name);
                    StudioZone::Server
                }
            },
            None => StudioZone::Server,
        }
    }

    /// Ключ календарного дня "YYYY-MM-DD" для абсолютного момента.
    pub fn iso_date(&self, instant: DateTime<Utc>) -> String {
        match self {
            StudioZone::Named(tz) => instant.with_timezone(tz).format("%Y-%m-%d").to_string(),
            StudioZone::Server => instant.with_timezone(&Local).format("%Y-%m-%d").to_string(),
        }
    }

    /// Превращает локальные дату и время студии в абсолютный момент.
    ///
    /// Неоднозначное локальное время (осенний перевод часов) разрешается в
    /// более ранний вариант; несуществующее (весенний пропуск) даёт None.
    pub fn compose_utc(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        let naive = date.and_time(time);
        match self {
            StudioZone::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            StudioZone::Server => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Начало локальных суток для ключа дня.
    pub fn day_start_utc(&self, key: &str) -> Option<DateTime<Utc>> {
        let date = NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()?;
        self.compose_utc(date, NaiveTime::MIN)
    }
}

/// Сдвиг ключа дня на целое число календарных дней.
///
/// Работает над самим ключом, а не над моментом времени, поэтому переводы
/// часов и пояса на результат не влияют.
pub fn shift_iso_date(key: &str, days: i64) -> Option<String> {
    let date = NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()?;
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days as u64))?
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))?
    };
    Some(shifted.format("%Y-%m-%d").to_string())
}

/// Строка расписания: сессия, соединённая с именами для отображения.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEntry {
    pub id: i64,
    pub room_id: i64,
    pub room_name: String,
    pub client_id: i64,
    pub client_name: String,
    pub engineer_id: Option<i64>,
    pub engineer_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub live: bool,
    pub notes: Option<String>,
}

impl ScheduleEntry {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status != "cancelled"
            && self.status != "completed"
            && self.start_time <= now
            && now < self.end_time
    }

    fn is_upcoming(&self, now: DateTime<Utc>, zone: &StudioZone, today_key: &str) -> bool {
        self.status != "cancelled"
            && !self.is_active(now)
            && zone.iso_date(self.start_time).as_str() >= today_key
    }

    fn is_recently_finished(
        &self,
        now: DateTime<Utc>,
        zone: &StudioZone,
        window_start_key: &str,
    ) -> bool {
        self.status != "cancelled"
            && self.end_time < now
            && zone.iso_date(self.end_time).as_str() >= window_start_key
    }
}

/// Группа строк одного локального дня.
#[derive(Debug, Serialize)]
pub struct DayGroup {
    pub date_key: String,
    // None, когда вся корзина приходится на один день и заголовок группы
    // заменяется заголовком секции
    pub header: Option<String>,
    pub sessions: Vec<ScheduleEntry>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleBuckets {
    pub active: Vec<DayGroup>,
    pub upcoming: Vec<DayGroup>,
    pub recently_finished: Vec<DayGroup>,
}

/// Раскладывает строки расписания по корзинам и группам дней.
pub fn build_buckets(
    entries: &[ScheduleEntry],
    now: DateTime<Utc>,
    zone: &StudioZone,
    recent_window_days: i64,
) -> ScheduleBuckets {
    let today = zone.iso_date(now);
    let tomorrow = shift_iso_date(&today, 1).unwrap_or_default();
    let window_start = shift_iso_date(&today, -recent_window_days).unwrap_or_default();

    let mut active: Vec<ScheduleEntry> = Vec::new();
    let mut upcoming: Vec<ScheduleEntry> = Vec::new();
    let mut finished: Vec<ScheduleEntry> = Vec::new();

    for entry in entries {
        if entry.is_active(now) {
            active.push(entry.clone());
        }
        if entry.is_upcoming(now, zone, &today) {
            upcoming.push(entry.clone());
        }
        if entry.is_recently_finished(now, zone, &window_start) {
            finished.push(entry.clone());
        }
    }

    // Идут сейчас и предстоящие — по возрастанию начала,
    // недавно завершённые — по убыванию конца
    active.sort_by_key(|e| e.start_time);
    upcoming.sort_by_key(|e| e.start_time);
    finished.sort_by_key(|e| std::cmp::Reverse(e.end_time));

    ScheduleBuckets {
        active: into_day_groups(active, zone, &today, &tomorrow, GroupKey::Start, false),
        upcoming: into_day_groups(upcoming, zone, &today, &tomorrow, GroupKey::Start, false),
        recently_finished: into_day_groups(finished, zone, &today, &tomorrow, GroupKey::End, true),
    }
}

enum GroupKey {
    Start,
    End,
}

fn into_day_groups(
    entries: Vec<ScheduleEntry>,
    zone: &StudioZone,
    today: &str,
    tomorrow: &str,
    key: GroupKey,
    newest_first: bool,
) -> Vec<DayGroup> {
    // Группировка по ключу дня; порядок внутри группы сохраняется из
    // уже отсортированного входа
    let mut grouped: BTreeMap<String, Vec<ScheduleEntry>> = BTreeMap::new();
    for entry in entries {
        let instant = match key {
            GroupKey::Start => entry.start_time,
            GroupKey::End => entry.end_time,
        };
        grouped.entry(zone.iso_date(instant)).or_default().push(entry);
    }

    let suppress_headers = grouped.len() == 1;
    let build = |(date_key, sessions): (String, Vec<ScheduleEntry>)| DayGroup {
        header: if suppress_headers {
            None
        } else {
            Some(group_header(&date_key, today, tomorrow))
        },
        date_key,
        sessions,
    };

    if newest_first {
        grouped.into_iter().rev().map(build).collect()
    } else {
        grouped.into_iter().map(build).collect()
    }
}

/// Заголовок группы: относительный для сегодня/завтра, иначе абсолютный
/// "день недели, число месяц".
fn group_header(key: &str, today: &str, tomorrow: &str) -> String {
    if key == today {
        return "Сегодня".to_string();
    }
    if key == tomorrow {
        return "Завтра".to_string();
    }
    match NaiveDate::parse_from_str(key, "%Y-%m-%d") {
        Ok(date) => {
            let weekday = WEEKDAYS_RU[date.weekday().num_days_from_monday() as usize];
            let month = MONTHS_RU[date.month0() as usize];
            format!("{}, {} {}", weekday, date.day(), month)
        }
        Err(_) => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc_zone() -> StudioZone {
        StudioZone::Named(chrono_tz::UTC)
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn entry(id: i64, status: &str, start: &str, end: &str) -> ScheduleEntry {
        ScheduleEntry {
            id,
            room_id: 1,
            room_name: "Room A".to_string(),
            client_id: 1,
            client_name: "Client".to_string(),
            engineer_id: None,
            engineer_name: None,
            start_time: at(start),
            end_time: at(end),
            status: status.to_string(),
            live: false,
            notes: None,
        }
    }

    #[test]
    fn iso_date_respects_zone() {
        let zone = StudioZone::Named(chrono_tz::Asia::Tokyo);
        // 23:30 UTC — уже следующий день в Токио (+09:00)
        assert_eq!(zone.iso_date(at("2024-01-01T23:30:00Z")), "2024-01-02");
        assert_eq!(utc_zone().iso_date(at("2024-01-01T23:30:00Z")), "2024-01-01");
    }

    #[test]
    fn shift_is_pure_calendar_arithmetic() {
        // 2024-03-10 — дата весеннего перевода часов в США; на ключ это
        // не влияет
        assert_eq!(shift_iso_date("2024-03-10", 1).unwrap(), "2024-03-11");
        assert_eq!(shift_iso_date("2024-01-31", 1).unwrap(), "2024-02-01");
        assert_eq!(shift_iso_date("2024-02-28", 1).unwrap(), "2024-02-29");
        assert_eq!(shift_iso_date("2024-03-01", -1).unwrap(), "2024-02-29");
        assert_eq!(shift_iso_date("2024-03-10", -14).unwrap(), "2024-02-25");
        assert!(shift_iso_date("не дата", 1).is_none());
    }

    #[test]
    fn compose_handles_named_zone() {
        let zone = StudioZone::Named(chrono_tz::Asia::Tokyo);
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        // 09:00 в Токио = 00:00 UTC
        assert_eq!(zone.compose_utc(date, time).unwrap(), at("2024-06-01T00:00:00Z"));
    }

    #[test]
    fn unknown_timezone_falls_back_to_server() {
        assert!(matches!(StudioZone::resolve(Some("Mars/Olympus")), StudioZone::Server));
        assert!(matches!(StudioZone::resolve(None), StudioZone::Server));
        assert!(matches!(
            StudioZone::resolve(Some("Europe/Berlin")),
            StudioZone::Named(_)
        ));
    }

    #[test]
    fn active_never_appears_in_upcoming() {
        let now = at("2024-05-10T12:00:00Z");
        let zone = utc_zone();
        let running = entry(1, "scheduled", "2024-05-10T11:00:00Z", "2024-05-10T14:00:00Z");
        let later = entry(2, "scheduled", "2024-05-10T18:00:00Z", "2024-05-10T20:00:00Z");

        let buckets = build_buckets(&[running.clone(), later], now, &zone, 14);
        let active_ids: Vec<i64> = buckets.active.iter().flat_map(|g| g.sessions.iter().map(|s| s.id)).collect();
        let upcoming_ids: Vec<i64> = buckets.upcoming.iter().flat_map(|g| g.sessions.iter().map(|s| s.id)).collect();
        assert_eq!(active_ids, vec![1]);
        assert_eq!(upcoming_ids, vec![2]);
    }

    #[test]
    fn completed_and_cancelled_are_not_active() {
        let now = at("2024-05-10T12:00:00Z");
        let zone = utc_zone();
        let cancelled = entry(1, "cancelled", "2024-05-10T11:00:00Z", "2024-05-10T14:00:00Z");
        let completed = entry(2, "completed", "2024-05-10T11:00:00Z", "2024-05-10T14:00:00Z");

        let buckets = build_buckets(&[cancelled, completed], now, &zone, 14);
        assert!(buckets.active.is_empty());
        // отменённая не попадает никуда
        let all_upcoming: Vec<i64> = buckets.upcoming.iter().flat_map(|g| g.sessions.iter().map(|s| s.id)).collect();
        assert!(!all_upcoming.contains(&1));
    }

    #[test]
    fn recently_finished_window() {
        let now = at("2024-05-20T12:00:00Z");
        let zone = utc_zone();
        let fresh = entry(1, "completed", "2024-05-18T10:00:00Z", "2024-05-18T12:00:00Z");
        let stale = entry(2, "completed", "2024-04-01T10:00:00Z", "2024-04-01T12:00:00Z");
        let cancelled = entry(3, "cancelled", "2024-05-18T10:00:00Z", "2024-05-18T12:00:00Z");

        let buckets = build_buckets(&[fresh, stale, cancelled], now, &zone, 14);
        let ids: Vec<i64> = buckets
            .recently_finished
            .iter()
            .flat_map(|g| g.sessions.iter().map(|s| s.id))
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn groups_ordered_and_headers_attached() {
        let now = at("2024-05-10T08:00:00Z");
        let zone = utc_zone();
        let today_late = entry(1, "scheduled", "2024-05-10T18:00:00Z", "2024-05-10T20:00:00Z");
        let today_early = entry(2, "scheduled", "2024-05-10T10:00:00Z", "2024-05-10T12:00:00Z");
        let tomorrow = entry(3, "scheduled", "2024-05-11T10:00:00Z", "2024-05-11T12:00:00Z");
        let next_week = entry(4, "scheduled", "2024-05-17T10:00:00Z", "2024-05-17T12:00:00Z");

        let buckets = build_buckets(&[today_late, today_early, tomorrow, next_week], now, &zone, 14);
        let keys: Vec<&str> = buckets.upcoming.iter().map(|g| g.date_key.as_str()).collect();
        assert_eq!(keys, vec!["2024-05-10", "2024-05-11", "2024-05-17"]);

        // внутри дня — по возрастанию начала
        assert_eq!(
            buckets.upcoming[0].sessions.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![2, 1]
        );

        assert_eq!(buckets.upcoming[0].header.as_deref(), Some("Сегодня"));
        assert_eq!(buckets.upcoming[1].header.as_deref(), Some("Завтра"));
        // 2024-05-17 — пятница
        assert_eq!(buckets.upcoming[2].header.as_deref(), Some("Пт, 17 мая"));
    }

    #[test]
    fn single_day_bucket_suppresses_headers() {
        let now = at("2024-05-10T08:00:00Z");
        let zone = utc_zone();
        let a = entry(1, "scheduled", "2024-05-11T10:00:00Z", "2024-05-11T12:00:00Z");
        let b = entry(2, "scheduled", "2024-05-11T14:00:00Z", "2024-05-11T16:00:00Z");

        let buckets = build_buckets(&[a, b], now, &zone, 14);
        assert_eq!(buckets.upcoming.len(), 1);
        assert!(buckets.upcoming[0].header.is_none());
    }

    #[test]
    fn finished_groups_newest_first() {
        let now = at("2024-05-20T12:00:00Z");
        let zone = utc_zone();
        let older = entry(1, "completed", "2024-05-15T10:00:00Z", "2024-05-15T12:00:00Z");
        let newer = entry(2, "completed", "2024-05-18T10:00:00Z", "2024-05-18T12:00:00Z");

        let buckets = build_buckets(&[older, newer], now, &zone, 14);
        let keys: Vec<&str> = buckets
            .recently_finished
            .iter()
            .map(|g| g.date_key.as_str())
            .collect();
        assert_eq!(keys, vec!["2024-05-18", "2024-05-15"]);
    }

    #[test]
    fn day_start_is_local_midnight() {
        let zone = StudioZone::Named(chrono_tz::Asia::Tokyo);
        // полночь 1 июня в Токио = 15:00 UTC 31 мая
        assert_eq!(
            zone.day_start_utc("2024-06-01").unwrap(),
            at("2024-05-31T15:00:00Z")
        );
        assert!(zone.day_start_utc("2024-13-01").is_none());
    }

    #[test]
    fn upcoming_uses_local_day_of_start() {
        // Сессия начинается 23:30 UTC "вчера", но в Токио это уже сегодня
        let zone = StudioZone::Named(chrono_tz::Asia::Tokyo);
        let now = at("2024-05-10T00:00:00Z"); // в Токио 09:00 десятого
        let e = entry(1, "scheduled", "2024-05-10T22:00:00Z", "2024-05-10T23:00:00Z");
        let buckets = build_buckets(&[e], now, &zone, 14);
        // старт 22:00 UTC = 07:00 одиннадцатого в Токио
        assert_eq!(buckets.upcoming[0].date_key, "2024-05-11");
    }
}
