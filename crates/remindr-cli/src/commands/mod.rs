pub mod alarm;
pub mod changed;
pub mod config;
pub mod reminder;

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use remindr_core::storage::Database;
use remindr_core::{
    Config, NotificationPresenter, NotificationRequest, ReminderId, ReminderManager,
    ReminderStore, StoredAlarmQueue, SystemClock,
};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Prints presented notifications to stderr so stdout stays JSON.
struct TerminalPresenter;

impl NotificationPresenter for TerminalPresenter {
    fn present(&self, request: &NotificationRequest) {
        if request.show_due_time {
            let due = request.due_at.with_timezone(&Local);
            eprintln!(
                "[reminder #{}] {} (due {})",
                request.reminder_id,
                request.text,
                due.format("%Y-%m-%d %H:%M")
            );
        } else {
            eprintln!("[reminder #{}] {}", request.reminder_id, request.text);
        }
    }

    fn withdraw(&self, reminder_id: ReminderId) {
        tracing::debug!(id = reminder_id, "notification withdrawn");
    }
}

/// Everything a command needs: the manager and the alarm queue it
/// registers on. Both sit on the same database file through separate
/// connections, so a running `watch` and one-off commands share callbacks.
pub struct Session {
    pub config: Config,
    pub manager: ReminderManager,
    pub alarms: Arc<StoredAlarmQueue>,
}

impl Session {
    pub fn open() -> CliResult<Self> {
        let config = Config::load_or_default();
        let alarms = Arc::new(StoredAlarmQueue::new(Database::open()?));
        let store = Arc::new(ReminderStore::open()?);
        let manager = ReminderManager::new(
            store,
            alarms.clone(),
            Arc::new(TerminalPresenter),
            Arc::new(SystemClock),
            &config,
        );
        Ok(Self {
            config,
            manager,
            alarms,
        })
    }
}

/// Resolve `--at` / `--in` into an absolute due time.
///
/// `--at` accepts RFC 3339, `YYYY-MM-DD HH:MM` or `HH:MM` in local time.
/// A bare time that has already passed today means tomorrow.
pub fn parse_due(
    at: Option<&str>,
    in_minutes: Option<i64>,
    now: DateTime<Utc>,
) -> CliResult<Option<DateTime<Utc>>> {
    match (at, in_minutes) {
        (Some(_), Some(_)) => Err("use either --at or --in, not both".into()),
        (None, Some(minutes)) => Ok(Some(now + Duration::minutes(minutes))),
        (Some(raw), None) => parse_at(raw, now).map(Some),
        (None, None) => Ok(None),
    }
}

fn parse_at(raw: &str, now: DateTime<Utc>) -> CliResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        return local_to_utc(naive, raw);
    }
    if let Ok(time) = NaiveTime::parse_from_str(raw, "%H:%M") {
        let today = now.with_timezone(&Local).date_naive();
        let candidate = local_to_utc(today.and_time(time), raw)?;
        if candidate > now {
            return Ok(candidate);
        }
        return local_to_utc((today + Duration::days(1)).and_time(time), raw);
    }
    Err(format!("cannot parse time '{raw}' (expected RFC 3339, 'YYYY-MM-DD HH:MM' or 'HH:MM')").into())
}

fn local_to_utc(naive: NaiveDateTime, raw: &str) -> CliResult<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("'{raw}' does not exist in the local time zone").into())
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn relative_minutes() {
        let due = parse_due(None, Some(5), now()).unwrap();
        assert_eq!(due, Some(now() + Duration::minutes(5)));
    }

    #[test]
    fn rfc3339() {
        let due = parse_due(Some("2026-04-02T08:30:00Z"), None, now()).unwrap();
        assert_eq!(due, Some(Utc.with_ymd_and_hms(2026, 4, 2, 8, 30, 0).unwrap()));
    }

    #[test]
    fn bare_time_is_in_the_future() {
        let due = parse_due(Some("07:00"), None, now()).unwrap().unwrap();
        assert!(due > now());
        assert!(due <= now() + Duration::days(1));
    }

    #[test]
    fn both_flags_are_rejected() {
        assert!(parse_due(Some("07:00"), Some(5), now()).is_err());
        assert!(parse_due(Some("tomorrow-ish"), None, now()).is_err());
    }
}
