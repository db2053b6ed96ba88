use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Accumulated seconds per category for a single day.
pub type DayTotals = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub category: String,
    /// Unix epoch seconds.
    pub start: f64,
}

impl Session {
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        (epoch_seconds(now) - self.start).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopOutcome {
    pub category: String,
    pub duration_seconds: f64,
    pub date_key: String,
}

impl StopOutcome {
    pub fn hours(&self) -> f64 {
        self.duration_seconds / 3600.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    EmptyCategory,
    AlreadyRunning { category: String },
    NoActiveSession,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::EmptyCategory => write!(f, "category must not be empty"),
            SessionError::AlreadyRunning { category } => {
                write!(f, "timer already running for '{category}'. Stop it first.")
            }
            SessionError::NoActiveSession => write!(f, "no active timer running"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Full persisted state: committed per-day totals plus at most one running session.
///
/// Date keys stay strings so a hand-edited or malformed key survives a load and
/// is simply ignored by reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ledger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_session: Option<Session>,
    #[serde(default)]
    pub days: BTreeMap<String, DayTotals>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.active_session.is_some()
    }

    pub fn start(&mut self, category: &str, now: DateTime<Utc>) -> Result<&Session, SessionError> {
        let category = category.trim();
        if category.is_empty() {
            return Err(SessionError::EmptyCategory);
        }

        if let Some(active) = &self.active_session {
            return Err(SessionError::AlreadyRunning {
                category: active.category.clone(),
            });
        }

        let session = self.active_session.insert(Session {
            category: category.to_string(),
            start: epoch_seconds(now),
        });
        Ok(&*session)
    }

    /// Commits the running session to the day `now` falls on, even when it
    /// started on an earlier day.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<StopOutcome, SessionError> {
        let session = self
            .active_session
            .take()
            .ok_or(SessionError::NoActiveSession)?;

        let duration_seconds = session.elapsed_seconds(now);
        let date_key = date_key(now);
        self.add_duration(&date_key, &session.category, duration_seconds);

        Ok(StopOutcome {
            category: session.category,
            duration_seconds,
            date_key,
        })
    }

    pub fn add_duration(&mut self, date_key: &str, category: &str, seconds: f64) {
        let totals = self.days.entry(date_key.to_string()).or_default();
        *totals.entry(category.to_string()).or_insert(0.0) += seconds.max(0.0);
    }

    pub fn seconds_for(&self, date_key: &str, category: &str) -> f64 {
        self.days
            .get(date_key)
            .and_then(|totals| totals.get(category))
            .copied()
            .unwrap_or(0.0)
    }
}

pub fn epoch_seconds(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp() as f64 + f64::from(timestamp.timestamp_subsec_nanos()) / 1e9
}

pub fn local_day(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

pub fn date_key(timestamp: DateTime<Utc>) -> String {
    local_day(timestamp).format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

pub fn round_hours(seconds: f64) -> f64 {
    (seconds / 3600.0 * 100.0).round() / 100.0
}

pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as i64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Local, TimeZone, Utc};

    use super::{Ledger, SessionError, date_key, format_duration, round_hours};

    fn local_time(hour: u32, minute: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 1, 1, hour, minute, 0)
            .single()
            .expect("unambiguous local time")
            .with_timezone(&Utc)
    }

    #[test]
    fn second_start_is_refused_and_keeps_active_session() {
        let mut ledger = Ledger::new();
        let t0 = local_time(9, 0);
        ledger.start("coding", t0).expect("start should work");
        let before = ledger.active_session.clone();

        let err = ledger
            .start("reading", t0 + Duration::minutes(5))
            .expect_err("second start must fail");
        assert_eq!(
            err,
            SessionError::AlreadyRunning {
                category: "coding".to_string()
            }
        );
        assert_eq!(ledger.active_session, before);
    }

    #[test]
    fn rejects_blank_category() {
        let mut ledger = Ledger::new();
        let now = local_time(9, 0);
        assert_eq!(ledger.start("   ", now), Err(SessionError::EmptyCategory));
        assert!(!ledger.is_running());
    }

    #[test]
    fn stop_logs_elapsed_seconds_to_stop_day() {
        let mut ledger = Ledger::new();
        let t0 = local_time(9, 0);
        let t1 = t0 + Duration::seconds(3661);
        ledger.start("coding", t0).expect("start should work");

        let outcome = ledger.stop(t1).expect("stop should work");
        assert_eq!(outcome.category, "coding");
        assert_eq!(outcome.duration_seconds, 3661.0);
        assert_eq!(outcome.date_key, date_key(t1));
        assert_eq!(ledger.seconds_for(&date_key(t1), "coding"), 3661.0);
        assert_eq!(round_hours(outcome.duration_seconds), 1.02);
        assert!(!ledger.is_running());
    }

    #[test]
    fn repeated_sessions_accumulate() {
        let mut ledger = Ledger::new();
        let t0 = local_time(9, 0);
        ledger.start("coding", t0).expect("start should work");
        ledger
            .stop(t0 + Duration::seconds(3600))
            .expect("stop should work");
        ledger
            .start("coding", t0 + Duration::hours(2))
            .expect("start should work");
        ledger
            .stop(t0 + Duration::hours(2) + Duration::seconds(1800))
            .expect("stop should work");

        assert_eq!(ledger.seconds_for(&date_key(t0), "coding"), 5400.0);
        assert_eq!(ledger.days.len(), 1);
    }

    #[test]
    fn stop_touches_only_its_own_entry() {
        let mut ledger = Ledger::new();
        ledger.add_duration("2025-12-30", "reading", 600.0);
        ledger.add_duration("2026-01-01", "gym", 1200.0);
        let t0 = local_time(12, 0);
        ledger.start("coding", t0).expect("start should work");
        ledger
            .stop(t0 + Duration::seconds(90))
            .expect("stop should work");

        assert_eq!(ledger.seconds_for("2025-12-30", "reading"), 600.0);
        assert_eq!(ledger.seconds_for("2026-01-01", "gym"), 1200.0);
        assert_eq!(ledger.seconds_for(&date_key(t0), "coding"), 90.0);
    }

    #[test]
    fn stop_without_session_leaves_ledger_unchanged() {
        let mut ledger = Ledger::new();
        ledger.add_duration("2026-01-01", "coding", 60.0);
        let before = ledger.clone();
        let now = local_time(9, 0);
        assert_eq!(ledger.stop(now), Err(SessionError::NoActiveSession));
        assert_eq!(ledger, before);
    }

    #[test]
    fn clock_going_backwards_logs_zero() {
        let mut ledger = Ledger::new();
        let t0 = local_time(9, 0);
        ledger.start("coding", t0).expect("start should work");
        let outcome = ledger
            .stop(t0 - Duration::minutes(10))
            .expect("stop should work");
        assert_eq!(outcome.duration_seconds, 0.0);
    }

    #[test]
    fn formats_elapsed_clock() {
        assert_eq!(format_duration(3661.9), "01:01:01");
        assert_eq!(format_duration(-5.0), "00:00:00");
    }
}
