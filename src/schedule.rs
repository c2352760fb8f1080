//! Daily scheduling for `run --cron HH:MM`.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::thread;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("--date {0} cannot be combined with --cron; scheduled runs use the current date")]
    FixedDate(NaiveDate),
}

/// Scheduled runs take their date from the clock. A fixed `--date` would
/// repeat the same day forever, so it is refused.
pub fn check_run_date(date: Option<NaiveDate>) -> Result<(), ScheduleError> {
    match date {
        Some(date) => Err(ScheduleError::FixedDate(date)),
        None => Ok(()),
    }
}

/// Parse a wall-clock time of day: `HH:MM` or `HH:MM:SS`.
pub fn parse_daily_time(value: &str) -> Result<NaiveTime, ScheduleError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTime(value.to_string()))
}

/// The next moment at `at` strictly after `now`: today if still ahead,
/// otherwise tomorrow.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Resolve a naive local time to an instant. A time inside a DST gap moves
/// forward by the hour the clocks skipped.
fn to_local(naive: NaiveDateTime) -> DateTime<Local> {
    let resolve = |naive: NaiveDateTime| Local.from_local_datetime(&naive).earliest();
    resolve(naive)
        .or_else(|| resolve(naive + chrono::Duration::hours(1)))
        .unwrap_or_else(Local::now)
}

/// Run `job` every day at `at` local time. Never returns.
///
/// A failing job is logged and the loop waits for the next day.
pub fn run_daily<E: std::fmt::Display>(at: NaiveTime, mut job: impl FnMut() -> Result<(), E>) -> ! {
    loop {
        let now = Local::now();
        let next = to_local(next_run_after(now.naive_local(), at));
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next = %next.format("%Y-%m-%d %H:%M:%S"), "waiting for next run");
        thread::sleep(wait);

        if let Err(e) = job() {
            warn!(error = %e, "scheduled run failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn parses_hours_and_minutes() {
        assert_eq!(
            parse_daily_time("08:30").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
        assert_eq!(
            parse_daily_time(" 23:59:30 ").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 30).unwrap()
        );
    }

    #[test]
    fn rejects_bad_times() {
        for bad in ["", "8", "25:00", "12:60", "noon"] {
            assert!(parse_daily_time(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn next_run_later_today() {
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(next_run_after(at(8, 0), time), at(9, 0));
    }

    #[test]
    fn next_run_tomorrow_when_passed() {
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let next = next_run_after(at(10, 0), time);
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
        assert_eq!(next.time(), time);
    }

    #[test]
    fn cron_refuses_fixed_date() {
        assert!(check_run_date(None).is_ok());
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let err = check_run_date(Some(date)).unwrap_err();
        assert!(err.to_string().contains("2026-10-19"));
    }

    #[test]
    fn to_local_keeps_wall_clock_time() {
        // Noon is never inside a DST transition.
        let naive = at(12, 0);
        assert_eq!(to_local(naive).naive_local(), naive);
    }

    #[test]
    fn to_local_never_lands_before_requested_time() {
        // 02:30 is skipped on spring-forward days in many zones.
        let naive = at(2, 30);
        assert!(to_local(naive).naive_local() >= naive);
    }

    #[test]
    fn exact_time_schedules_tomorrow() {
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(next_run_after(at(9, 0), time).date(), NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
    }
}
