//! Calendar helpers used by flow metrics

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// How elapsed days are counted for cycle and lead times
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayCount {
    /// Calendar dates crossed between the two instants
    #[default]
    Calendar,
    /// Weekdays in `[start, end)`
    Business,
}

impl DayCount {
    pub fn between(self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        match self {
            DayCount::Calendar => days_between(start, end),
            DayCount::Business => business_days_between(start.date_naive(), end.date_naive()),
        }
    }
}

impl std::fmt::Display for DayCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayCount::Calendar => write!(f, "calendar"),
            DayCount::Business => write!(f, "business"),
        }
    }
}

/// Number of calendar dates between two instants (time of day ignored)
pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end.date_naive() - start.date_naive()).num_days()
}

/// Weekdays in `[start, end)`; negative when `end` precedes `start`
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return -business_days_between(end, start);
    }

    let total = (end - start).num_days();
    let full_weeks = total / 7;
    let mut days = full_weeks * 5;

    let mut day = start + Duration::days(full_weeks * 7);
    while day < end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days += 1;
        }
        day += Duration::days(1);
    }

    days
}

/// Whole hours between two instants, rounded half away from zero
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let seconds = (end - start).num_seconds() as f64;
    (seconds / 3600.0).round() as i64
}

/// Midnight at the start of the instant's day
pub fn make_start_date(date: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(date.date_naive())
}

/// 23:59:59 on the instant's day
pub fn make_end_date(date: DateTime<Utc>) -> DateTime<Utc> {
    end_of_day(date.date_naive())
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::default());
    Utc.from_utc_datetime(&date.and_time(end))
}

/// Sunday through Saturday around the given date
pub fn week_range(date: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = date.date_naive();
    let sunday = day - Duration::days(day.weekday().num_days_from_sunday() as i64);
    let saturday = sunday + Duration::days(6);
    (start_of_day(sunday), end_of_day(saturday))
}

/// First through last day of the date's month
pub fn month_range(date: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = date.date_naive();
    let first = day.with_day(1).unwrap_or(day);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month
        .map(|d| d - Duration::days(1))
        .unwrap_or(first);
    (start_of_day(first), end_of_day(last))
}
