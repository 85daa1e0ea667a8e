//! Rolling-window flow metrics over done cards

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use super::dates::{make_end_date, make_start_date};
use super::distribution::CycleTimeDistribution;
use super::stats::{median_absolute_deviation, rounded_average, standard_deviation};
use crate::db::{cached_times_between, count_done_between, CachedTime, CardFilter};

/// `[start of day (end - weeks), end of day (end)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub weeks: i64,
}

impl MovingWindow {
    pub fn ending(end: DateTime<Utc>, weeks: i64) -> Self {
        Self {
            start: make_start_date(end - Duration::weeks(weeks)),
            end: make_end_date(end),
            weeks,
        }
    }
}

async fn window_times(
    pool: &SqlitePool,
    filter: &CardFilter,
    kind: CachedTime,
    window: &MovingWindow,
) -> Result<Vec<i64>, sqlx::Error> {
    cached_times_between(pool, filter, kind, &window.start, &window.end).await
}

/// Average cycle time of cards done in the window, rounded; 0 when none
pub async fn moving_cycle_time(
    pool: &SqlitePool,
    filter: &CardFilter,
    window: &MovingWindow,
) -> Result<i64, sqlx::Error> {
    let times = window_times(pool, filter, CachedTime::Cycle, window).await?;
    Ok(rounded_average(&times))
}

/// Average lead time of cards done in the window, rounded; 0 when none
pub async fn moving_lead_time(
    pool: &SqlitePool,
    filter: &CardFilter,
    window: &MovingWindow,
) -> Result<i64, sqlx::Error> {
    let times = window_times(pool, filter, CachedTime::Lead, window).await?;
    Ok(rounded_average(&times))
}

pub async fn moving_std_dev(
    pool: &SqlitePool,
    filter: &CardFilter,
    window: &MovingWindow,
) -> Result<i64, sqlx::Error> {
    let times = window_times(pool, filter, CachedTime::Cycle, window).await?;
    Ok(standard_deviation(&times).map_or(0, |sd| sd.round() as i64))
}

pub async fn moving_median_abs_dev(
    pool: &SqlitePool,
    filter: &CardFilter,
    window: &MovingWindow,
) -> Result<i64, sqlx::Error> {
    let times = window_times(pool, filter, CachedTime::Cycle, window).await?;
    Ok(median_absolute_deviation(&times).map_or(0, |mad| mad.round() as i64))
}

pub async fn cycle_time_distribution(
    pool: &SqlitePool,
    filter: &CardFilter,
    window: &MovingWindow,
) -> Result<CycleTimeDistribution, sqlx::Error> {
    let times = window_times(pool, filter, CachedTime::Cycle, window).await?;
    Ok(CycleTimeDistribution::new(&times))
}

/// Cards done per week, averaged over the window
pub async fn weekly_throughput(
    pool: &SqlitePool,
    filter: &CardFilter,
    window: &MovingWindow,
) -> Result<f64, sqlx::Error> {
    if window.weeks <= 0 {
        return Ok(0.0);
    }
    let done = count_done_between(pool, filter, &window.start, &window.end).await?;
    Ok(done as f64 / window.weeks as f64)
}
