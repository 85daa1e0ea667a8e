//! Daily backlog / WIP / done counts

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::group::ReportGroup;
use super::ReportError;
use crate::config::Config;
use crate::db;
use crate::flow::{end_of_day, moving_cycle_time, moving_lead_time, start_of_day, MovingWindow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub group: String,
    /// Cards waiting in the backlog at the end of the day
    pub backlog: i64,
    pub in_progress: i64,
    /// Cards done on or before the day
    pub done: i64,
    /// Cards done on the day
    pub completed: i64,
    pub moving_cycle_time: i64,
    pub moving_lead_time: i64,
    pub updated_at: DateTime<Utc>,
}

impl DailyRecord {
    /// Recompute the record for `(date, group)` as of the end of that day and upsert it
    pub async fn calculate(
        pool: &SqlitePool,
        config: &Config,
        date: NaiveDate,
        group: &str,
    ) -> Result<DailyRecord, ReportError> {
        let filter = ReportGroup::resolve(config, group).filter();
        let day_start = start_of_day(date);
        let day_end = end_of_day(date);
        let window = MovingWindow::ending(day_end, config.flow.moving_average_weeks);

        let record = DailyRecord {
            date,
            group: group.to_string(),
            backlog: db::count_backlogged(pool, &filter, Some(&day_end)).await?,
            in_progress: db::count_in_progress(pool, &filter, Some(&day_end)).await?,
            done: db::count_done_by(pool, &filter, &day_end).await?,
            completed: db::count_done_between(pool, &filter, &day_start, &day_end).await?,
            moving_cycle_time: moving_cycle_time(pool, &filter, &window).await?,
            moving_lead_time: moving_lead_time(pool, &filter, &window).await?,
            updated_at: Utc::now(),
        };

        db::upsert_daily_record(pool, &record).await?;
        tracing::debug!(
            "Daily record {} / {}: backlog={} wip={} done={}",
            date,
            group,
            record.backlog,
            record.in_progress,
            record.done
        );

        Ok(record)
    }

    pub async fn get(
        pool: &SqlitePool,
        date: NaiveDate,
        group: &str,
    ) -> Result<DailyRecord, ReportError> {
        db::get_daily_record(pool, date, group)
            .await?
            .ok_or_else(|| ReportError::RecordNotFound {
                kind: "daily record",
                group: group.to_string(),
                date,
            })
    }

    /// Top edge of the backlog band on a cumulative flow chart
    pub fn backlog_cum(&self) -> i64 {
        self.backlog + self.in_progress + self.done
    }

    pub fn in_progress_cum(&self) -> i64 {
        self.in_progress + self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;
    use crate::domain::Card;
    use chrono::TimeZone;

    fn jan(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 1, d, 12, 0, 0).unwrap()
    }

    async fn store(pool: &SqlitePool, card: &Card) {
        let mut conn = pool.acquire().await.unwrap();
        db::upsert_card(&mut conn, card).await.unwrap();
    }

    #[tokio::test]
    async fn test_calculate_counts() {
        let (pool, _dir) = test_pool().await;
        let config = Config::default();

        let waiting = Card::new("R-1", jan(1)).with_state("Todo");
        let mut working = Card::new("R-2", jan(1)).with_state("Doing");
        working.start_date = Some(jan(3));
        let mut shipped = Card::new("R-3", jan(1)).with_state("Done");
        shipped.start_date = Some(jan(2));
        shipped.done_date = Some(jan(5));
        shipped.cycle_time = Some(3);
        shipped.lead_time = Some(4);
        for card in [&waiting, &working, &shipped] {
            store(&pool, card).await;
        }

        let day = jan(5).date_naive();
        let record = DailyRecord::calculate(&pool, &config, day, "all").await.unwrap();
        assert_eq!(record.backlog, 1);
        assert_eq!(record.in_progress, 1);
        assert_eq!(record.done, 1);
        assert_eq!(record.completed, 1);
        assert_eq!(record.moving_cycle_time, 3);
        assert_eq!(record.moving_lead_time, 4);
        assert_eq!(record.backlog_cum(), 3);
        assert_eq!(record.in_progress_cum(), 2);

        let earlier = DailyRecord::calculate(&pool, &config, jan(2).date_naive(), "all")
            .await
            .unwrap();
        assert_eq!(earlier.backlog, 2);
        assert_eq!(earlier.in_progress, 1);
        assert_eq!(earlier.done, 0);
    }

    #[tokio::test]
    async fn test_calculate_is_idempotent() {
        let (pool, _dir) = test_pool().await;
        let config = Config::default();
        store(&pool, &Card::new("I-1", jan(1)).with_state("Todo")).await;

        let day = jan(4).date_naive();
        let first = DailyRecord::calculate(&pool, &config, day, "all").await.unwrap();
        let second = DailyRecord::calculate(&pool, &config, day, "all").await.unwrap();

        assert_eq!(db::count_daily_records(&pool).await.unwrap(), 1);
        assert_eq!(first.backlog, second.backlog);
        assert_eq!(first.moving_cycle_time, second.moving_cycle_time);

        let stored = DailyRecord::get(&pool, day, "all").await.unwrap();
        assert_eq!(stored.backlog, 1);
    }

    #[tokio::test]
    async fn test_missing_record() {
        let (pool, _dir) = test_pool().await;
        let result = DailyRecord::get(&pool, jan(4).date_naive(), "all").await;
        assert!(matches!(result, Err(ReportError::RecordNotFound { .. })));
    }
}
