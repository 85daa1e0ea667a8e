//! Weekly flow summary built from stored snapshots

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::daily_record::DailyRecord;
use super::flow_report::FlowReport;
use super::group::ReportGroup;
use super::ReportError;
use crate::config::Config;
use crate::db;
use crate::flow::{week_range, weekly_throughput, MovingWindow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyFlowSummary {
    pub group: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub features_done: usize,
    pub bugfixes_done: usize,
    /// Work in progress at the end of the week, from the flow report
    pub wip: i64,
    /// Cards finished per day, averaged over the throughput window
    pub daily_throughput: f64,
    /// Days to clear the current WIP at that throughput
    pub little_law_days: Option<f64>,
    pub moving_cycle_time: i64,
}

impl WeeklyFlowSummary {
    /// Summarize the Sunday-Saturday week containing `week_of`.
    ///
    /// Needs the flow report and daily record for the last day of the week.
    pub async fn calculate(
        pool: &SqlitePool,
        config: &Config,
        group: &str,
        week_of: DateTime<Utc>,
    ) -> Result<WeeklyFlowSummary, ReportError> {
        let (start, end) = week_range(week_of);
        let last_day = end.date_naive();

        let report = FlowReport::get(pool, last_day, group).await?;
        let record = DailyRecord::get(pool, last_day, group).await?;

        let states = config.state_sequence()?;
        let filter = ReportGroup::resolve(config, group).filter();

        let done = db::done_cards_between(pool, &filter, &start, &end).await?;
        let features_done = done
            .iter()
            .filter(|card| card.is_card(&config.defect_types))
            .count();

        let window = MovingWindow::ending(end, config.flow.throughput_weeks);
        let daily_throughput = weekly_throughput(pool, &filter, &window).await? / 7.0;
        let wip = report.wip(&states);
        let little_law_days = (daily_throughput > 0.0).then(|| wip as f64 / daily_throughput);

        Ok(WeeklyFlowSummary {
            group: group.to_string(),
            week_start: start.date_naive(),
            week_end: last_day,
            features_done,
            bugfixes_done: done.len() - features_done,
            wip,
            daily_throughput,
            little_law_days,
            moving_cycle_time: record.moving_cycle_time,
        })
    }
}
