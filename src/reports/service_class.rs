//! Service class compliance - current WIP per class and dated records of done cards

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::group::ReportGroup;
use super::ReportError;
use crate::config::Config;
use crate::db;
use crate::domain::{Card, ServiceClass, ServiceClasses};
use crate::flow::{end_of_day, percent, rounded_average, start_of_day, DayCount};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceClassStats {
    pub service_class: String,
    pub wip: usize,
    /// Fractions in `[0, 1]`
    pub wip_percent: f64,
    pub cycle_time_average: i64,
    pub cards_hit_goal: usize,
    pub cards_hit_goal_percent: f64,
}

/// Group cards by service class and measure each class against its goal.
///
/// Cards land under their resolved class, so a class without a goal of its
/// own is reported as `default`. Done cards are measured by their cycle time,
/// open ones by their current cycle time as of `today`.
pub fn report_on_cards(
    cards: &[Card],
    classes: &ServiceClasses,
    day_count: DayCount,
    today: DateTime<Utc>,
) -> BTreeMap<String, ServiceClassStats> {
    let mut by_class: BTreeMap<String, (ServiceClass, Vec<i64>)> = BTreeMap::new();
    for card in cards {
        let cycle_time = card
            .cycle_time
            .or_else(|| card.current_cycle_time(day_count, today))
            .unwrap_or(0);
        let class = card.resolve_service_class(classes);
        by_class
            .entry(class.name.clone())
            .or_insert_with(|| (class, Vec::new()))
            .1
            .push(cycle_time);
    }

    by_class
        .into_iter()
        .map(|(name, (class, times))| {
            let hit = times.iter().filter(|t| class.hit_goal(**t)).count();
            let stats = ServiceClassStats {
                service_class: name.clone(),
                wip: times.len(),
                wip_percent: percent(times.len(), cards.len()),
                cycle_time_average: rounded_average(&times),
                cards_hit_goal: hit,
                cards_hit_goal_percent: percent(hit, times.len()),
            };
            (name, stats)
        })
        .collect()
}

/// Service class breakdown of the work currently in progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceClassSnapshot {
    pub group: String,
    #[serde(default)]
    pub data: BTreeMap<String, ServiceClassStats>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceClassSnapshot {
    pub async fn calculate(
        pool: &SqlitePool,
        config: &Config,
        group: &str,
        now: DateTime<Utc>,
    ) -> Result<ServiceClassSnapshot, ReportError> {
        let filter = ReportGroup::resolve(config, group).filter();
        let cards = db::in_progress_cards(pool, &filter, None).await?;
        let data = report_on_cards(
            &cards,
            &config.service_class_table(),
            config.flow.day_count,
            now,
        );

        let snapshot = ServiceClassSnapshot {
            group: group.to_string(),
            data,
            updated_at: Utc::now(),
        };
        db::upsert_service_class_snapshot(pool, &snapshot).await?;

        Ok(snapshot)
    }
}

/// Service class breakdown of the cards done in a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceClassRecord {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub group: String,
    #[serde(default)]
    pub data: BTreeMap<String, ServiceClassStats>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceClassRecord {
    pub async fn calculate(
        pool: &SqlitePool,
        config: &Config,
        start: NaiveDate,
        end: NaiveDate,
        group: &str,
    ) -> Result<ServiceClassRecord, ReportError> {
        let filter = ReportGroup::resolve(config, group).filter();
        let cards =
            db::done_cards_between(pool, &filter, &start_of_day(start), &end_of_day(end)).await?;
        let data = report_on_cards(
            &cards,
            &config.service_class_table(),
            config.flow.day_count,
            end_of_day(end),
        );

        let record = ServiceClassRecord {
            start_date: start,
            end_date: end,
            group: group.to_string(),
            data,
            updated_at: Utc::now(),
        };
        db::upsert_service_class_record(pool, &record).await?;

        Ok(record)
    }

    pub async fn get(
        pool: &SqlitePool,
        start: NaiveDate,
        end: NaiveDate,
        group: &str,
    ) -> Result<ServiceClassRecord, ReportError> {
        db::get_service_class_record(pool, start, end, group)
            .await?
            .ok_or_else(|| ReportError::RecordNotFound {
                kind: "service class record",
                group: group.to_string(),
                date: start,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceClassConfig;
    use crate::db::test_support::test_pool;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;

    fn today() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 4, 20, 12, 0, 0).unwrap()
    }

    fn classes() -> ServiceClasses {
        let mut config = HashMap::new();
        config.insert(
            "default".to_string(),
            ServiceClassConfig {
                lower: Some(3),
                upper: Some(10),
                wip: None,
            },
        );
        config.insert(
            "Expedite".to_string(),
            ServiceClassConfig {
                lower: None,
                upper: Some(2),
                wip: Some(0.1),
            },
        );
        ServiceClasses::from_config(&config)
    }

    fn started(key: &str, days_ago: i64) -> Card {
        let mut card = Card::new(key, today() - Duration::days(days_ago + 1)).with_state("Doing");
        card.start_date = Some(today() - Duration::days(days_ago));
        card
    }

    #[test]
    fn test_report_on_cards() {
        let cards = vec![
            started("S-1", 5),
            started("S-2", 12),
            started("S-3", 1).with_service_class("Expedite"),
            started("S-4", 4).with_service_class("Expedite"),
        ];

        let report = report_on_cards(&cards, &classes(), DayCount::Calendar, today());
        assert_eq!(report.len(), 2);

        let default = &report["default"];
        assert_eq!(default.wip, 2);
        assert_eq!(default.wip_percent, 0.5);
        assert_eq!(default.cycle_time_average, 9);
        assert_eq!(default.cards_hit_goal, 1);
        assert_eq!(default.cards_hit_goal_percent, 0.5);

        let expedite = &report["Expedite"];
        assert_eq!(expedite.cards_hit_goal, 1);
        assert_eq!(expedite.cycle_time_average, 3);
    }

    #[test]
    fn test_unconfigured_class_reports_as_default() {
        let cards = vec![
            started("L-1", 5).with_service_class("Legacy"),
            started("L-2", 1).with_service_class("Expedite"),
        ];

        let report = report_on_cards(&cards, &classes(), DayCount::Calendar, today());
        assert!(!report.contains_key("Legacy"));
        assert_eq!(report["default"].service_class, "default");
        assert_eq!(report["default"].wip, 1);
        assert_eq!(report["default"].cards_hit_goal, 1);
        assert_eq!(report["Expedite"].wip, 1);
    }

    #[test]
    fn test_report_on_no_cards() {
        let report = report_on_cards(&[], &classes(), DayCount::Calendar, today());
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_record_covers_done_cards_in_range() {
        let (pool, _dir) = test_pool().await;
        let config = Config::default();

        let mut inside = started("S-5", 6).with_state("Done");
        inside.done_date = Some(today());
        inside.cycle_time = Some(6);
        let mut outside = started("S-6", 30).with_state("Done");
        outside.done_date = Some(today() - Duration::days(20));
        outside.cycle_time = Some(10);
        for card in [&inside, &outside, &started("S-7", 2)] {
            let mut conn = pool.acquire().await.unwrap();
            db::upsert_card(&mut conn, card).await.unwrap();
        }

        let start = (today() - Duration::days(6)).date_naive();
        let end = today().date_naive();
        let record = ServiceClassRecord::calculate(&pool, &config, start, end, "all")
            .await
            .unwrap();
        assert_eq!(record.data["default"].wip, 1);
        assert_eq!(record.data["default"].cycle_time_average, 6);

        let stored = ServiceClassRecord::get(&pool, start, end, "all").await.unwrap();
        assert_eq!(stored.data, record.data);

        let snapshot = ServiceClassSnapshot::calculate(&pool, &config, "all", today())
            .await
            .unwrap();
        assert_eq!(snapshot.data["default"].wip, 1);
        let stored = db::get_service_class_snapshot(&pool, "all").await.unwrap().unwrap();
        assert_eq!(stored.data, snapshot.data);
    }
}
