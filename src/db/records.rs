//! Snapshot aggregate persistence - upserts keyed by date and report group

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use super::{decode_date, decode_time, encode_date, encode_time};
use crate::reports::{DailyRecord, FlowReport, ServiceClassRecord, ServiceClassSnapshot};

#[derive(Debug, sqlx::FromRow)]
struct DailyRecordRow {
    date: String,
    report_group: String,
    backlog: i64,
    in_progress: i64,
    done: i64,
    completed: i64,
    moving_cycle_time: i64,
    moving_lead_time: i64,
    updated_at: String,
}

impl From<DailyRecordRow> for DailyRecord {
    fn from(row: DailyRecordRow) -> Self {
        DailyRecord {
            date: decode_date(&row.date).unwrap_or_default(),
            group: row.report_group,
            backlog: row.backlog,
            in_progress: row.in_progress,
            done: row.done,
            completed: row.completed,
            moving_cycle_time: row.moving_cycle_time,
            moving_lead_time: row.moving_lead_time,
            updated_at: decode_time(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FlowReportRow {
    date: String,
    report_group: String,
    state_counts: String,
    updated_at: String,
}

impl From<FlowReportRow> for FlowReport {
    fn from(row: FlowReportRow) -> Self {
        FlowReport {
            date: decode_date(&row.date).unwrap_or_default(),
            group: row.report_group,
            state_counts: serde_json::from_str(&row.state_counts).unwrap_or_default(),
            updated_at: decode_time(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ServiceClassRecordRow {
    start_date: String,
    end_date: String,
    report_group: String,
    data: String,
    updated_at: String,
}

impl From<ServiceClassRecordRow> for ServiceClassRecord {
    fn from(row: ServiceClassRecordRow) -> Self {
        ServiceClassRecord {
            start_date: decode_date(&row.start_date).unwrap_or_default(),
            end_date: decode_date(&row.end_date).unwrap_or_default(),
            group: row.report_group,
            data: serde_json::from_str(&row.data).unwrap_or_default(),
            updated_at: decode_time(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ServiceClassSnapshotRow {
    report_group: String,
    data: String,
    updated_at: String,
}

impl From<ServiceClassSnapshotRow> for ServiceClassSnapshot {
    fn from(row: ServiceClassSnapshotRow) -> Self {
        ServiceClassSnapshot {
            group: row.report_group,
            data: serde_json::from_str(&row.data).unwrap_or_default(),
            updated_at: decode_time(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

pub async fn get_daily_record(
    pool: &SqlitePool,
    date: NaiveDate,
    group: &str,
) -> Result<Option<DailyRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, DailyRecordRow>(
        "SELECT * FROM daily_records WHERE date = ? AND report_group = ?",
    )
    .bind(encode_date(&date))
    .bind(group)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(DailyRecord::from))
}

pub async fn upsert_daily_record(pool: &SqlitePool, record: &DailyRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO daily_records (
            date, report_group, backlog, in_progress, done, completed,
            moving_cycle_time, moving_lead_time, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(date, report_group) DO UPDATE SET
            backlog = excluded.backlog,
            in_progress = excluded.in_progress,
            done = excluded.done,
            completed = excluded.completed,
            moving_cycle_time = excluded.moving_cycle_time,
            moving_lead_time = excluded.moving_lead_time,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(encode_date(&record.date))
    .bind(&record.group)
    .bind(record.backlog)
    .bind(record.in_progress)
    .bind(record.done)
    .bind(record.completed)
    .bind(record.moving_cycle_time)
    .bind(record.moving_lead_time)
    .bind(encode_time(&record.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn count_daily_records(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM daily_records")
        .fetch_one(pool)
        .await
}

pub async fn get_flow_report(
    pool: &SqlitePool,
    date: NaiveDate,
    group: &str,
) -> Result<Option<FlowReport>, sqlx::Error> {
    let row = sqlx::query_as::<_, FlowReportRow>(
        "SELECT * FROM flow_reports WHERE date = ? AND report_group = ?",
    )
    .bind(encode_date(&date))
    .bind(group)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(FlowReport::from))
}

pub async fn upsert_flow_report(pool: &SqlitePool, report: &FlowReport) -> Result<(), sqlx::Error> {
    let state_counts =
        serde_json::to_string(&report.state_counts).unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        r#"
        INSERT INTO flow_reports (date, report_group, state_counts, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(date, report_group) DO UPDATE SET
            state_counts = excluded.state_counts,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(encode_date(&report.date))
    .bind(&report.group)
    .bind(state_counts)
    .bind(encode_time(&report.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_service_class_record(
    pool: &SqlitePool,
    start: NaiveDate,
    end: NaiveDate,
    group: &str,
) -> Result<Option<ServiceClassRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, ServiceClassRecordRow>(
        r#"
        SELECT * FROM service_class_records
        WHERE start_date = ? AND end_date = ? AND report_group = ?
        "#,
    )
    .bind(encode_date(&start))
    .bind(encode_date(&end))
    .bind(group)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ServiceClassRecord::from))
}

pub async fn upsert_service_class_record(
    pool: &SqlitePool,
    record: &ServiceClassRecord,
) -> Result<(), sqlx::Error> {
    let data = serde_json::to_string(&record.data).unwrap_or_else(|_| "{}".to_string());

    sqlx::query(
        r#"
        INSERT INTO service_class_records (start_date, end_date, report_group, data, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(start_date, end_date, report_group) DO UPDATE SET
            data = excluded.data,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(encode_date(&record.start_date))
    .bind(encode_date(&record.end_date))
    .bind(&record.group)
    .bind(data)
    .bind(encode_time(&record.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_service_class_snapshot(
    pool: &SqlitePool,
    group: &str,
) -> Result<Option<ServiceClassSnapshot>, sqlx::Error> {
    let row = sqlx::query_as::<_, ServiceClassSnapshotRow>(
        "SELECT * FROM service_class_snapshots WHERE report_group = ?",
    )
    .bind(group)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ServiceClassSnapshot::from))
}

pub async fn upsert_service_class_snapshot(
    pool: &SqlitePool,
    snapshot: &ServiceClassSnapshot,
) -> Result<(), sqlx::Error> {
    let data = serde_json::to_string(&snapshot.data).unwrap_or_else(|_| "{}".to_string());

    sqlx::query(
        r#"
        INSERT INTO service_class_snapshots (report_group, data, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(report_group) DO UPDATE SET
            data = excluded.data,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&snapshot.group)
    .bind(data)
    .bind(encode_time(&snapshot.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}
