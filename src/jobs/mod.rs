//! Background jobs - ticket refreshes and snapshot recomputation
//!
//! Every entry point is idempotent: ticket refreshes go through the tracker's
//! save path and snapshots are upserted by key, so a retried or overlapping
//! run converges on the same state. Batch entry points log and skip
//! per-item failures and report how many succeeded.

mod scheduler;

pub use scheduler::Scheduler;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::db;
use crate::reports::{DailyRecord, FlowReport, ReportError, ServiceClassSnapshot};
use crate::state_machine::{CardTracker, SaveOutcome, TrackerError};
use crate::tickets::{refresh_card, TicketAdapter, TicketError};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Successes and failures of a batch job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record<T, E>(&mut self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

pub struct JobRunner {
    tracker: CardTracker,
    adapter: Arc<dyn TicketAdapter>,
}

impl JobRunner {
    pub fn new(tracker: CardTracker, adapter: Arc<dyn TicketAdapter>) -> Self {
        Self { tracker, adapter }
    }

    pub fn tracker(&self) -> &CardTracker {
        &self.tracker
    }

    /// Refresh one card from the ticket system
    pub async fn update_ticket(&self, key: &str) -> Result<SaveOutcome, JobError> {
        self.update_ticket_at(key, Utc::now()).await
    }

    pub async fn update_ticket_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, JobError> {
        tracing::info!("update_ticket running for {}", key);
        let outcome = refresh_card(&self.tracker, self.adapter.as_ref(), key, now).await?;
        if outcome.has_anomaly() {
            tracing::warn!(card = key, "History repaired while refreshing ticket");
        }
        Ok(outcome)
    }

    /// Refresh every card whose ticket data has gone stale
    pub async fn queue_updates(&self) -> Result<BatchSummary, JobError> {
        let jobs = &self.tracker.config().jobs;
        let now = Utc::now();
        let stale_before = now - Duration::seconds(jobs.stale_after_secs);
        let done_after = now - Duration::days(jobs.done_horizon_days);

        let keys = db::keys_needing_refresh(self.tracker.pool(), &stale_before, &done_after).await?;
        if keys.is_empty() {
            tracing::debug!("No stale tickets");
            return Ok(BatchSummary::default());
        }
        tracing::info!("Queueing {} ticket update(s)", keys.len());

        let results: Vec<(String, Result<SaveOutcome, JobError>)> = stream::iter(keys)
            .map(|key| async move {
                let result = self.update_ticket(&key).await;
                (key, result)
            })
            .buffer_unordered(jobs.update_concurrency.max(1))
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for (key, result) in &results {
            summary.record(result);
            if let Err(e) = result {
                tracing::error!("Failed to update ticket {}: {}", key, e);
            }
        }

        tracing::info!(
            "Ticket updates finished: {} ok, {} failed",
            summary.succeeded,
            summary.failed
        );
        Ok(summary)
    }

    /// Recompute the last `days` daily records for every report group
    pub async fn update_daily_records(&self, days: i64) -> BatchSummary {
        let config = self.tracker.config();
        let today = Utc::now().date_naive();
        let mut summary = BatchSummary::default();

        for group in config.report_group_names() {
            for offset in 0..days.max(1) {
                let date = today - Duration::days(offset);
                let result =
                    DailyRecord::calculate(self.tracker.pool(), config, date, &group).await;
                if let Err(e) = &result {
                    tracing::error!("Daily record {} / {} failed: {}", date, group, e);
                }
                summary.record(&result);
            }
        }

        tracing::info!(
            "Daily records updated: {} ok, {} failed",
            summary.succeeded,
            summary.failed
        );
        summary
    }

    /// Capture today's flow report and the current service class snapshot per group
    pub async fn update_flow_reports(&self) -> BatchSummary {
        let config = self.tracker.config();
        let pool = self.tracker.pool();
        let now = Utc::now();
        let mut summary = BatchSummary::default();

        for group in config.report_group_names() {
            let report = FlowReport::capture(pool, config, &group, now).await;
            if let Err(e) = &report {
                tracing::error!("Flow report for {} failed: {}", group, e);
            }
            summary.record(&report);

            let snapshot = ServiceClassSnapshot::calculate(pool, config, &group, now).await;
            if let Err(e) = &snapshot {
                tracing::error!("Service class snapshot for {} failed: {}", group, e);
            }
            summary.record(&snapshot);
        }

        tracing::info!(
            "Flow reports updated: {} ok, {} failed",
            summary.succeeded,
            summary.failed
        );
        summary
    }
}
