//! Periodic job loops

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::JobRunner;
use crate::config::JobsConfig;

pub struct Scheduler {
    runner: Arc<JobRunner>,
    config: JobsConfig,
}

impl Scheduler {
    pub fn new(runner: Arc<JobRunner>, config: JobsConfig) -> Self {
        Self { runner, config }
    }

    /// Spawn the ticket and report loops; both run until their handles are aborted
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        tracing::info!(
            "Starting scheduler (tickets every {}s, reports every {}s)",
            self.config.ticket_update_interval_secs,
            self.config.report_interval_secs
        );

        let tickets = {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                scheduler.ticket_loop().await;
            })
        };

        let reports = {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                scheduler.report_loop().await;
            })
        };

        vec![tickets, reports]
    }

    async fn ticket_loop(&self) {
        let period = Duration::from_secs(self.config.ticket_update_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;

            if let Err(e) = self.runner.queue_updates().await {
                tracing::error!("Error queueing ticket updates: {}", e);
            }
        }
    }

    async fn report_loop(&self) {
        let period = Duration::from_secs(self.config.report_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;

            self.runner
                .update_daily_records(self.config.daily_record_days)
                .await;
            self.runner.update_flow_reports().await;
        }
    }
}
