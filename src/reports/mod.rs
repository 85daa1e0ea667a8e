//! Reporting snapshots and views.
//!
//! Snapshots (daily records, flow reports, service class records) are keyed by
//! date and report group and upserted, so recalculating one is always safe.

mod board;
mod daily_record;
mod flow_report;
mod group;
mod service_class;
mod summary;

pub use board::*;
pub use daily_record::*;
pub use flow_report::*;
pub use group::*;
pub use service_class::*;
pub use summary::*;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::DomainError;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("No {kind} for group '{group}' on {date}")]
    RecordNotFound {
        kind: &'static str,
        group: String,
        date: NaiveDate,
    },
}
