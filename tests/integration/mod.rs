//! End-to-end tests against a real on-disk database

mod lifecycle;
mod reporting;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use kardboard::config::Config;
use kardboard::db::init_database;
use kardboard::state_machine::CardTracker;
use tempfile::TempDir;

/// Fresh database plus a tracker over it; keep the `TempDir` alive for the test
pub async fn setup(config: Config) -> (CardTracker, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("kardboard.db").display());
    let pool = init_database(&url).await.expect("database");
    let tracker = CardTracker::new(pool, Arc::new(config)).expect("tracker");
    (tracker, dir)
}

pub fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2012, month, day, hour, 0, 0).unwrap()
}
