//! Database module - SQLite with sqlx

mod cards;
mod pool;
mod records;
mod statelog;

pub use cards::*;
pub use pool::*;
pub use records::*;
pub use statelog::*;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Fixed-width RFC3339 so text comparison in SQL orders by time
pub(crate) fn encode_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn encode_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn decode_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    /// Fresh migrated database in a temp directory; keep the `TempDir` alive
    pub async fn test_pool() -> (SqlitePool, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kardboard-test.db");
        let pool = super::init_database(&format!("sqlite://{}", path.display()))
            .await
            .unwrap();
        (pool, dir)
    }
}
