//! State history database operations

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{decode_time, encode_time};
use crate::domain::StateLogEntry;

/// Row type for state_logs table
#[derive(Debug, sqlx::FromRow)]
pub struct StateLogRow {
    pub id: String,
    pub card_id: String,
    pub state: String,
    pub entered: String,
    pub exited: Option<String>,
    pub duration: Option<i64>,
    pub service_class: Option<String>,
    pub created_at: String,
}

impl StateLogRow {
    pub fn to_entry(&self) -> StateLogEntry {
        StateLogEntry {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            card_id: Uuid::parse_str(&self.card_id).unwrap_or_default(),
            state: self.state.clone(),
            entered: decode_time(&self.entered).unwrap_or_else(Utc::now),
            exited: self.exited.as_deref().and_then(decode_time),
            duration: self.duration,
            service_class: self.service_class.clone(),
            created_at: decode_time(&self.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Open entries for a card in a state, most recently created first
pub async fn find_open_entries(
    conn: &mut SqliteConnection,
    card_id: &Uuid,
    state: &str,
) -> Result<Vec<StateLogEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StateLogRow>(
        r#"
        SELECT * FROM state_logs
        WHERE card_id = ? AND state = ? AND exited IS NULL
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .bind(card_id.to_string())
    .bind(state)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(|r| r.to_entry()).collect())
}

/// Most recently entered entry for a card in a state, open or closed
pub async fn latest_entry(
    conn: &mut SqliteConnection,
    card_id: &Uuid,
    state: &str,
) -> Result<Option<StateLogEntry>, sqlx::Error> {
    let row = sqlx::query_as::<_, StateLogRow>(
        r#"
        SELECT * FROM state_logs
        WHERE card_id = ? AND state = ?
        ORDER BY entered DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .bind(card_id.to_string())
    .bind(state)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|r| r.to_entry()))
}

pub async fn insert_entry(
    conn: &mut SqliteConnection,
    entry: &StateLogEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO state_logs (id, card_id, state, entered, exited, duration, service_class, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.card_id.to_string())
    .bind(&entry.state)
    .bind(encode_time(&entry.entered))
    .bind(entry.exited.as_ref().map(encode_time))
    .bind(entry.duration)
    .bind(&entry.service_class)
    .bind(encode_time(&entry.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Persist exit time, frozen duration and service class of an entry
pub async fn update_entry(
    conn: &mut SqliteConnection,
    entry: &StateLogEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE state_logs SET exited = ?, duration = ?, service_class = ? WHERE id = ?",
    )
    .bind(entry.exited.as_ref().map(encode_time))
    .bind(entry.duration)
    .bind(&entry.service_class)
    .bind(entry.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Full history of a card in entry order
pub async fn list_entries(
    pool: &SqlitePool,
    card_id: &Uuid,
) -> Result<Vec<StateLogEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StateLogRow>(
        "SELECT * FROM state_logs WHERE card_id = ? ORDER BY entered ASC, rowid ASC",
    )
    .bind(card_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.to_entry()).collect())
}

/// Number of open entries per card, for cards with more than `limit`
pub async fn cards_with_open_entries_over(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT card_id, COUNT(*) AS open_count FROM state_logs
        WHERE exited IS NULL
        GROUP BY card_id
        HAVING COUNT(*) > ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
