//! State history log - the two phases of a logged transition.
//!
//! Both phases run on the caller's connection so a save can wrap them in one
//! transaction: `close_current` before the card row is written, `open_new`
//! after it.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db;
use crate::domain::StateLogEntry;

/// Result of closing the interval for the state a card is leaving
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// Entries closed, newest first; more than one means history was duplicated
    Closed(Vec<StateLogEntry>),
    /// No open entry existed for the old state
    Missing,
}

/// Result of opening (or reusing) the interval for the state a card enters
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOutcome {
    pub entry: StateLogEntry,
    pub reused: bool,
    /// Older open entries for the same state that were closed off
    pub duplicates: usize,
}

pub struct StateHistoryLog;

impl StateHistoryLog {
    /// Close every open entry for `(card, state)` at `exited`
    pub async fn close_current(
        conn: &mut SqliteConnection,
        card_id: &Uuid,
        state: &str,
        exited: DateTime<Utc>,
    ) -> Result<CloseOutcome, sqlx::Error> {
        let open = db::find_open_entries(&mut *conn, card_id, state).await?;
        if open.is_empty() {
            return Ok(CloseOutcome::Missing);
        }

        let mut closed = Vec::with_capacity(open.len());
        for mut entry in open {
            entry.close(exited);
            db::update_entry(&mut *conn, &entry).await?;
            closed.push(entry);
        }

        Ok(CloseOutcome::Closed(closed))
    }

    /// Find or create the open entry for `(card, state)` and stamp its service class.
    ///
    /// When several are open the newest is reused and the older ones are
    /// closed at the moment the newest was entered.
    pub async fn open_new(
        conn: &mut SqliteConnection,
        card_id: &Uuid,
        state: &str,
        entered: DateTime<Utc>,
        service_class: &str,
    ) -> Result<OpenOutcome, sqlx::Error> {
        let mut open = db::find_open_entries(&mut *conn, card_id, state).await?.into_iter();

        let Some(mut entry) = open.next() else {
            let entry = StateLogEntry::new(*card_id, state.to_string(), entered)
                .with_service_class(Some(service_class.to_string()));
            db::insert_entry(&mut *conn, &entry).await?;
            return Ok(OpenOutcome {
                entry,
                reused: false,
                duplicates: 0,
            });
        };

        let mut duplicates = 0;
        for mut stale in open {
            stale.close(entry.entered.max(stale.entered));
            db::update_entry(&mut *conn, &stale).await?;
            duplicates += 1;
        }

        entry.service_class = Some(service_class.to_string());
        db::update_entry(&mut *conn, &entry).await?;

        Ok(OpenOutcome {
            entry,
            reused: true,
            duplicates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_support::test_pool, upsert_card};
    use crate::domain::Card;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 1, 2, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_close_missing_entry() {
        let (pool, _dir) = test_pool().await;
        let card = Card::new("H-1", t0()).with_state("Todo");
        let mut conn = pool.acquire().await.unwrap();
        upsert_card(&mut conn, &card).await.unwrap();

        let outcome = StateHistoryLog::close_current(&mut conn, &card.id, "Todo", t0())
            .await
            .unwrap();
        assert_eq!(outcome, CloseOutcome::Missing);
    }

    #[tokio::test]
    async fn test_open_then_close() {
        let (pool, _dir) = test_pool().await;
        let card = Card::new("H-2", t0()).with_state("Todo");
        let mut conn = pool.acquire().await.unwrap();
        upsert_card(&mut conn, &card).await.unwrap();

        let opened = StateHistoryLog::open_new(&mut conn, &card.id, "Todo", t0(), "default")
            .await
            .unwrap();
        assert!(!opened.reused);
        assert_eq!(opened.entry.service_class.as_deref(), Some("default"));

        let again = StateHistoryLog::open_new(&mut conn, &card.id, "Todo", t0(), "Expedite")
            .await
            .unwrap();
        assert!(again.reused);
        assert_eq!(again.entry.id, opened.entry.id);
        assert_eq!(again.entry.service_class.as_deref(), Some("Expedite"));

        let closed =
            StateHistoryLog::close_current(&mut conn, &card.id, "Todo", t0() + Duration::hours(48))
                .await
                .unwrap();
        match closed {
            CloseOutcome::Closed(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].duration, Some(48));
            }
            CloseOutcome::Missing => panic!("expected an open entry"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_open_entries_are_collapsed() {
        let (pool, _dir) = test_pool().await;
        let card = Card::new("H-3", t0()).with_state("Doing");
        let mut conn = pool.acquire().await.unwrap();
        upsert_card(&mut conn, &card).await.unwrap();

        let older = StateLogEntry::new(card.id, "Doing".into(), t0());
        let mut newer = StateLogEntry::new(card.id, "Doing".into(), t0() + Duration::hours(5));
        newer.created_at = older.created_at + Duration::seconds(1);
        db::insert_entry(&mut conn, &older).await.unwrap();
        db::insert_entry(&mut conn, &newer).await.unwrap();

        let outcome = StateHistoryLog::open_new(&mut conn, &card.id, "Doing", t0(), "default")
            .await
            .unwrap();
        assert!(outcome.reused);
        assert_eq!(outcome.entry.id, newer.id);
        assert_eq!(outcome.duplicates, 1);

        let open = db::find_open_entries(&mut conn, &card.id, "Doing").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, newer.id);
    }
}
