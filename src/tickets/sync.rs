use chrono::{DateTime, Utc};

use super::{TicketAdapter, TicketError};
use crate::state_machine::{CardTracker, SaveOutcome};

/// Pull the ticket for `key` and save the card with whatever changed
pub async fn refresh_card(
    tracker: &CardTracker,
    adapter: &dyn TicketAdapter,
    key: &str,
    now: DateTime<Utc>,
) -> Result<SaveOutcome, TicketError> {
    let mut card = tracker.get(key).await?;

    match adapter.fetch(&card).await? {
        Some(data) => card.apply_ticket_data(data, tracker.config(), now),
        None => card.ticket_system_updated_at = Some(now),
    }

    let outcome = tracker.save_at(&mut card, now).await?;
    tracing::debug!("{} refreshed from {}", card.key, adapter.kind());

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::test_support::test_pool;
    use crate::domain::{Card, TicketData};
    use crate::tickets::{DummyAdapter, NullAdapter};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 8, 1, 9, 0, 0).unwrap()
    }

    /// Reports a fixed tracker status
    struct StatusAdapter(&'static str);

    #[async_trait]
    impl TicketAdapter for StatusAdapter {
        fn kind(&self) -> crate::config::TicketSystem {
            crate::config::TicketSystem::Dummy
        }

        fn ticket_url(&self, _key: &str) -> Option<String> {
            None
        }

        async fn fetch(&self, card: &Card) -> Result<Option<TicketData>, TicketError> {
            Ok(Some(TicketData {
                key: Some(card.key.clone()),
                summary: Some("Mapped".into()),
                status: Some(self.0.to_string()),
                ..Default::default()
            }))
        }
    }

    #[tokio::test]
    async fn test_refresh_with_dummy() {
        let (pool, _dir) = test_pool().await;
        let tracker = CardTracker::new(pool, Arc::new(Config::default())).unwrap();
        let mut card = Card::new("T-1", t0()).with_state("Todo");
        tracker.save_at(&mut card, t0()).await.unwrap();

        let outcome = refresh_card(&tracker, &DummyAdapter, "T-1", t0() + Duration::hours(1))
            .await
            .unwrap();
        assert!(!outcome.changed_state());

        let stored = tracker.get("T-1").await.unwrap();
        assert_eq!(stored.title, crate::tickets::dummy::DUMMY_SUMMARY);
        assert_eq!(stored.card_type.as_deref(), Some("Feature"));
        assert_eq!(stored.ticket_system_updated_at, Some(t0() + Duration::hours(1)));
        assert!(stored.ticket_system_data.is_some());
    }

    #[tokio::test]
    async fn test_refresh_with_null_touches_timestamp() {
        let (pool, _dir) = test_pool().await;
        let tracker = CardTracker::new(pool, Arc::new(Config::default())).unwrap();
        let mut card = Card::new("T-2", t0()).with_state("Todo").with_title("Keep me");
        tracker.save_at(&mut card, t0()).await.unwrap();

        refresh_card(&tracker, &NullAdapter, "T-2", t0()).await.unwrap();

        let stored = tracker.get("T-2").await.unwrap();
        assert_eq!(stored.title, "Keep me");
        assert_eq!(stored.ticket_system_updated_at, Some(t0()));
    }

    #[tokio::test]
    async fn test_mapped_status_moves_card() {
        let (pool, _dir) = test_pool().await;
        let mut config = Config::default();
        config
            .status_mapping
            .insert("In Development".into(), "Doing".into());
        let tracker = CardTracker::new(pool, Arc::new(config)).unwrap();

        let mut card = Card::new("T-3", t0()).with_state("Todo");
        tracker.save_at(&mut card, t0()).await.unwrap();

        let adapter = StatusAdapter("In Development");
        let outcome = refresh_card(&tracker, &adapter, "T-3", t0() + Duration::hours(24))
            .await
            .unwrap();
        let transition = outcome.transition.unwrap();
        assert_eq!(transition.from.as_deref(), Some("Todo"));
        assert_eq!(transition.to, "Doing");
        assert_eq!(outcome.closed[0].duration, Some(24));
    }

    #[tokio::test]
    async fn test_refresh_unknown_card() {
        let (pool, _dir) = test_pool().await;
        let tracker = CardTracker::new(pool, Arc::new(Config::default())).unwrap();
        let result = refresh_card(&tracker, &DummyAdapter, "NOPE-1", t0()).await;
        assert!(matches!(result, Err(TicketError::Tracker(_))));
    }
}
