//! Canned ticket data for tests and demos

use async_trait::async_trait;

use super::{TicketAdapter, TicketError};
use crate::config::TicketSystem;
use crate::domain::{Card, TicketData};

pub const DUMMY_SUMMARY: &str = "Dummy Title from Dummy Ticket System";

/// Returns the same title for every card and echoes back its service class
/// and version so a refresh leaves them untouched
pub struct DummyAdapter;

#[async_trait]
impl TicketAdapter for DummyAdapter {
    fn kind(&self) -> TicketSystem {
        TicketSystem::Dummy
    }

    fn ticket_url(&self, key: &str) -> Option<String> {
        Some(format!("http://example.com/ticket/{}", key))
    }

    async fn fetch(&self, card: &Card) -> Result<Option<TicketData>, TicketError> {
        Ok(Some(TicketData {
            key: Some(card.key.clone()),
            summary: Some(DUMMY_SUMMARY.to_string()),
            service_class: card.service_class.clone(),
            version: card.version.clone(),
            ticket_type: card.card_type.clone(),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_fetch_echoes_card_fields() {
        let card = Card::new("D-1", Utc::now()).with_service_class("Expedite");
        let data = DummyAdapter.fetch(&card).await.unwrap().unwrap();

        assert_eq!(data.summary.as_deref(), Some(DUMMY_SUMMARY));
        assert_eq!(data.service_class.as_deref(), Some("Expedite"));
        assert_eq!(data.status, None);
    }
}
