//! Adapter for boards with no ticket system

use async_trait::async_trait;

use super::{TicketAdapter, TicketError};
use crate::config::TicketSystem;
use crate::domain::{Card, TicketData};

pub struct NullAdapter;

#[async_trait]
impl TicketAdapter for NullAdapter {
    fn kind(&self) -> TicketSystem {
        TicketSystem::Null
    }

    fn ticket_url(&self, _key: &str) -> Option<String> {
        None
    }

    async fn fetch(&self, _card: &Card) -> Result<Option<TicketData>, TicketError> {
        Ok(None)
    }
}
