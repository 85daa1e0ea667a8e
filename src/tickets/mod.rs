//! Ticket system adapters
//!
//! Cards mirror tickets from an external tracker. An adapter fetches the
//! ticket payload for a card; `refresh_card` applies it and saves the card
//! through the tracker so state changes are logged like any other save.

pub mod dummy;
pub mod jira;
pub mod null;
mod sync;

pub use dummy::DummyAdapter;
pub use jira::{JiraAdapter, JiraSession};
pub use null::NullAdapter;
pub use sync::refresh_card;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, TicketSystem};
use crate::domain::{Card, TicketData};
use crate::state_machine::TrackerError;

#[derive(Error, Debug)]
pub enum TicketError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Authentication required")]
    AuthRequired,

    #[error("Ticket not found: {0}")]
    NotFound(String),

    #[error("Ticket system not configured: {0}")]
    NotConfigured(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Source of ticket data for cards
#[async_trait]
pub trait TicketAdapter: Send + Sync {
    fn kind(&self) -> TicketSystem;

    /// Link to the ticket in its originating system
    fn ticket_url(&self, key: &str) -> Option<String>;

    /// Fetch the current ticket payload; `None` means the system has nothing
    /// to contribute and the card keeps its fields
    async fn fetch(&self, card: &Card) -> Result<Option<TicketData>, TicketError>;
}

/// Build the adapter named by the configuration
pub fn build_adapter(config: &Config) -> Result<Arc<dyn TicketAdapter>, TicketError> {
    let adapter: Arc<dyn TicketAdapter> = match config.tickets.system {
        TicketSystem::Null => Arc::new(NullAdapter),
        TicketSystem::Dummy => Arc::new(DummyAdapter),
        TicketSystem::Jira => {
            let jira = config.tickets.jira.as_ref().ok_or_else(|| {
                TicketError::NotConfigured("tickets.system is jira but [tickets.jira] is missing".into())
            })?;
            let session = Arc::new(JiraSession::new(jira)?);
            Arc::new(JiraAdapter::new(session))
        }
    };

    tracing::info!("Using {} ticket system", adapter.kind());
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JiraConfig;

    #[test]
    fn test_build_adapter() {
        let mut config = Config::default();
        let adapter = build_adapter(&config).unwrap();
        assert_eq!(adapter.kind(), TicketSystem::Null);

        config.tickets.system = TicketSystem::Dummy;
        assert_eq!(build_adapter(&config).unwrap().kind(), TicketSystem::Dummy);

        config.tickets.system = TicketSystem::Jira;
        assert!(matches!(
            build_adapter(&config),
            Err(TicketError::NotConfigured(_))
        ));

        config.tickets.jira = Some(JiraConfig {
            base_url: "https://jira.example.com/".into(),
            username: "bot".into(),
            password: "secret".into(),
            service_class_field: None,
            timeout_secs: 5,
        });
        let adapter = build_adapter(&config).unwrap();
        assert_eq!(adapter.kind(), TicketSystem::Jira);
        assert_eq!(
            adapter.ticket_url("CMSAD-1").as_deref(),
            Some("https://jira.example.com/browse/CMSAD-1")
        );
    }
}
