//! Ticket payload supplied by the external ticket system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields the board reads from a ticket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketData {
    pub key: Option<String>,
    pub summary: Option<String>,
    pub status: Option<String>,
    pub service_class: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub ticket_type: Option<String>,
    #[serde(default)]
    pub qaers: Vec<String>,
    #[serde(default)]
    pub developers: Vec<String>,
}

impl TicketData {
    /// Assignee, then QA, then developers, without repeats
    pub fn people(&self) -> Vec<String> {
        let mut people: Vec<String> = Vec::new();
        let candidates = self
            .assignee
            .iter()
            .chain(self.qaers.iter())
            .chain(self.developers.iter());

        for person in candidates {
            if !person.is_empty() && !people.contains(person) {
                people.push(person.clone());
            }
        }
        people
    }
}
