//! Transition records reported by a card save

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::StateLogEntry;

/// A detected state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// `None` when the card was first stored
    pub from: Option<String>,
    pub to: String,
    pub at: DateTime<Utc>,
}

/// What a save did to the card's history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOutcome {
    pub card_id: Uuid,
    pub transition: Option<Transition>,
    pub closed: Vec<StateLogEntry>,
    pub opened: Option<StateLogEntry>,
    /// The state being left had no open entry
    pub missing_history: bool,
    /// Extra open entries found for the state being entered
    pub duplicate_open_entries: usize,
    /// A state change closed the card's open blockers
    pub unblocked: bool,
}

impl SaveOutcome {
    pub fn new(card_id: Uuid) -> Self {
        Self {
            card_id,
            ..Default::default()
        }
    }

    pub fn changed_state(&self) -> bool {
        self.transition.is_some()
    }

    /// Any condition worth a data-quality report
    pub fn has_anomaly(&self) -> bool {
        self.missing_history || self.duplicate_open_entries > 0 || self.closed.len() > 1
    }
}
