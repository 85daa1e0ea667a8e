//! State history entries - one per card per visit to a state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flow::hours_between;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateLogEntry {
    pub id: Uuid,
    pub card_id: Uuid,
    pub state: String,
    pub entered: DateTime<Utc>,
    pub exited: Option<DateTime<Utc>>,
    /// Hours spent, frozen once the entry is closed
    pub duration: Option<i64>,
    /// Card's service class while the interval was open
    pub service_class: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StateLogEntry {
    pub fn new(card_id: Uuid, state: String, entered: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_id,
            state,
            entered,
            exited: None,
            duration: None,
            service_class: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_service_class(mut self, service_class: Option<String>) -> Self {
        self.service_class = service_class;
        self
    }

    pub fn is_open(&self) -> bool {
        self.exited.is_none()
    }

    /// Whole hours in the state: frozen value when closed, else up to `now`
    pub fn duration_at(&self, now: DateTime<Utc>) -> i64 {
        if let Some(duration) = self.duration {
            return duration;
        }
        hours_between(self.entered, self.exited.unwrap_or(now))
    }

    /// Record the exit and freeze the duration
    pub fn close(&mut self, exited: DateTime<Utc>) {
        self.exited = Some(exited);
        self.duration = Some(hours_between(self.entered, exited));
    }
}
